//! Audit event model and canonical encoding.
//!
//! Every security-relevant action is recorded as an [`AuditEvent`]. Events
//! are chain-linked per tenant (each folds the hash of its predecessor into
//! its own hash) and signed with the process key.
//!
//! # Canonical encoding
//!
//! `this_hash` must be recomputable from logical fields alone, independent
//! of how an event was stored. The encoding is therefore pinned exactly:
//!
//! - fixed field order: `audit_id` (16 raw bytes), `tenant_id`, timestamp
//!   (i64 LE microseconds), `actor`, `action`, `resource`, metadata pair
//!   count (u32 LE) followed by key/value pairs in key order, `key_id`
//!   (8 raw bytes);
//! - every variable-length field prefixed with its u32 LE byte length, so
//!   the encoding is injective (no two field combinations share bytes);
//! - `this_hash = blake3_derive_key(CHAIN_DOMAIN, prev_hash || body)`.

use std::collections::BTreeMap;

use custos_crypto::{ChainHash, KeyId, KeyMaterial, Signature};
use serde::{Deserialize, Serialize};

use crate::error::AuditResult;
use crate::types::{AuditId, TenantId, Timestamp};

/// Domain separation context for event hashes.
///
/// Versioned so a future encoding change can never produce hashes that
/// collide with records written under this one.
pub const CHAIN_DOMAIN: &str = "custos.audit.event.v1";

/// A single audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub audit_id: AuditId,
    /// Tenant whose chain this event extends.
    pub tenant_id: TenantId,
    /// When this event was created (UTC, microsecond precision).
    pub timestamp: Timestamp,
    /// Who performed the action (user id, service principal, ...).
    pub actor: String,
    /// The action performed (e.g. `"upload"`, `"summarize"`).
    pub action: String,
    /// The resource acted upon (e.g. `"document:1"`).
    pub resource: String,
    /// Additional context, deterministically ordered by key.
    pub metadata: BTreeMap<String, String>,
    /// Hash of the previous event in this tenant's chain, or the genesis
    /// sentinel for the first event.
    pub prev_hash: ChainHash,
    /// Hash over this event's canonical encoding (which folds in `prev_hash`).
    pub this_hash: ChainHash,
    /// Signature over `this_hash`.
    pub signature: Signature,
    /// Fingerprint of the key that signed this event.
    pub key_id: KeyId,
}

impl AuditEvent {
    /// Recompute this event's hash from its own logical fields.
    ///
    /// Matches the stored `this_hash` only when no field has been altered
    /// since the event was sealed.
    #[must_use]
    pub fn compute_hash(&self) -> ChainHash {
        let body = canonical_body(
            &self.audit_id,
            &self.tenant_id,
            self.timestamp,
            &self.actor,
            &self.action,
            &self.resource,
            &self.metadata,
            self.key_id,
        );
        link(self.prev_hash, &body)
    }

    /// Check if this event directly follows another in the chain.
    #[must_use]
    pub fn follows(&self, previous: &AuditEvent) -> bool {
        self.prev_hash == previous.this_hash
    }
}

/// An event under construction: all fields assigned except the chain link.
///
/// The canonical body is computed at construction time, outside any tenant
/// lock; [`EventDraft::seal`] only folds in `prev_hash` and signs, which is
/// the minimum work that must happen at the per-tenant serialization point.
#[derive(Debug)]
pub struct EventDraft {
    audit_id: AuditId,
    tenant_id: TenantId,
    timestamp: Timestamp,
    actor: String,
    action: String,
    resource: String,
    metadata: BTreeMap<String, String>,
    key_id: KeyId,
    body: Vec<u8>,
}

impl EventDraft {
    /// Create a draft with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        metadata: BTreeMap<String, String>,
        key_id: KeyId,
    ) -> Self {
        let audit_id = AuditId::new();
        let timestamp = Timestamp::now();
        let actor = actor.into();
        let action = action.into();
        let resource = resource.into();
        let body = canonical_body(
            &audit_id, &tenant_id, timestamp, &actor, &action, &resource, &metadata, key_id,
        );
        Self {
            audit_id,
            tenant_id,
            timestamp,
            actor,
            action,
            resource,
            metadata,
            key_id,
            body,
        }
    }

    /// The id this draft will carry once sealed.
    #[must_use]
    pub const fn audit_id(&self) -> AuditId {
        self.audit_id
    }

    /// Link this draft to the chain head and sign it.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if the key material cannot sign (e.g.
    /// verification-only material).
    pub fn seal(self, prev_hash: ChainHash, material: &KeyMaterial) -> AuditResult<AuditEvent> {
        let this_hash = link(prev_hash, &self.body);
        let signature = material.sign(this_hash.as_bytes())?;

        Ok(AuditEvent {
            audit_id: self.audit_id,
            tenant_id: self.tenant_id,
            timestamp: self.timestamp,
            actor: self.actor,
            action: self.action,
            resource: self.resource,
            metadata: self.metadata,
            prev_hash,
            this_hash,
            signature,
            key_id: self.key_id,
        })
    }
}

/// Compute the chain hash for a canonical body linked to `prev_hash`.
#[must_use]
pub fn link(prev_hash: ChainHash, canonical_body: &[u8]) -> ChainHash {
    ChainHash::derive(CHAIN_DOMAIN, &[prev_hash.as_bytes(), canonical_body])
}

/// Append a length-prefixed byte string to the canonical buffer.
fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).expect("field longer than u32::MAX bytes");
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Canonical encoding of every hashed field except `prev_hash`.
#[allow(clippy::too_many_arguments)]
fn canonical_body(
    audit_id: &AuditId,
    tenant_id: &TenantId,
    timestamp: Timestamp,
    actor: &str,
    action: &str,
    resource: &str,
    metadata: &BTreeMap<String, String>,
    key_id: KeyId,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(audit_id.as_bytes());
    put_bytes(&mut buf, tenant_id.as_str().as_bytes());
    buf.extend_from_slice(&timestamp.timestamp_micros().to_le_bytes());
    put_bytes(&mut buf, actor.as_bytes());
    put_bytes(&mut buf, action.as_bytes());
    put_bytes(&mut buf, resource.as_bytes());

    let pairs = u32::try_from(metadata.len()).expect("metadata larger than u32::MAX entries");
    buf.extend_from_slice(&pairs.to_le_bytes());
    // BTreeMap iteration order is key order, which pins the encoding.
    for (key, value) in metadata {
        put_bytes(&mut buf, key.as_bytes());
        put_bytes(&mut buf, value.as_bytes());
    }

    buf.extend_from_slice(key_id.as_bytes());
    buf
}
