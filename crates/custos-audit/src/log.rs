//! The audit service façade.
//!
//! [`AuditLog`] is the only interface collaborators use: record an event,
//! fetch it back, verify a single event or a range. Everything else in this
//! crate exists to serve these four operations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use custos_crypto::{ChainHash, KeyId, KeyMaterial, PublicKey};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, EventDraft};
use crate::storage::{AuditStorage, FileAuditStorage, MemoryAuditStorage};
use crate::types::{AuditId, TenantId};
use crate::verify::{self, VerifyOutcome};

/// Bounds for acquiring a tenant's append lock.
///
/// Appends to one tenant are strictly serialized; under contention a caller
/// retries with exponential backoff and, once the attempts are exhausted,
/// fails with [`AuditError::Durability`] so the triggering business action
/// fails exactly as it would for a write failure.
#[derive(Debug, Clone, Copy)]
pub struct LockRetry {
    /// Maximum `try_lock` attempts before giving up.
    pub attempts: u32,
    /// Sleep before the second attempt; doubles each retry.
    pub initial_backoff: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            attempts: 12,
            initial_backoff: Duration::from_millis(5),
        }
    }
}

/// A tenant's current chain head.
#[derive(Debug, Clone, Copy)]
struct ChainHead {
    position: u64,
    hash: ChainHash,
}

/// Chain-linked, signed audit log over a storage backend.
///
/// Thread-safe: any number of threads may record and verify concurrently.
/// The only shared mutable state is each tenant's chain head, guarded by a
/// per-tenant lock created lazily on first use and retained for the process
/// lifetime.
pub struct AuditLog {
    storage: Arc<dyn AuditStorage>,
    material: Arc<KeyMaterial>,
    // None = head not yet loaded from storage for this process.
    heads: DashMap<TenantId, Arc<Mutex<Option<ChainHead>>>>,
    lock_retry: LockRetry,
}

impl AuditLog {
    /// Create a log over an existing storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>, material: Arc<KeyMaterial>) -> Self {
        Self {
            storage,
            material,
            heads: DashMap::new(),
            lock_retry: LockRetry::default(),
        }
    }

    /// Create a log over in-memory storage (tests, ephemeral use).
    #[must_use]
    pub fn in_memory(material: KeyMaterial) -> Self {
        Self::new(Arc::new(MemoryAuditStorage::new()), Arc::new(material))
    }

    /// Open a log over durable file storage rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage root cannot be opened or holds
    /// corrupt chains.
    pub fn open(root: impl AsRef<Path>, material: KeyMaterial) -> AuditResult<Self> {
        let storage = FileAuditStorage::open(root)?;
        Ok(Self::new(Arc::new(storage), Arc::new(material)))
    }

    /// Override the append-lock retry bounds.
    #[must_use]
    pub fn with_lock_retry(mut self, lock_retry: LockRetry) -> Self {
        self.lock_retry = lock_retry;
        self
    }

    /// Record a security-relevant event and return its id.
    ///
    /// The returned id means the event is durably persisted at the head of
    /// its tenant's chain. Callers must treat a failure here as fatal to
    /// their own operation; auditing is never best-effort.
    ///
    /// Once the durability barrier has been requested this call is not
    /// safely cancellable: a caller that abandons it must re-query by the
    /// draft's id rather than retry, or it risks recording the action twice.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Durability`] if the write (or the append lock,
    /// after bounded retries) fails, or a crypto error if this process holds
    /// verification-only key material.
    pub fn record_event(
        &self,
        tenant: &TenantId,
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> AuditResult<AuditId> {
        // Canonicalization happens outside the lock; only linking, signing
        // and the durable write sit inside the serialization point.
        let draft = EventDraft::new(
            tenant.clone(),
            actor,
            action,
            resource,
            metadata,
            self.material.key_id(),
        );
        let audit_id = draft.audit_id();

        let slot = self.head_slot(tenant);
        let mut guard = self.acquire(&slot, tenant)?;

        let head = match *guard {
            Some(head) => head,
            None => {
                let loaded = self.load_head(tenant)?;
                *guard = Some(loaded);
                loaded
            }
        };

        let event = draft.seal(head.hash, &self.material)?;
        self.storage.append(&event)?;

        // The head only advances after the durability barrier succeeded.
        *guard = Some(ChainHead {
            position: head.position.saturating_add(1),
            hash: event.this_hash,
        });
        drop(guard);

        debug!(
            audit_id = %audit_id,
            tenant = %tenant,
            action = %event.action,
            "audit event recorded"
        );
        Ok(audit_id)
    }

    /// Fetch an event by id. Unknown ids are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn get_event(&self, id: &AuditId) -> AuditResult<Option<AuditEvent>> {
        self.storage.get(id)
    }

    /// The 1-based chain position of an event.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn position(&self, id: &AuditId) -> AuditResult<Option<u64>> {
        self.storage.position(id)
    }

    /// Verify a single event's internal self-consistency.
    ///
    /// This proves the record was not altered in place; it does not prove
    /// the event still occupies its historical position. For positional
    /// guarantees use [`verify_range`](Self::verify_range) up to the chain
    /// head.
    ///
    /// # Errors
    ///
    /// Returns an error only on retrieval failure; findings (including an
    /// unknown id, reported as [`VerifyOutcome::NotFound`]) are data.
    pub fn verify_event(&self, id: &AuditId) -> AuditResult<VerifyOutcome> {
        match self.storage.get(id)? {
            Some(event) => Ok(verify::verify_event(&event, self.material.public_key())),
            None => Ok(VerifyOutcome::NotFound),
        }
    }

    /// Verify positions `from..=to` of a tenant's chain.
    ///
    /// Checks hash recomputation, signatures, and chain linkage, stopping at
    /// the first break and reporting the event where it occurred. The first
    /// event of a chain must carry the genesis sentinel; a range starting
    /// later is anchored against the preceding stored event.
    ///
    /// # Errors
    ///
    /// Returns an error only on retrieval failure; findings are data.
    pub fn verify_range(&self, tenant: &TenantId, from: u64, to: u64) -> AuditResult<VerifyOutcome> {
        if from == 0 || to < from {
            return Ok(VerifyOutcome::NotFound);
        }

        let events = self.storage.get_range(tenant, from, to)?;
        if events.is_empty() {
            return Ok(VerifyOutcome::NotFound);
        }

        let anchor = if from == 1 {
            ChainHash::genesis()
        } else {
            let prev = from.saturating_sub(1);
            match self.storage.get_range(tenant, prev, prev)?.first() {
                Some(event) => event.this_hash,
                None => return Ok(VerifyOutcome::NotFound),
            }
        };

        Ok(verify::verify_chain(
            &events,
            &anchor,
            self.material.public_key(),
        ))
    }

    /// Verify a tenant's entire chain from genesis to head.
    ///
    /// # Errors
    ///
    /// Returns an error only on retrieval failure; findings are data.
    pub fn verify_tenant(&self, tenant: &TenantId) -> AuditResult<VerifyOutcome> {
        let count = self.storage.count(tenant)?;
        self.verify_range(tenant, 1, count)
    }

    /// Number of events in a tenant's chain.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn count(&self, tenant: &TenantId) -> AuditResult<u64> {
        self.storage.count(tenant)
    }

    /// Total number of events across all tenants.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn count_all(&self) -> AuditResult<u64> {
        self.storage.count_all()
    }

    /// All tenants with at least one event.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn list_tenants(&self) -> AuditResult<Vec<TenantId>> {
        self.storage.list_tenants()
    }

    /// A tenant's chain head as `(position, this_hash)`.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn chain_head(&self, tenant: &TenantId) -> AuditResult<Option<(u64, ChainHash)>> {
        self.storage.chain_head(tenant)
    }

    /// Ordered range read without verification.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub fn get_range(&self, tenant: &TenantId, from: u64, to: u64) -> AuditResult<Vec<AuditEvent>> {
        self.storage.get_range(tenant, from, to)
    }

    /// The public key events are verified against.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        self.material.public_key()
    }

    /// The key id carried on newly recorded events.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.material.key_id()
    }

    fn head_slot(&self, tenant: &TenantId) -> Arc<Mutex<Option<ChainHead>>> {
        Arc::clone(
            self.heads
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        )
    }

    fn load_head(&self, tenant: &TenantId) -> AuditResult<ChainHead> {
        Ok(match self.storage.chain_head(tenant)? {
            Some((position, hash)) => ChainHead { position, hash },
            None => ChainHead {
                position: 0,
                hash: ChainHash::genesis(),
            },
        })
    }

    fn acquire<'a>(
        &self,
        slot: &'a Mutex<Option<ChainHead>>,
        tenant: &TenantId,
    ) -> AuditResult<MutexGuard<'a, Option<ChainHead>>> {
        let mut backoff = self.lock_retry.initial_backoff;

        for attempt in 0..self.lock_retry.attempts {
            match slot.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(AuditError::Storage(format!(
                        "chain head for tenant {tenant} poisoned"
                    )));
                }
                Err(TryLockError::WouldBlock) => {
                    if attempt.saturating_add(1) < self.lock_retry.attempts {
                        std::thread::sleep(backoff);
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        Err(AuditError::Durability(format!(
            "append lock for tenant {tenant} not acquired after {} attempts",
            self.lock_retry.attempts
        )))
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("key_id", &self.material.key_id())
            .field("lock_retry", &self.lock_retry)
            .finish_non_exhaustive()
    }
}
