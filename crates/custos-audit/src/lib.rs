//! Custos Audit - Tamper-evident, multi-tenant audit trail.
//!
//! This crate provides:
//! - Hash-chained audit events (each folds the hash of its predecessor)
//! - Ed25519 signatures over every event hash
//! - Durable append-only storage, one chain per tenant
//! - Offline point and range verification
//!
//! # Security Model
//!
//! Every audit event is:
//! - Canonically encoded and hashed with BLAKE3 (domain-separated)
//! - Linked to the previous event of its tenant's chain via that hash
//! - Signed by the process key, carrying the signing key's id
//! - Published to readers only after a durability barrier
//!
//! The chain linking provides tamper evidence: in-place mutation, deletion,
//! insertion, and reordering are all detectable by recomputation, with no
//! trust in the storage layer. Single-event verification proves
//! self-consistency only; historical position requires range verification
//! up to the chain head.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use custos_audit::{AuditLog, TenantId};
//! use custos_crypto::{KeyMaterial, KeyPair};
//!
//! let material = KeyMaterial::signing(KeyPair::generate());
//! let log = AuditLog::in_memory(material);
//!
//! let tenant = TenantId::new("acme").unwrap();
//! let audit_id = log.record_event(
//!     &tenant,
//!     "alice",
//!     "upload",
//!     "document:1",
//!     BTreeMap::new(),
//! ).unwrap();
//!
//! // Point lookup and verification
//! let event = log.get_event(&audit_id).unwrap().unwrap();
//! assert!(event.prev_hash.is_genesis());
//! assert!(log.verify_event(&audit_id).unwrap().is_valid());
//!
//! // Range verification from genesis to head
//! assert!(log.verify_range(&tenant, 1, 1).unwrap().is_valid());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod event;
mod log;
mod storage;
mod types;
mod verify;

pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, CHAIN_DOMAIN, EventDraft, link};
pub use log::{AuditLog, LockRetry};
pub use storage::{AuditStorage, FileAuditStorage, MemoryAuditStorage};
pub use types::{AuditId, TenantId, Timestamp};
pub use verify::{VerifyOutcome, verify_chain, verify_event};
