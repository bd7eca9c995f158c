//! Prelude module - commonly used types for convenient import.
//!
//! Use `use custos_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Event model
pub use crate::{AuditEvent, AuditId, EventDraft, TenantId, Timestamp};

// Façade and verification
pub use crate::{AuditLog, LockRetry, VerifyOutcome};

// Storage
pub use crate::{AuditStorage, FileAuditStorage, MemoryAuditStorage};
