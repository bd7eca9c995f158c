//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with audit logging.
///
/// Verification findings are not errors: tampering detection is an expected
/// operational outcome and is returned as
/// [`VerifyOutcome`](crate::VerifyOutcome) data instead.
#[derive(Debug, Error)]
pub enum AuditError {
    /// An append failed its durability barrier (write or fsync).
    ///
    /// The triggering business action must fail when it sees this; an event
    /// that did not reach durable storage was never recorded. Per-tenant
    /// append lock exhaustion also escalates here after bounded retries.
    #[error("append durability failure: {0}")]
    Durability(String),

    /// Storage read/open/scan error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted record could not be decoded.
    #[error("corrupt audit record: {0}")]
    Serialization(String),

    /// Tenant identifier failed validation.
    #[error("invalid tenant id {tenant:?}: {reason}")]
    InvalidTenant {
        /// The rejected identifier.
        tenant: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] custos_crypto::CryptoError),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
