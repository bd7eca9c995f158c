//! Identifier and timestamp types shared across the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};

/// Unique audit event identifier.
///
/// Assigned once at creation and immutable afterwards; collaborators hold it
/// as the opaque handle for later point lookup and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditId(pub Uuid);

impl AuditId {
    /// Create a new random audit ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The raw 16 bytes, used by the canonical encoding.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Maximum accepted tenant identifier length.
const TENANT_ID_MAX_LEN: usize = 64;

/// Validated tenant identifier.
///
/// Tenant ids name per-tenant chains and derive storage paths, so the
/// accepted alphabet is restricted: lowercase alphanumerics plus `-` and
/// `_`, at most 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a validated tenant ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidTenant`] if the identifier is empty,
    /// too long, or contains characters outside `[a-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> AuditResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(AuditError::InvalidTenant {
                tenant: id,
                reason: "must not be empty".into(),
            });
        }
        if id.len() > TENANT_ID_MAX_LEN {
            return Err(AuditError::InvalidTenant {
                tenant: id,
                reason: format!("longer than {TENANT_ID_MAX_LEN} characters"),
            });
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        {
            return Err(AuditError::InvalidTenant {
                tenant: id,
                reason: "only lowercase alphanumerics, '-' and '_' are allowed".into(),
            });
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Event timestamp: UTC, truncated to microseconds.
///
/// The truncation keeps the canonical encoding (whole microseconds) and the
/// persisted representation in exact agreement, so a serialize/deserialize
/// round trip never changes an event's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// The current time, truncated to microsecond precision.
    #[must_use]
    pub fn now() -> Self {
        let now = Utc::now();
        Self::from_micros(now.timestamp_micros()).unwrap_or(Self(now))
    }

    /// Build from whole microseconds since the Unix epoch.
    #[must_use]
    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Self)
    }

    /// Whole microseconds since the Unix epoch, used by the canonical encoding.
    #[must_use]
    pub fn timestamp_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
