//! Configuration types.
//!
//! Every struct implements [`Default`] with production values, so a bare
//! `[section]` header in TOML (or no file at all) produces a working
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Hash algorithms this build can verify and produce.
const SUPPORTED_HASH_ALGORITHMS: &[&str] = &["blake3"];

/// Root configuration for the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths to cryptographic key material.
    pub keys: KeysConfig,
    /// Audit storage and chain settings.
    pub audit: AuditConfig,
    /// Logging level.
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate the merged configuration.
    ///
    /// Structural checks only; key files are opened (and required) by the
    /// crypto layer at startup, where the process role decides which halves
    /// must be present.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> ConfigResult<()> {
        if !SUPPORTED_HASH_ALGORITHMS.contains(&self.audit.hash_algorithm.as_str()) {
            return Err(ConfigError::UnsupportedHashAlgorithm(
                self.audit.hash_algorithm.clone(),
            ));
        }
        if self.audit.storage_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "audit.storage_root".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.audit.lock_retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audit.lock_retry_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Paths to cryptographic key material.
///
/// A signing deployment sets `private_key_path` (optionally plus
/// `public_key_path` as a cross-check); a verification-only deployment sets
/// just `public_key_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Path to the raw 32-byte ed25519 private key.
    pub private_key_path: Option<PathBuf>,
    /// Path to the raw 32-byte ed25519 public key.
    pub public_key_path: Option<PathBuf>,
}

/// Audit storage and chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory holding one append-only chain file per tenant.
    pub storage_root: PathBuf,
    /// Digest used for chain hashes. Pinned by configuration so writers and
    /// offline verifiers agree without negotiation.
    pub hash_algorithm: String,
    /// Maximum attempts to acquire a tenant's append lock.
    pub lock_retry_attempts: u32,
    /// Backoff before the second attempt, in milliseconds; doubles per retry.
    pub lock_retry_backoff_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("data/audit"),
            hash_algorithm: "blake3".to_string(),
            lock_retry_attempts: 12,
            lock_retry_backoff_ms: 5,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter (e.g. `"info"`, `"custos_audit=debug"`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audit.hash_algorithm, "blake3");
        assert!(config.keys.private_key_path.is_none());
    }

    #[test]
    fn test_bare_sections_parse() {
        let config: Config = toml::from_str("[keys]\n[audit]\n[logging]\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_hash_algorithm_rejected() {
        let config: Config = toml::from_str("[audit]\nhash_algorithm = \"md5\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedHashAlgorithm(_))
        ));
    }

    #[test]
    fn test_zero_lock_attempts_rejected() {
        let config: Config = toml::from_str("[audit]\nlock_retry_attempts = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
