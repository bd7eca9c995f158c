//! Configuration error types.
//!
//! Every variant here is fatal at startup: a process with unusable
//! configuration must refuse to come up rather than run half-configured.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`Config`](crate::Config).
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the file.
        path: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The configured hash algorithm is not supported.
    #[error("unsupported hash algorithm {0:?} (supported: blake3)")]
    UnsupportedHashAlgorithm(String),

    /// A field holds a structurally invalid value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path (e.g. `audit.lock_retry_attempts`).
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
