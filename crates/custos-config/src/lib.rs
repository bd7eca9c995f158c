//! Custos Config - configuration loading for the audit trail.
//!
//! Configuration is TOML with production defaults for every section, an
//! optional config file (explicit path, `CUSTOS_CONFIG`, or `./custos.toml`),
//! and environment overrides for the fields deployments most often inject
//! (key paths, storage root).
//!
//! Types here are self-contained: domain types are mirrored as plain
//! strings/paths and converted at the boundary by the binary, so this crate
//! depends on nothing internal.
//!
//! # Example
//!
//! ```
//! let config = custos_config::Config::default();
//! assert_eq!(config.audit.hash_algorithm, "blake3");
//! assert!(config.validate().is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{AuditConfig, Config, KeysConfig, LoggingConfig};
