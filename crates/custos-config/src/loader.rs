//! Config file discovery and loading.
//!
//! Precedence, first match wins:
//! 1. An explicit path (e.g. from `--config`)
//! 2. `$CUSTOS_CONFIG`
//! 3. `./custos.toml`
//! 4. Built-in defaults
//!
//! Environment overrides are applied on top of whichever source was used,
//! then the result is validated.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Environment variable naming an alternate config file.
const ENV_CONFIG: &str = "CUSTOS_CONFIG";
/// Environment override for `keys.private_key_path`.
const ENV_PRIVATE_KEY: &str = "CUSTOS_SIGNING_PRIVATE_KEY";
/// Environment override for `keys.public_key_path`.
const ENV_PUBLIC_KEY: &str = "CUSTOS_SIGNING_PUBLIC_KEY";
/// Environment override for `audit.storage_root`.
const ENV_STORAGE_ROOT: &str = "CUSTOS_AUDIT_ROOT";

/// Load, overlay, and validate configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a discovered file cannot be read or parsed,
/// or if the final configuration fails validation.
pub fn load(explicit: Option<&Path>) -> ConfigResult<Config> {
    let mut config = match discover(explicit) {
        Some(path) => parse_file(&path)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config.validate()?;
    Ok(config)
}

fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from("custos.toml");
    local.exists().then_some(local)
}

fn parse_file(path: &Path) -> ConfigResult<Config> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Apply env overrides through a lookup function (injectable for tests).
fn apply_env_overrides(config: &mut Config, get: impl Fn(&str) -> Option<String>) {
    if let Some(path) = get(ENV_PRIVATE_KEY) {
        config.keys.private_key_path = Some(PathBuf::from(path));
    }
    if let Some(path) = get(ENV_PUBLIC_KEY) {
        config.keys.public_key_path = Some(PathBuf::from(path));
    }
    if let Some(root) = get(ENV_STORAGE_ROOT) {
        config.audit.storage_root = PathBuf::from(root);
    }
}
