//! Custos CLI - operate and verify the tamper-evident audit trail.
//!
//! Recording normally happens in-process in the services that call the
//! audit core; this binary covers everything an operator or compliance
//! reviewer needs from the outside: key provisioning, ad-hoc recording,
//! point lookup, and offline chain verification.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use custos_audit::{AuditLog, LockRetry};
use custos_config::Config;
use custos_crypto::{HashAlgorithm, KeyMaterial};

mod commands;

use commands::{audit, keys, record};

/// Custos - tamper-evident audit trail
#[derive(Parser)]
#[command(name = "custos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage signing keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Record an audit event and print its id
    Record {
        /// Tenant whose chain the event extends
        tenant: String,
        /// Acting principal (user id, service name)
        actor: String,
        /// Action performed
        action: String,
        /// Resource acted upon
        resource: String,
        /// Metadata entries as key=value
        #[arg(short, long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Show an event together with its verification outcome
    Show {
        /// Audit event id
        audit_id: String,
    },

    /// Verify a single event's self-consistency
    Verify {
        /// Audit event id
        audit_id: String,
    },

    /// Verify a tenant's chain, optionally restricted to a position range
    Chain {
        /// Tenant id
        tenant: String,
        /// First position to verify (1-based, default 1)
        #[arg(long)]
        from: Option<u64>,
        /// Last position to verify (default: chain head)
        #[arg(long)]
        to: Option<u64>,
    },

    /// Show audit trail statistics
    Stats,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a key pair at the configured paths
    Generate,
    /// Show the loaded key material
    Show,
}

/// Parse a `key=value` metadata argument.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

fn init_tracing(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load key material per the configured paths, requiring the private half
/// only when the command signs.
fn load_material(config: &Config, require_signing: bool) -> Result<KeyMaterial> {
    if require_signing && config.keys.private_key_path.is_none() {
        anyhow::bail!(
            "recording requires a signing key: set keys.private_key_path \
             or CUSTOS_SIGNING_PRIVATE_KEY"
        );
    }
    KeyMaterial::load(
        config.keys.private_key_path.as_deref(),
        config.keys.public_key_path.as_deref(),
    )
    .context("failed to load key material")
}

fn open_log(config: &Config, require_signing: bool) -> Result<AuditLog> {
    let material = load_material(config, require_signing)?;
    tracing::debug!(
        root = %config.audit.storage_root.display(),
        key_id = %material.key_id(),
        "opening audit storage"
    );
    let log = AuditLog::open(&config.audit.storage_root, material)
        .with_context(|| {
            format!(
                "failed to open audit storage at {}",
                config.audit.storage_root.display()
            )
        })?
        .with_lock_retry(LockRetry {
            attempts: config.audit.lock_retry_attempts,
            initial_backoff: Duration::from_millis(config.audit.lock_retry_backoff_ms),
        });
    Ok(log)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = custos_config::load(cli.config.as_deref())?;
    init_tracing(&config.logging.level);

    // Convert the configured identifier at the boundary; verification
    // correctness depends on writer and verifier agreeing on the digest.
    let algorithm: HashAlgorithm = config.audit.hash_algorithm.parse()?;

    match cli.command {
        Commands::Keys { command } => match command {
            KeyCommands::Generate => keys::generate(&config),
            KeyCommands::Show => keys::show(&config),
        },
        Commands::Record {
            tenant,
            actor,
            action,
            resource,
            meta,
        } => {
            let log = open_log(&config, true)?;
            record::record(&log, &tenant, &actor, &action, &resource, meta)
        }
        Commands::Show { audit_id } => {
            let log = open_log(&config, false)?;
            audit::show_event(&log, &audit_id)
        }
        Commands::Verify { audit_id } => {
            let log = open_log(&config, false)?;
            audit::verify_event(&log, &audit_id)
        }
        Commands::Chain { tenant, from, to } => {
            let log = open_log(&config, false)?;
            audit::verify_chain(&log, &tenant, from, to)
        }
        Commands::Stats => {
            let log = open_log(&config, false)?;
            audit::stats(&log, algorithm)
        }
    }
}
