//! Keys command - provision and inspect key material.

use anyhow::{Context, Result};
use colored::Colorize;

use custos_config::Config;
use custos_crypto::{KeyMaterial, KeyPair};

/// Generate a key pair at the configured paths.
///
/// Refuses to overwrite an existing private key; rotating means
/// provisioning a new path, never clobbering material that signed
/// historical events.
pub(crate) fn generate(config: &Config) -> Result<()> {
    let private = config
        .keys
        .private_key_path
        .as_deref()
        .context("set keys.private_key_path before generating a key")?;

    let keypair = KeyPair::generate_to_file(private)
        .with_context(|| format!("failed to write {}", private.display()))?;

    println!(
        "{} private key written to {}",
        "ok:".green(),
        private.display()
    );

    if let Some(public) = config.keys.public_key_path.as_deref() {
        keypair.export_public_key().save_to_file(public)?;
        println!(
            "{} public key written to {}",
            "ok:".green(),
            public.display()
        );
    }

    println!("key id: {}", keypair.key_id().to_string().cyan());
    Ok(())
}

/// Show the loaded key material.
pub(crate) fn show(config: &Config) -> Result<()> {
    let material = KeyMaterial::load(
        config.keys.private_key_path.as_deref(),
        config.keys.public_key_path.as_deref(),
    )?;

    println!("key id:     {}", material.key_id().to_string().cyan());
    println!("public key: {}", material.public_key().to_hex());
    let role = if material.can_sign() {
        "signing".green()
    } else {
        "verification-only".yellow()
    };
    println!("role:       {role}");
    Ok(())
}
