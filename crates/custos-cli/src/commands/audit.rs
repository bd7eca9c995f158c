//! Audit commands - view and verify stored events and chains.

use anyhow::Result;
use colored::Colorize;

use custos_audit::{AuditId, AuditLog, TenantId, VerifyOutcome};
use custos_crypto::HashAlgorithm;

fn outcome_label(outcome: &VerifyOutcome) -> String {
    if outcome.is_valid() {
        "valid".green().to_string()
    } else {
        outcome.to_string().red().to_string()
    }
}

/// Show an event's fields together with its verification outcome.
pub(crate) fn show_event(log: &AuditLog, audit_id: &str) -> Result<()> {
    let id: AuditId = audit_id.parse()?;

    let Some(event) = log.get_event(&id)? else {
        println!("{}", "event not found".yellow());
        return Ok(());
    };
    let outcome = log.verify_event(&id)?;
    let position = log.position(&id)?;

    println!("audit_id:  {}", event.audit_id);
    println!("tenant:    {}", event.tenant_id);
    if let Some(position) = position {
        println!("position:  {position}");
    }
    println!("timestamp: {}", event.timestamp);
    println!("actor:     {}", event.actor);
    println!("action:    {}", event.action);
    println!("resource:  {}", event.resource);
    for (key, value) in &event.metadata {
        println!("meta:      {key}={value}");
    }
    println!("prev_hash: {}", event.prev_hash);
    println!("this_hash: {}", event.this_hash);
    println!("key_id:    {}", event.key_id);
    println!("verified:  {}", outcome_label(&outcome));
    Ok(())
}

/// Verify a single event's self-consistency.
///
/// This proves the record was not altered in place; positional guarantees
/// need a chain verification up to the tenant's head.
pub(crate) fn verify_event(log: &AuditLog, audit_id: &str) -> Result<()> {
    let id: AuditId = audit_id.parse()?;
    let outcome = log.verify_event(&id)?;
    println!("{}", outcome_label(&outcome));
    Ok(())
}

/// Verify a tenant's chain over an optional position range.
pub(crate) fn verify_chain(
    log: &AuditLog,
    tenant: &str,
    from: Option<u64>,
    to: Option<u64>,
) -> Result<()> {
    let tenant = TenantId::new(tenant)?;
    let head = log.count(&tenant)?;
    let from = from.unwrap_or(1);
    let to = to.unwrap_or(head);

    let outcome = log.verify_range(&tenant, from, to)?;
    let span = to.min(head).saturating_sub(from.saturating_sub(1));

    match &outcome {
        VerifyOutcome::Valid => {
            println!(
                "{} tenant {} positions {from}..={to}: {span} events verified",
                "ok:".green(),
                tenant
            );
        }
        VerifyOutcome::NotFound => {
            println!("{} no events in the requested range", "warning:".yellow());
        }
        finding => {
            println!("{} {}", "TAMPERING DETECTED:".red().bold(), finding);
        }
    }
    Ok(())
}

/// Show audit trail statistics and per-tenant integrity.
pub(crate) fn stats(log: &AuditLog, algorithm: HashAlgorithm) -> Result<()> {
    let tenants = log.list_tenants()?;

    println!("\n{}", "Audit Trail".bold());
    println!("  total events: {}", log.count_all()?);
    println!("  tenants:      {}", tenants.len());
    println!("  key id:       {}", log.key_id());
    println!("  algorithm:    {algorithm}");

    if tenants.is_empty() {
        return Ok(());
    }

    println!(
        "\n{:>16} {:>8} {:>10}",
        "TENANT".dimmed(),
        "EVENTS".dimmed(),
        "INTEGRITY".dimmed()
    );
    let mut sorted = tenants;
    sorted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    for tenant in &sorted {
        let count = log.count(tenant)?;
        let outcome = log.verify_tenant(tenant)?;
        println!("{:>16} {count:>8} {:>10}", tenant.as_str(), outcome_label(&outcome));
    }

    println!();
    Ok(())
}
