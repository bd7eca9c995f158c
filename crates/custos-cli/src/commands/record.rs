//! Record command - append an event to a tenant's chain.

use std::collections::BTreeMap;

use anyhow::Result;

use custos_audit::{AuditLog, TenantId};

/// Record an event and print the audit id on stdout.
///
/// The id is only printed after the durable append succeeded, mirroring the
/// contract services rely on: no id, no recorded action.
pub(crate) fn record(
    log: &AuditLog,
    tenant: &str,
    actor: &str,
    action: &str,
    resource: &str,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let tenant = TenantId::new(tenant)?;
    let metadata: BTreeMap<String, String> = meta.into_iter().collect();

    let audit_id = log.record_event(&tenant, actor, action, resource, metadata)?;
    println!("{audit_id}");
    Ok(())
}
