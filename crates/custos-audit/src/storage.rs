//! Append-only audit storage: trait, in-memory backend, durable file backend.
//!
//! Both backends keep an arena of position-ordered records per tenant
//! (positions are 1-based and stable, since records are never updated or
//! deleted) plus a global id index for point lookup. The file backend
//! persists one append-only JSON-lines file per tenant under the storage
//! root and only publishes a record to the arena after the durability
//! barrier (flush + fsync) has succeeded, so readers never observe a
//! partially written event.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, warn};

use custos_crypto::ChainHash;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use crate::types::{AuditId, TenantId};

/// Storage backend for audit chains.
///
/// Implementations must be thread-safe and must:
/// - assign strict 1-based position order within a tenant's chain;
/// - make [`append`](Self::append) durable before returning;
/// - never surface partially written records to readers.
///
/// Append callers are expected to hold the per-tenant serialization point
/// (see [`AuditLog`](crate::AuditLog)); storage itself only guarantees that
/// a published record is complete and durable.
pub trait AuditStorage: Send + Sync {
    /// Durably persist an event at the next position of its tenant's chain.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Durability`] if the write or its durability
    /// barrier fails; the event is then not recorded.
    fn append(&self, event: &AuditEvent) -> AuditResult<()>;

    /// Point lookup by audit id.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails; an unknown id is `Ok(None)`.
    fn get(&self, id: &AuditId) -> AuditResult<Option<AuditEvent>>;

    /// The 1-based chain position of an event, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn position(&self, id: &AuditId) -> AuditResult<Option<u64>>;

    /// Ordered range read: positions `from..=to` (1-based, `to` clamped to
    /// the chain length). Out-of-range or inverted bounds yield an empty vec.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn get_range(&self, tenant: &TenantId, from: u64, to: u64) -> AuditResult<Vec<AuditEvent>>;

    /// The chain head: position and `this_hash` of the latest event, or
    /// `None` for a tenant with no events.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn chain_head(&self, tenant: &TenantId) -> AuditResult<Option<(u64, ChainHash)>>;

    /// Number of events in a tenant's chain.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn count(&self, tenant: &TenantId) -> AuditResult<u64>;

    /// Total number of events across all tenants.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn count_all(&self) -> AuditResult<u64>;

    /// All tenant ids with at least one event.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    fn list_tenants(&self) -> AuditResult<Vec<TenantId>>;
}

/// Shared arena + id index used by both backends.
#[derive(Default)]
struct ChainIndex {
    chains: DashMap<TenantId, Vec<AuditEvent>>,
    ids: DashMap<AuditId, (TenantId, u64)>,
}

impl ChainIndex {
    /// Publish a complete (already durable, where applicable) event.
    fn publish(&self, event: AuditEvent) {
        let tenant = event.tenant_id.clone();
        let audit_id = event.audit_id;

        let mut chain = self.chains.entry(tenant.clone()).or_default();
        chain.push(event);
        let position = chain.len() as u64;
        drop(chain);

        self.ids.insert(audit_id, (tenant, position));
    }

    fn get(&self, id: &AuditId) -> Option<AuditEvent> {
        let (tenant, position) = self.ids.get(id)?.value().clone();
        let chain = self.chains.get(&tenant)?;
        let idx = usize::try_from(position.saturating_sub(1)).ok()?;
        chain.get(idx).cloned()
    }

    fn position(&self, id: &AuditId) -> Option<u64> {
        self.ids.get(id).map(|entry| entry.value().1)
    }

    fn range(&self, tenant: &TenantId, from: u64, to: u64) -> Vec<AuditEvent> {
        if from == 0 || to < from {
            return Vec::new();
        }
        let Some(chain) = self.chains.get(tenant) else {
            return Vec::new();
        };
        let len = chain.len() as u64;
        if from > len {
            return Vec::new();
        }
        let to = to.min(len);
        let (Ok(start), Ok(end)) = (
            usize::try_from(from.saturating_sub(1)),
            usize::try_from(to),
        ) else {
            return Vec::new();
        };
        chain[start..end].to_vec()
    }

    fn head(&self, tenant: &TenantId) -> Option<(u64, ChainHash)> {
        let chain = self.chains.get(tenant)?;
        let last = chain.last()?;
        Some((chain.len() as u64, last.this_hash))
    }

    fn count(&self, tenant: &TenantId) -> u64 {
        self.chains
            .get(tenant)
            .map_or(0, |chain| chain.len() as u64)
    }

    fn count_all(&self) -> u64 {
        self.chains.iter().fold(0u64, |acc, entry| {
            acc.saturating_add(entry.value().len() as u64)
        })
    }

    fn tenants(&self) -> Vec<TenantId> {
        self.chains.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// In-memory storage (for tests and ephemeral deployments).
#[derive(Default)]
pub struct MemoryAuditStorage {
    index: ChainIndex,
}

impl MemoryAuditStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStorage for MemoryAuditStorage {
    fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        self.index.publish(event.clone());
        Ok(())
    }

    fn get(&self, id: &AuditId) -> AuditResult<Option<AuditEvent>> {
        Ok(self.index.get(id))
    }

    fn position(&self, id: &AuditId) -> AuditResult<Option<u64>> {
        Ok(self.index.position(id))
    }

    fn get_range(&self, tenant: &TenantId, from: u64, to: u64) -> AuditResult<Vec<AuditEvent>> {
        Ok(self.index.range(tenant, from, to))
    }

    fn chain_head(&self, tenant: &TenantId) -> AuditResult<Option<(u64, ChainHash)>> {
        Ok(self.index.head(tenant))
    }

    fn count(&self, tenant: &TenantId) -> AuditResult<u64> {
        Ok(self.index.count(tenant))
    }

    fn count_all(&self) -> AuditResult<u64> {
        Ok(self.index.count_all())
    }

    fn list_tenants(&self) -> AuditResult<Vec<TenantId>> {
        Ok(self.index.tenants())
    }
}

impl std::fmt::Debug for MemoryAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAuditStorage").finish_non_exhaustive()
    }
}

/// Durable file-backed storage: one append-only JSONL file per tenant.
pub struct FileAuditStorage {
    root: PathBuf,
    writers: DashMap<TenantId, Arc<Mutex<std::fs::File>>>,
    index: ChainIndex,
}

impl FileAuditStorage {
    /// Open (or create) a storage root and rebuild the in-memory arena from
    /// the persisted chains.
    ///
    /// A truncated final line in a chain file is a crash remnant from an
    /// unacknowledged append: it is discarded (the file is truncated back to
    /// its last complete record) with a warning. A malformed line anywhere
    /// else is corruption and fails the open.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] on I/O failures and
    /// [`AuditError::Serialization`] on corrupt records.
    pub fn open(root: impl AsRef<Path>) -> AuditResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| AuditError::Storage(format!("create {}: {e}", root.display())))?;

        let storage = Self {
            root: root.clone(),
            writers: DashMap::new(),
            index: ChainIndex::default(),
        };

        let entries = std::fs::read_dir(&root)
            .map_err(|e| AuditError::Storage(format!("scan {}: {e}", root.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| AuditError::Storage(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Ok(tenant) = TenantId::new(stem) else {
                warn!(path = %path.display(), "skipping file with invalid tenant name");
                continue;
            };

            let events = load_chain_file(&path)?;
            debug!(tenant = %tenant, events = events.len(), "loaded audit chain");
            for event in events {
                storage.index.publish(event);
            }
        }

        Ok(storage)
    }

    /// The storage root this store was opened on.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chain_path(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(format!("{tenant}.log"))
    }

    fn writer_for(&self, tenant: &TenantId) -> AuditResult<Arc<Mutex<std::fs::File>>> {
        let entry = self
            .writers
            .entry(tenant.clone())
            .or_try_insert_with(|| {
                let path = self.chain_path(tenant);
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map(|file| Arc::new(Mutex::new(file)))
                    .map_err(|e| AuditError::Storage(format!("open {}: {e}", path.display())))
            })?;
        Ok(Arc::clone(entry.value()))
    }
}

impl AuditStorage for FileAuditStorage {
    fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let mut line =
            serde_json::to_vec(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        line.push(b'\n');

        let writer = self.writer_for(&event.tenant_id)?;
        {
            let mut file = writer
                .lock()
                .map_err(|_| AuditError::Storage("chain file writer poisoned".into()))?;

            // Note the pre-append length so a failed write can be rolled
            // back; otherwise the next append would land after a partial
            // record and corrupt the file.
            let offset = file
                .metadata()
                .map_err(|e| AuditError::Durability(e.to_string()))?
                .len();

            let write_result = file
                .write_all(&line)
                .and_then(|()| file.flush())
                .and_then(|()| file.sync_data());
            if let Err(e) = write_result {
                let _ = file.set_len(offset);
                return Err(AuditError::Durability(e.to_string()));
            }
        }

        // Durability barrier passed: the record may now be observed.
        self.index.publish(event.clone());
        Ok(())
    }

    fn get(&self, id: &AuditId) -> AuditResult<Option<AuditEvent>> {
        Ok(self.index.get(id))
    }

    fn position(&self, id: &AuditId) -> AuditResult<Option<u64>> {
        Ok(self.index.position(id))
    }

    fn get_range(&self, tenant: &TenantId, from: u64, to: u64) -> AuditResult<Vec<AuditEvent>> {
        Ok(self.index.range(tenant, from, to))
    }

    fn chain_head(&self, tenant: &TenantId) -> AuditResult<Option<(u64, ChainHash)>> {
        Ok(self.index.head(tenant))
    }

    fn count(&self, tenant: &TenantId) -> AuditResult<u64> {
        Ok(self.index.count(tenant))
    }

    fn count_all(&self) -> AuditResult<u64> {
        Ok(self.index.count_all())
    }

    fn list_tenants(&self) -> AuditResult<Vec<TenantId>> {
        Ok(self.index.tenants())
    }
}

impl std::fmt::Debug for FileAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditStorage")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Parse a chain file, repairing a crash-truncated final record.
fn load_chain_file(path: &Path) -> AuditResult<Vec<AuditEvent>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| AuditError::Storage(format!("read {}: {e}", path.display())))?;

    let chunks: Vec<&str> = data.split_inclusive('\n').collect();
    let mut events = Vec::new();
    let mut valid_len: usize = 0;
    let mut remnant = false;

    for (i, chunk) in chunks.iter().enumerate() {
        let last = i.saturating_add(1) == chunks.len();
        let complete = chunk.ends_with('\n');
        let line = chunk.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            valid_len = valid_len.saturating_add(chunk.len());
            continue;
        }

        match serde_json::from_str::<AuditEvent>(line) {
            // A record only counts once its terminator is on disk; an
            // intact payload missing its newline was never acknowledged.
            Ok(event) if complete => {
                events.push(event);
                valid_len = valid_len.saturating_add(chunk.len());
            }
            Ok(_) if last => {
                remnant = true;
            }
            Err(_) if last && !complete => {
                remnant = true;
            }
            Ok(_) | Err(_) => {
                return Err(AuditError::Serialization(format!(
                    "malformed record at line {} of {}",
                    i.saturating_add(1),
                    path.display()
                )));
            }
        }
    }

    if remnant {
        warn!(
            path = %path.display(),
            "discarding truncated trailing record (crash remnant)"
        );
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        file.set_len(valid_len as u64)
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        file.sync_data()
            .map_err(|e| AuditError::Storage(e.to_string()))?;
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use custos_crypto::{KeyMaterial, KeyPair};
    use std::collections::BTreeMap;

    fn material() -> KeyMaterial {
        KeyMaterial::signing(KeyPair::generate())
    }

    fn event_for(material: &KeyMaterial, tenant: &TenantId, prev: ChainHash) -> AuditEvent {
        EventDraft::new(
            tenant.clone(),
            "alice",
            "upload",
            "document:1",
            BTreeMap::new(),
            material.key_id(),
        )
        .seal(prev, material)
        .unwrap()
    }

    #[test]
    fn test_memory_append_and_lookup() {
        let storage = MemoryAuditStorage::new();
        let material = material();
        let tenant = TenantId::new("t1").unwrap();

        let event = event_for(&material, &tenant, ChainHash::genesis());
        storage.append(&event).unwrap();

        assert_eq!(storage.get(&event.audit_id).unwrap().unwrap(), event);
        assert_eq!(storage.position(&event.audit_id).unwrap(), Some(1));
        assert_eq!(storage.count(&tenant).unwrap(), 1);
        assert_eq!(
            storage.chain_head(&tenant).unwrap(),
            Some((1, event.this_hash))
        );
    }

    #[test]
    fn test_range_bounds() {
        let storage = MemoryAuditStorage::new();
        let material = material();
        let tenant = TenantId::new("t1").unwrap();

        let mut prev = ChainHash::genesis();
        for _ in 0..3 {
            let event = event_for(&material, &tenant, prev);
            prev = event.this_hash;
            storage.append(&event).unwrap();
        }

        assert_eq!(storage.get_range(&tenant, 1, 3).unwrap().len(), 3);
        assert_eq!(storage.get_range(&tenant, 2, 2).unwrap().len(), 1);
        // `to` clamps to the chain length.
        assert_eq!(storage.get_range(&tenant, 1, 100).unwrap().len(), 3);
        // Degenerate bounds are empty, not errors.
        assert!(storage.get_range(&tenant, 0, 3).unwrap().is_empty());
        assert!(storage.get_range(&tenant, 3, 2).unwrap().is_empty());
        assert!(storage.get_range(&tenant, 4, 9).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let material = material();
        let tenant = TenantId::new("t1").unwrap();

        let first;
        {
            let storage = FileAuditStorage::open(dir.path()).unwrap();
            first = event_for(&material, &tenant, ChainHash::genesis());
            storage.append(&first).unwrap();
            let second = event_for(&material, &tenant, first.this_hash);
            storage.append(&second).unwrap();
        }

        let storage = FileAuditStorage::open(dir.path()).unwrap();
        assert_eq!(storage.count(&tenant).unwrap(), 2);
        assert_eq!(storage.get(&first.audit_id).unwrap().unwrap(), first);
    }

    #[test]
    fn test_file_store_discards_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let material = material();
        let tenant = TenantId::new("t1").unwrap();

        {
            let storage = FileAuditStorage::open(dir.path()).unwrap();
            let event = event_for(&material, &tenant, ChainHash::genesis());
            storage.append(&event).unwrap();
        }

        // Simulate a crash mid-append: half a record, no newline.
        let path = dir.path().join("t1.log");
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"audit_id\":\"f00").unwrap();
        drop(file);

        let storage = FileAuditStorage::open(dir.path()).unwrap();
        assert_eq!(storage.count(&tenant).unwrap(), 1);

        // The remnant was truncated away, so a fresh append stays well-formed.
        let head = storage.chain_head(&tenant).unwrap().unwrap().1;
        storage.append(&event_for(&material, &tenant, head)).unwrap();
        drop(storage);

        let storage = FileAuditStorage::open(dir.path()).unwrap();
        assert_eq!(storage.count(&tenant).unwrap(), 2);
    }

    #[test]
    fn test_file_store_rejects_corrupt_middle_record() {
        let dir = tempfile::tempdir().unwrap();
        let material = material();
        let tenant = TenantId::new("t1").unwrap();

        {
            let storage = FileAuditStorage::open(dir.path()).unwrap();
            let event = event_for(&material, &tenant, ChainHash::genesis());
            storage.append(&event).unwrap();
        }

        let path = dir.path().join("t1.log");
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.insert_str(0, "not json\n");
        std::fs::write(&path, contents).unwrap();

        let result = FileAuditStorage::open(dir.path());
        assert!(matches!(result, Err(AuditError::Serialization(_))));
    }

    #[test]
    fn test_file_store_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "not a chain").unwrap();
        std::fs::write(dir.path().join("UPPER.log"), "bad tenant name").unwrap();

        let storage = FileAuditStorage::open(dir.path()).unwrap();
        assert_eq!(storage.count_all().unwrap(), 0);
    }
}
