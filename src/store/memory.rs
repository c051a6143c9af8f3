//! In-memory content-addressed object store.
//!
//! Records are addressed by the SHA-256 hash of their canonical JSON form.
//! Reverse maps are maintained on write, keyed by (referenced id,
//! referencing type), with referencing ids kept in first-write order so
//! enumeration is deterministic.

use crate::store::{ObjectStore, PutResult, Record, RecordId, RecordType, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryStoreInner {
    records: HashMap<RecordId, Record>,
    reverse: HashMap<(RecordId, RecordType), Vec<RecordId>>,
}

/// Thread-safe in-memory store. Cloning produces a handle to the same data,
/// which lets tests simulate process restarts against surviving state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn put_unversioned(&self, record: &Record) -> Result<PutResult, StoreError> {
        let id = record.content_id();
        let mut inner = self.inner.write();
        if inner.records.contains_key(&id) {
            return Ok(PutResult { id, created: false });
        }
        for target in record.references() {
            inner
                .reverse
                .entry((target, record.record_type()))
                .or_default()
                .push(id);
        }
        inner.records.insert(id, record.clone());
        Ok(PutResult { id, created: true })
    }

    fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.inner.read().records.get(id).cloned())
    }

    fn reverse_map(
        &self,
        source_id: &RecordId,
        target_type: RecordType,
    ) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .inner
            .read()
            .reverse
            .get(&(*source_id, target_type))
            .cloned()
            .unwrap_or_default())
    }
}
