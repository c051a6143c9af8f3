//! Narrow interface to the external content-addressed object store.
//!
//! The store is a shared collaborator: writes are idempotent because records
//! are addressed by content hash, so concurrent dimension instances over the
//! same store cannot corrupt persistent state. [`MemoryStore`] is a provided
//! in-process implementation used by tests and embedders.

/// In-memory content-addressed store implementation.
pub mod memory;
/// Persisted record shapes and content-hash identities.
pub mod record;

pub use memory::MemoryStore;
pub use record::{
    CubeObject, DimensionRecord, MeaningDimensionValue, MeaningNode, Record, RecordId, RecordType,
};

use thiserror::Error;

/// Failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A record could not be decoded from its stored form.
    #[error("undecodable record {id}: {reason}")]
    Undecodable { id: String, reason: String },
}

/// Outcome of an idempotent content-addressed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    /// Content hash of the record.
    pub id: RecordId,
    /// True when the write created the record, false when it already existed.
    pub created: bool,
}

/// Adapter contract for the content-addressed object store.
pub trait ObjectStore: Send + Sync {
    /// Idempotent write of a typed record by content hash.
    fn put_unversioned(&self, record: &Record) -> Result<PutResult, StoreError>;

    /// Fetch a record by id.
    fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError>;

    /// All records of `target_type` that reference `source_id`, in the order
    /// they were first written.
    fn reverse_map(
        &self,
        source_id: &RecordId,
        target_type: RecordType,
    ) -> Result<Vec<RecordId>, StoreError>;
}
