//! Error taxonomy for the meaning dimension.

use crate::provider::ProviderError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the meaning dimension and its HNSW index.
#[derive(Debug, Error)]
pub enum MeaningError {
    /// Invalid instance configuration (e.g. `custom` model without a width).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation called before `init` completed.
    #[error("meaning dimension is not initialized")]
    NotInitialized,

    /// Text-path operation with no embedding provider configured.
    #[error("no embedding provider configured")]
    NoEmbeddingProvider,

    /// Embedding rejected at the boundary: empty, non-finite, or wrong width.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Vector width differs from the index width.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two explicitly compared embedding models differ.
    #[error("model mismatch: expected {expected}, got {actual}")]
    ModelMismatch { expected: String, actual: String },

    /// Failure reported by the content-addressed object store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Failure reported by the embedding provider.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Serialized index state violates a structural invariant.
    #[error("corrupt serialized index state: {0}")]
    CorruptSerializedState(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MeaningError>;
