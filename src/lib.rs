//! # datacube-meaning
//!
//! Semantic similarity search as a first-class query dimension over a
//! content-addressed object store: given a query vector, return the k objects
//! whose stored embeddings are closest under a configured metric.
//!
//! The crate is a library core with no async dependencies. It couples a
//! hand-rolled HNSW approximate nearest neighbor index to a narrow
//! [`store::ObjectStore`] adapter so the in-memory graph can be rebuilt from
//! persistent truth on startup; an optional [`provider::EmbeddingProvider`]
//! capability enables indexing and querying by raw text.

/// Global constants: tuning defaults, limits, and dimension identity.
pub mod config;
/// The meaning dimension façade: lifecycle, persistence, and query surface.
pub mod dimension;
/// Error taxonomy.
pub mod error;
/// HNSW approximate nearest neighbor index.
pub mod hnsw;
/// Metric kernel: cosine, euclidean, dot product, and validation.
pub mod metric;
/// Registry of known embedding models.
pub mod model;
/// Embedding provider capability.
pub mod provider;
/// Disk persistence for index snapshots.
pub mod snapshot;
/// Store adapter, record shapes, and the in-memory reference store.
pub mod store;

pub use dimension::{HnswTuning, MeaningDimension, MeaningDimensionConfig, MeaningQuery};
pub use error::MeaningError;
pub use hnsw::{HnswConfig, HnswIndex, SearchResult};
pub use metric::{
    cosine_similarity, dot_product, euclidean_distance, validate_embedding, Metric,
};
pub use model::{validate_model_compatibility, EmbeddingModel, ModelProvider};
pub use provider::{EmbeddingProvider, ProviderError};
pub use store::{
    CubeObject, DimensionRecord, MeaningDimensionValue, MeaningNode, MemoryStore, ObjectStore,
    PutResult, Record, RecordId, RecordType, StoreError,
};
