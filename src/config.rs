//! Global configuration constants for the meaning dimension.
//!
//! Tuning parameters and input validation limits are defined here.
//! Per-instance configuration (model, metric, HNSW overrides) is handled by
//! [`crate::dimension::MeaningDimensionConfig`].

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Hard ceiling on the layer a node may be assigned to.
///
/// Caps memory for pathological draws from the level distribution.
pub const HNSW_MAX_LEVEL: usize = 16;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per query.
pub const MAX_K: usize = 10_000;

/// Name of the singleton dimension record.
pub const DIMENSION_NAME: &str = "meaning";

/// Data type carried by the dimension record.
pub const DIMENSION_DATA_TYPE: &str = "object";

/// Package tag carried by the dimension record.
pub const DIMENSION_PACKAGE: &str = "meaning.core";

/// Content type recorded on meaning nodes built from text.
pub const CONTENT_TYPE_TEXT: &str = "text";

/// Magic bytes appended before the CRC32 footer of an index snapshot file.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"MSN1";
