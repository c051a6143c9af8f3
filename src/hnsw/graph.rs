//! HNSW graph structure and configuration.
//!
//! [`HnswIndex`] stores nodes in an arena indexed by a dense internal `u32`
//! id; neighbor sets hold internal ids, never pointers. The external identity
//! of a node is the content hash of the cube object it indexes, mapped to its
//! internal id on the side. Removed nodes leave tombstoned slots so internal
//! ids stay stable for the lifetime of the index.

use crate::config;
use crate::error::{MeaningError, Result};
use crate::metric::Metric;
use crate::store::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, and recall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Target maximum out-degree per node per layer.
    pub m: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
        }
    }
}

/// A node in the graph arena.
#[derive(Debug, Clone)]
pub(crate) struct HnswNode {
    pub(crate) object_id: RecordId,
    pub(crate) meaning_node_id: RecordId,
    pub(crate) embedding: Vec<f32>,
    pub(crate) level: usize,
    /// Neighbor internal ids per layer; length is always `level + 1`.
    pub(crate) connections: Vec<Vec<u32>>,
}

/// A search hit: the object, the meaning node backing it, and the reported
/// similarity under the index metric.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub object_id: RecordId,
    pub meaning_node_id: RecordId,
    pub similarity: f32,
}

/// In-memory HNSW approximate nearest neighbor index.
///
/// Single-writer structure: callers wanting concurrency wrap it in a
/// reader-writer lock with writer-exclusive `add`/`remove` and shared
/// `search`, which is exactly what [`crate::dimension::MeaningDimension`]
/// does.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) metric: Metric,
    pub(crate) dimensions: usize,
    /// Arena of nodes; `None` marks a removed slot. Internal ids are indices.
    pub(crate) slots: Vec<Option<HnswNode>>,
    /// External content hash → internal id, for live nodes only.
    pub(crate) ids: HashMap<RecordId, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
}

impl HnswIndex {
    /// Creates a new empty index with the given width, metric, and config.
    pub fn new(dimensions: usize, metric: Metric, config: HnswConfig) -> Self {
        Self {
            config,
            metric,
            dimensions,
            slots: Vec::new(),
            ids: HashMap::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Embedding width this index accepts.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Metric this index ranks under.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Tuning parameters.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Number of live nodes.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the index holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns `true` if `object_id` is indexed.
    pub fn has(&self, object_id: &RecordId) -> bool {
        self.ids.contains_key(object_id)
    }

    /// External ids of all live nodes, in insertion order.
    pub fn all_object_ids(&self) -> Vec<RecordId> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|n| n.object_id))
            .collect()
    }

    pub(crate) fn node(&self, internal: u32) -> Option<&HnswNode> {
        self.slots.get(internal as usize).and_then(|s| s.as_ref())
    }

    pub(crate) fn check_width(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(MeaningError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Draw a layer for a new node from the geometrically decaying
    /// distribution `P(level ≥ L+1 | level ≥ L) = M^(−L)`, capped at
    /// [`config::HNSW_MAX_LEVEL`].
    pub(crate) fn random_level(&self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        let mut level = 0usize;
        while rand::random::<f64>() < (-(level as f64) / ml).exp()
            && level < config::HNSW_MAX_LEVEL
        {
            level += 1;
        }
        level
    }
}
