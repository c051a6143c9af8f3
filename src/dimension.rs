//! The meaning dimension façade.
//!
//! Couples the in-memory HNSW index to the content-addressed object store so
//! the index can be rebuilt from truth on startup and mutated store-first:
//! every in-memory entry is backed by a persisted [`MeaningNode`] and
//! [`MeaningDimensionValue`] pair, written before the graph is touched.
//!
//! A [`MeaningDimension`] is a cloneable handle over shared state guarded by
//! a reader-writer lock: `init` / `index_*` / `remove` / `deserialize` are
//! writer-exclusive, queries and accessors take the shared side.

use crate::config;
use crate::error::{MeaningError, Result};
use crate::hnsw::{HnswConfig, HnswIndex, SearchResult};
use crate::metric::{validate_embedding, Metric};
use crate::model::{validate_model_compatibility, EmbeddingModel};
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::store::{
    DimensionRecord, MeaningDimensionValue, MeaningNode, ObjectStore, Record, RecordId, RecordType,
};
use parking_lot::RwLock;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Partial override of the HNSW tuning parameters.
///
/// Unset fields fall back to the defaults in [`crate::config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HnswTuning {
    pub m: Option<usize>,
    pub ef_construction: Option<usize>,
    pub ef_search: Option<usize>,
}

impl HnswTuning {
    fn resolve(&self) -> HnswConfig {
        let base = HnswConfig::default();
        HnswConfig {
            m: self.m.unwrap_or(base.m),
            ef_construction: self.ef_construction.unwrap_or(base.ef_construction),
            ef_search: self.ef_search.unwrap_or(base.ef_search),
        }
    }
}

/// Configuration for one meaning dimension instance.
#[derive(Clone)]
pub struct MeaningDimensionConfig {
    /// Embedding model every stored vector must come from.
    pub model: EmbeddingModel,
    /// Width for the `custom` model; required iff `model` is `Custom`.
    pub custom_dimensions: Option<usize>,
    /// Distance metric; defaults to cosine.
    pub metric: Metric,
    /// Partial HNSW tuning override.
    pub hnsw: HnswTuning,
    /// Optional embedding provider enabling the text path.
    pub provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl MeaningDimensionConfig {
    /// Configuration with defaults for everything but the model.
    pub fn new(model: EmbeddingModel) -> Self {
        Self {
            model,
            custom_dimensions: None,
            metric: Metric::Cosine,
            hnsw: HnswTuning::default(),
            provider: None,
        }
    }

    pub fn with_custom_dimensions(mut self, dimensions: usize) -> Self {
        self.custom_dimensions = Some(dimensions);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_hnsw(mut self, hnsw: HnswTuning) -> Self {
        self.hnsw = hnsw;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// A semantic similarity query against the dimension.
#[derive(Debug, Clone)]
pub struct MeaningQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    /// Inclusive lower bound on reported similarity.
    pub threshold: Option<f32>,
}

impl MeaningQuery {
    pub fn new(vector: Vec<f32>, k: usize) -> Self {
        Self {
            vector,
            k,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

#[derive(Debug)]
struct DimensionState {
    index: HnswIndex,
    dimension_id: Option<RecordId>,
    ready: bool,
    /// Floor for the next `created` timestamp; keeps them monotonic.
    last_created_ms: u64,
}

/// The meaning dimension: semantic similarity search over a content-addressed
/// object store.
///
/// Cloning produces a new handle to the same shared state.
#[derive(Clone)]
pub struct MeaningDimension {
    store: Arc<dyn ObjectStore>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    model: EmbeddingModel,
    dimensions: usize,
    metric: Metric,
    state: Arc<RwLock<DimensionState>>,
}

impl std::fmt::Debug for MeaningDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeaningDimension")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl MeaningDimension {
    /// Construct an uninitialized dimension instance over `store`.
    ///
    /// Resolves the index width from the model (or `custom_dimensions`) and
    /// validates the tuning parameters; nothing is persisted until
    /// [`init`](MeaningDimension::init).
    pub fn new(store: Arc<dyn ObjectStore>, config: MeaningDimensionConfig) -> Result<Self> {
        let dimensions = match config.model {
            EmbeddingModel::Custom => match config.custom_dimensions {
                Some(d) if d > 0 => d,
                Some(_) => {
                    return Err(MeaningError::Configuration(
                        "custom_dimensions must be positive".into(),
                    ))
                }
                None => {
                    return Err(MeaningError::Configuration(
                        "custom model requires custom_dimensions".into(),
                    ))
                }
            },
            model => model.dimensions(),
        };
        if dimensions > config::MAX_DIMENSION {
            return Err(MeaningError::Configuration(format!(
                "dimension width {dimensions} exceeds maximum {}",
                config::MAX_DIMENSION
            )));
        }

        let hnsw = config.hnsw.resolve();
        if hnsw.m < 2 {
            return Err(MeaningError::Configuration(format!(
                "hnsw m={} is below the minimum of 2",
                hnsw.m
            )));
        }
        if hnsw.ef_construction == 0 || hnsw.ef_search == 0 {
            return Err(MeaningError::Configuration(
                "hnsw ef parameters must be positive".into(),
            ));
        }

        if let Some(provider) = &config.provider {
            validate_model_compatibility(config.model, provider.model())?;
        }

        Ok(Self {
            store,
            provider: config.provider,
            model: config.model,
            dimensions,
            metric: config.metric,
            state: Arc::new(RwLock::new(DimensionState {
                index: HnswIndex::new(dimensions, config.metric, hnsw),
                dimension_id: None,
                ready: false,
                last_created_ms: 0,
            })),
        })
    }

    /// Initialize the dimension. Idempotent.
    ///
    /// Persists the singleton dimension record, rebuilds the in-memory index
    /// from the store, and transitions to ready.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.ready {
            return Ok(());
        }

        let record = Record::Dimension(DimensionRecord {
            name: config::DIMENSION_NAME.to_string(),
            data_type: config::DIMENSION_DATA_TYPE.to_string(),
            standard: true,
            shared: true,
            package_name: config::DIMENSION_PACKAGE.to_string(),
        });
        let put = self.store.put_unversioned(&record)?;
        state.dimension_id = Some(put.id);

        self.rebuild_index(&mut state, put.id)?;
        state.ready = true;
        info!(dimension_id = %put.id, size = state.index.size(), "meaning dimension initialized");
        Ok(())
    }

    /// Rebuild the in-memory graph from the store by reverse-map traversal.
    ///
    /// Any single broken chain is logged and skipped; only a failure to
    /// enumerate the dimension's values at all aborts.
    fn rebuild_index(&self, state: &mut DimensionState, dimension_id: RecordId) -> Result<()> {
        let mut index = HnswIndex::new(self.dimensions, self.metric, state.index.config().clone());
        let mut indexed = 0usize;
        let mut skipped = 0usize;

        let value_ids = self
            .store
            .reverse_map(&dimension_id, RecordType::MeaningDimensionValue)?;
        for value_id in value_ids {
            let value = match self.store.get(&value_id) {
                Ok(Some(Record::MeaningDimensionValue(v))) => v,
                Ok(Some(other)) => {
                    warn!(%value_id, record_type = ?other.record_type(),
                        "reverse map entry is not a dimension value, skipping");
                    skipped += 1;
                    continue;
                }
                Ok(None) => {
                    warn!(%value_id, "dangling dimension value, skipping");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%value_id, error = %e, "failed to load dimension value, skipping");
                    skipped += 1;
                    continue;
                }
            };

            let node = match self.store.get(&value.meaning_node_id) {
                Ok(Some(Record::MeaningNode(n))) => n,
                Ok(Some(other)) => {
                    warn!(%value_id, record_type = ?other.record_type(),
                        "dimension value does not reference a meaning node, skipping");
                    skipped += 1;
                    continue;
                }
                Ok(None) => {
                    warn!(%value_id, meaning_node_id = %value.meaning_node_id,
                        "meaning node missing from store, skipping");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%value_id, error = %e, "failed to load meaning node, skipping");
                    skipped += 1;
                    continue;
                }
            };

            if node.model != self.model {
                warn!(%value_id, expected = %self.model, actual = %node.model,
                    "meaning node model skew, skipping");
                skipped += 1;
                continue;
            }
            if let Err(e) = validate_embedding(&node.embedding, Some(self.dimensions)) {
                warn!(%value_id, error = %e, "meaning node embedding invalid, skipping");
                skipped += 1;
                continue;
            }

            let object_ids = match self.store.reverse_map(&value_id, RecordType::CubeObject) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(%value_id, error = %e, "failed to enumerate referencing objects, skipping");
                    skipped += 1;
                    continue;
                }
            };
            for object_id in object_ids {
                match index.add(object_id, value.meaning_node_id, &node.embedding) {
                    Ok(()) => indexed += 1,
                    Err(e) => {
                        warn!(%object_id, error = %e, "failed to index object during rebuild");
                        skipped += 1;
                    }
                }
            }
        }

        state.index = index;
        info!(indexed, skipped, "rebuilt meaning index from store");
        Ok(())
    }

    /// Persist the MeaningNode and its MeaningDimensionValue for `vector`,
    /// returning `(meaning_node_id, value_id)`.
    ///
    /// The value is found-or-created: an existing value for this dimension
    /// and node is reused, so identical content never mints a second value id
    /// differing only in its `created` timestamp.
    fn persist_value(
        &self,
        state: &mut DimensionState,
        dimension_id: RecordId,
        vector: &[f32],
        source_text: Option<&str>,
    ) -> Result<(RecordId, RecordId)> {
        let node = Record::MeaningNode(MeaningNode {
            embedding: vector.to_vec(),
            model: self.model,
            dimensions: vector.len(),
            source_text: source_text.map(String::from),
            content_type: source_text.map(|_| config::CONTENT_TYPE_TEXT.to_string()),
        });
        let node_id = self.store.put_unversioned(&node)?.id;

        for value_id in self
            .store
            .reverse_map(&node_id, RecordType::MeaningDimensionValue)?
        {
            if let Some(Record::MeaningDimensionValue(v)) = self.store.get(&value_id)? {
                if v.dimension_id == dimension_id {
                    return Ok((node_id, value_id));
                }
            }
        }

        let created = Self::next_created_ms(state);
        let value = Record::MeaningDimensionValue(MeaningDimensionValue {
            dimension_id,
            meaning_node_id: node_id,
            created,
        });
        let value_id = self.store.put_unversioned(&value)?.id;
        Ok((node_id, value_id))
    }

    fn next_created_ms(state: &mut DimensionState) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let ms = now.max(state.last_created_ms + 1);
        state.last_created_ms = ms;
        ms
    }

    /// Index an embedding for `object_id`. Returns the MeaningDimensionValue id.
    ///
    /// Store-first: the MeaningNode and MeaningDimensionValue are persisted
    /// before the graph is touched, so a store failure leaves the in-memory
    /// index unchanged.
    pub fn index_embedding(
        &self,
        object_id: RecordId,
        vector: &[f32],
        source_text: Option<&str>,
    ) -> Result<RecordId> {
        let mut state = self.state.write();
        let dimension_id = match (state.ready, state.dimension_id) {
            (true, Some(id)) => id,
            _ => return Err(MeaningError::NotInitialized),
        };
        validate_embedding(vector, Some(self.dimensions))?;

        let (node_id, value_id) = self.persist_value(&mut state, dimension_id, vector, source_text)?;
        state.index.add(object_id, node_id, vector)?;
        Ok(value_id)
    }

    /// Embed `text` with the configured provider and index the result.
    pub fn index_text(&self, object_id: RecordId, text: &str) -> Result<RecordId> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(MeaningError::NoEmbeddingProvider)?;
        let vector = provider.embed(text)?;
        self.index_embedding(object_id, &vector, Some(text))
    }

    /// Embed and index a batch of texts. Returns value ids in input order.
    pub fn index_texts(&self, items: &[(RecordId, String)]) -> Result<Vec<RecordId>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(MeaningError::NoEmbeddingProvider)?;
        let texts: Vec<String> = items.iter().map(|(_, text)| text.clone()).collect();
        let vectors = provider.embed_batch(&texts)?;
        if vectors.len() != items.len() {
            return Err(MeaningError::Provider(ProviderError(format!(
                "embed_batch returned {} vectors for {} texts",
                vectors.len(),
                items.len()
            ))));
        }
        items
            .iter()
            .zip(vectors.iter())
            .map(|((object_id, text), vector)| {
                self.index_embedding(*object_id, vector, Some(text))
            })
            .collect()
    }

    /// Object ids closest to the query vector, by descending similarity.
    pub fn query(&self, query: &MeaningQuery) -> Result<Vec<RecordId>> {
        Ok(self
            .query_with_scores(query)?
            .into_iter()
            .map(|hit| hit.object_id)
            .collect())
    }

    /// Like [`query`](MeaningDimension::query), with similarities.
    pub fn query_with_scores(&self, query: &MeaningQuery) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        if !state.ready {
            return Err(MeaningError::NotInitialized);
        }
        validate_embedding(&query.vector, Some(self.dimensions))?;
        state.index.search(&query.vector, query.k, query.threshold)
    }

    /// Embed `text` and query with the result.
    pub fn query_by_text(
        &self,
        text: &str,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(MeaningError::NoEmbeddingProvider)?;
        let vector = provider.embed(text)?;
        self.query_with_scores(&MeaningQuery {
            vector,
            k,
            threshold,
        })
    }

    /// Persist the MeaningNode and MeaningDimensionValue for `vector` and
    /// return the value id, without touching the in-memory index.
    ///
    /// Deterministic: calling twice with the same vector returns the same id.
    pub fn get_value_hash(&self, vector: &[f32]) -> Result<RecordId> {
        let mut state = self.state.write();
        let dimension_id = match (state.ready, state.dimension_id) {
            (true, Some(id)) => id,
            _ => return Err(MeaningError::NotInitialized),
        };
        validate_embedding(vector, Some(self.dimensions))?;
        let (_, value_id) = self.persist_value(&mut state, dimension_id, vector, None)?;
        Ok(value_id)
    }

    /// Drop `object_id` from the in-memory index. Returns `true` iff present.
    ///
    /// The store is append-only and untouched; the object reappears on the
    /// next rebuild if its records still chain to this dimension.
    pub fn remove(&self, object_id: &RecordId) -> Result<bool> {
        let mut state = self.state.write();
        if !state.ready {
            return Err(MeaningError::NotInitialized);
        }
        Ok(state.index.remove(object_id))
    }

    /// Returns `true` if `object_id` is currently indexed.
    pub fn is_indexed(&self, object_id: &RecordId) -> Result<bool> {
        let state = self.state.read();
        if !state.ready {
            return Err(MeaningError::NotInitialized);
        }
        Ok(state.index.has(object_id))
    }

    /// Number of indexed objects.
    pub fn size(&self) -> Result<usize> {
        let state = self.state.read();
        if !state.ready {
            return Err(MeaningError::NotInitialized);
        }
        Ok(state.index.size())
    }

    /// Stable id of the singleton dimension record.
    pub fn dimension_id(&self) -> Result<RecordId> {
        self.state
            .read()
            .dimension_id
            .ok_or(MeaningError::NotInitialized)
    }

    /// Model this instance stores embeddings from. Usable before `init`.
    pub fn model(&self) -> EmbeddingModel {
        self.model
    }

    /// Embedding width of the index. Usable before `init`.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Metric the index ranks under. Usable before `init`.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Serialize the in-memory index. Usable before `init`.
    ///
    /// Snapshots are caches: the authoritative recovery path is the rebuild
    /// performed by `init`.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.state.read().index.serialize()
    }

    /// Replace the in-memory index from a snapshot. Usable before `init`.
    ///
    /// The snapshot must carry this instance's width and metric; lifecycle
    /// state is unchanged.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<()> {
        let index = HnswIndex::deserialize(bytes)?;
        if index.dimensions() != self.dimensions {
            return Err(MeaningError::CorruptSerializedState(format!(
                "snapshot width {} != configured width {}",
                index.dimensions(),
                self.dimensions
            )));
        }
        if index.metric() != self.metric {
            return Err(MeaningError::CorruptSerializedState(format!(
                "snapshot metric {:?} != configured metric {:?}",
                index.metric(),
                self.metric
            )));
        }
        self.state.write().index = index;
        Ok(())
    }

    /// Write the index snapshot to `path` (atomic, CRC-checked).
    pub fn save_snapshot(&self, path: &Path) -> io::Result<()> {
        let bytes = self
            .serialize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        crate::snapshot::write_snapshot(path, &bytes)
    }

    /// Load and apply an index snapshot from `path`.
    pub fn load_snapshot(&self, path: &Path) -> io::Result<()> {
        let bytes = crate::snapshot::read_snapshot(path)?;
        self.deserialize(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}
