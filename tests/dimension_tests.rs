//! End-to-end tests for the meaning dimension over the in-memory store.

use datacube_meaning::{
    cosine_similarity, CubeObject, EmbeddingModel, EmbeddingProvider, MeaningDimension,
    MeaningDimensionConfig, MeaningError, MeaningQuery, MemoryStore, Metric, ProviderError,
    Record, RecordId, StoreError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn rid(tag: &str) -> RecordId {
    RecordId::from_content(tag.as_bytes())
}

fn custom_dimension(store: &MemoryStore, width: usize) -> MeaningDimension {
    let dim = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::Custom).with_custom_dimensions(width),
    )
    .expect("valid config");
    dim.init().expect("init succeeds");
    dim
}

/// Index a vector the way a cube collaborator would: value hash first, then
/// the cube object referencing it, then the index entry. Returns the object id.
fn index_object(store: &MemoryStore, dim: &MeaningDimension, name: &str, vector: &[f32]) -> RecordId {
    use datacube_meaning::ObjectStore;
    let value_id = dim.get_value_hash(vector).expect("value hash");
    let object = Record::CubeObject(CubeObject {
        payload: serde_json::json!({ "name": name }),
        dimension_values: vec![value_id],
    });
    let object_id = store.put_unversioned(&object).expect("put object").id;
    dim.index_embedding(object_id, vector, None).expect("index");
    object_id
}

fn random_unit_vector(rng: &mut StdRng, width: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..width).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[test]
fn basic_recall_on_known_vectors() {
    let store = MemoryStore::new();
    let dim = custom_dimension(&store, 2);

    let vectors: [(&str, [f32; 2]); 5] = [
        ("east", [1.0, 0.0]),
        ("north", [0.0, 1.0]),
        ("west", [-1.0, 0.0]),
        ("south", [0.0, -1.0]),
        ("near-east", [0.9, 0.1]),
    ];
    let mut ids = std::collections::HashMap::new();
    for (name, v) in &vectors {
        ids.insert(*name, index_object(&store, &dim, name, v));
    }
    assert_eq!(dim.size().unwrap(), 5);

    let hits = dim
        .query_with_scores(&MeaningQuery::new(vec![1.0, 0.0], 2).with_threshold(0.8))
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].object_id, ids["east"]);
    assert_eq!(hits[1].object_id, ids["near-east"]);
    assert!((hits[0].similarity - 1.0).abs() < 1e-4, "got {}", hits[0].similarity);
    assert!((hits[1].similarity - 0.9939).abs() < 1e-3, "got {}", hits[1].similarity);
}

#[test]
fn wrong_width_embedding_is_invalid() {
    let store = MemoryStore::new();
    let dim = custom_dimension(&store, 3);
    let err = dim.index_embedding(rid("obj"), &[1.0, 2.0], None).unwrap_err();
    assert!(matches!(err, MeaningError::InvalidEmbedding(_)));
}

#[test]
fn query_before_init_is_not_initialized() {
    let store = MemoryStore::new();
    let dim = MeaningDimension::new(
        Arc::new(store),
        MeaningDimensionConfig::new(EmbeddingModel::Custom).with_custom_dimensions(2),
    )
    .unwrap();
    let err = dim.query(&MeaningQuery::new(vec![1.0, 0.0], 1)).unwrap_err();
    assert!(matches!(err, MeaningError::NotInitialized));
}

#[test]
fn rebuild_across_restart_agrees_on_top_10() {
    let store = MemoryStore::new();
    let dim = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::AllMiniLmL6V2),
    )
    .unwrap();
    dim.init().unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..100 {
        let v = random_unit_vector(&mut rng, 384);
        index_object(&store, &dim, &format!("doc-{i}"), &v);
    }
    assert_eq!(dim.size().unwrap(), 100);

    let query = random_unit_vector(&mut rng, 384);
    let before: Vec<RecordId> = dim.query(&MeaningQuery::new(query.clone(), 10)).unwrap();
    assert_eq!(before.len(), 10);

    // "Restart": a fresh instance over the surviving store
    let reborn = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::AllMiniLmL6V2),
    )
    .unwrap();
    reborn.init().unwrap();
    assert_eq!(reborn.size().unwrap(), 100);

    let after: Vec<RecordId> = reborn.query(&MeaningQuery::new(query, 10)).unwrap();
    let overlap = after.iter().filter(|id| before.contains(id)).count();
    assert!(overlap >= 9, "top-10 overlap after rebuild was {overlap}/10");
}

#[test]
fn rebuild_skips_model_skewed_nodes() {
    use datacube_meaning::{DimensionRecord, MeaningDimensionValue, MeaningNode, ObjectStore};
    let store = MemoryStore::new();

    // The dimension record is content-addressed, so its id can be computed
    // ahead of init by writing the same fields the dimension writes.
    let dimension_id = store
        .put_unversioned(&Record::Dimension(DimensionRecord {
            name: "meaning".to_string(),
            data_type: "object".to_string(),
            standard: true,
            shared: true,
            package_name: "meaning.core".to_string(),
        }))
        .unwrap()
        .id;

    let seed = |model: EmbeddingModel, width: usize, fill: f32, created: u64| -> RecordId {
        let node_id = store
            .put_unversioned(&Record::MeaningNode(MeaningNode {
                embedding: vec![fill; width],
                model,
                dimensions: width,
                source_text: None,
                content_type: None,
            }))
            .unwrap()
            .id;
        let value_id = store
            .put_unversioned(&Record::MeaningDimensionValue(MeaningDimensionValue {
                dimension_id,
                meaning_node_id: node_id,
                created,
            }))
            .unwrap()
            .id;
        let object = Record::CubeObject(CubeObject {
            payload: serde_json::json!({ "model": model.name() }),
            dimension_values: vec![value_id],
        });
        store.put_unversioned(&object).unwrap().id
    };

    let minilm_object = seed(EmbeddingModel::AllMiniLmL6V2, 384, 0.1, 1);
    let skewed_object = seed(EmbeddingModel::BgeBaseEnV15, 768, 0.2, 2);

    let dim = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::AllMiniLmL6V2),
    )
    .unwrap();
    dim.init().unwrap();

    assert_eq!(dim.size().unwrap(), 1);
    assert!(dim.is_indexed(&minilm_object).unwrap());
    assert!(!dim.is_indexed(&skewed_object).unwrap());
}

#[test]
fn euclidean_similarity_reporting() {
    let store = MemoryStore::new();
    let dim = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::Custom)
            .with_custom_dimensions(1)
            .with_metric(Metric::Euclidean),
    )
    .unwrap();
    dim.init().unwrap();

    // Distances from the query at 0.0 are exactly 0, 1, and 3
    let origin = index_object(&store, &dim, "origin", &[0.0]);
    let one = index_object(&store, &dim, "one", &[1.0]);
    let three = index_object(&store, &dim, "three", &[3.0]);

    let hits = dim
        .query_with_scores(&MeaningQuery::new(vec![0.0], 3))
        .unwrap();
    let sim_of = |id: RecordId| hits.iter().find(|h| h.object_id == id).unwrap().similarity;
    assert!((sim_of(origin) - 1.0).abs() < 1e-6);
    assert!((sim_of(one) - 0.5).abs() < 1e-6);
    assert!((sim_of(three) - 0.25).abs() < 1e-6);
}

#[test]
fn reported_order_matches_exact_cosine_ranking() {
    let store = MemoryStore::new();
    let dim = custom_dimension(&store, 8);

    let mut rng = StdRng::seed_from_u64(21);
    let mut stored: Vec<(RecordId, Vec<f32>)> = Vec::new();
    for i in 0..30 {
        let v = random_unit_vector(&mut rng, 8);
        let id = index_object(&store, &dim, &format!("v{i}"), &v);
        stored.push((id, v));
    }

    let query = random_unit_vector(&mut rng, 8);
    let hits = dim
        .query_with_scores(&MeaningQuery::new(query.clone(), 30))
        .unwrap();
    assert_eq!(hits.len(), 30);

    // Descending similarity, and each reported similarity equals the exact
    // cosine similarity of the stored vector.
    for w in hits.windows(2) {
        assert!(w[0].similarity >= w[1].similarity - 1e-6);
    }
    for hit in &hits {
        let (_, v) = stored.iter().find(|(id, _)| *id == hit.object_id).unwrap();
        let exact = cosine_similarity(&query, v).unwrap();
        assert!(
            (hit.similarity - exact).abs() < 1e-5,
            "reported {} vs exact {exact}",
            hit.similarity
        );
    }
}

#[test]
fn text_path_round_trip() {
    /// Deterministic embedder: character histogram folded into 4 buckets.
    struct HistogramProvider;
    impl EmbeddingProvider for HistogramProvider {
        fn model(&self) -> EmbeddingModel {
            EmbeddingModel::Custom
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let mut v = [0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                v[i % 4] += b as f32 / 255.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            Ok(v.iter().map(|x| if norm > 0.0 { x / norm } else { 0.0 }).collect())
        }
    }

    use datacube_meaning::ObjectStore;
    let store = MemoryStore::new();
    let dim = MeaningDimension::new(
        Arc::new(store.clone()),
        MeaningDimensionConfig::new(EmbeddingModel::Custom)
            .with_custom_dimensions(4)
            .with_provider(Arc::new(HistogramProvider)),
    )
    .unwrap();
    dim.init().unwrap();

    let value_id = dim.index_text(rid("greeting"), "hello world").unwrap();

    // The persisted meaning node carries the source text
    match store.get(&value_id).unwrap() {
        Some(Record::MeaningDimensionValue(v)) => match store.get(&v.meaning_node_id).unwrap() {
            Some(Record::MeaningNode(node)) => {
                assert_eq!(node.source_text.as_deref(), Some("hello world"));
                assert_eq!(node.content_type.as_deref(), Some("text"));
            }
            other => panic!("expected meaning node, got {other:?}"),
        },
        other => panic!("expected dimension value, got {other:?}"),
    }

    let hits = dim.query_by_text("hello world", 1, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object_id, rid("greeting"));
    assert!(hits[0].similarity > 0.99);

    // Batch path
    let ids = dim
        .index_texts(&[
            (rid("a"), "alpha".to_string()),
            (rid("b"), "beta".to_string()),
        ])
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(dim.size().unwrap(), 3);
}

#[test]
fn snapshot_file_round_trip() {
    let store = MemoryStore::new();
    let dim = custom_dimension(&store, 2);
    for (name, v) in [("a", [1.0, 0.0]), ("b", [0.0, 1.0]), ("c", [0.7, 0.7])] {
        index_object(&store, &dim, name, &v);
    }

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("meaning.msn");
    dim.save_snapshot(&path).unwrap();

    // A fresh instance over an empty store: init gives an empty index, the
    // snapshot repopulates it as a cache.
    let empty_store = MemoryStore::new();
    let cold = custom_dimension(&empty_store, 2);
    assert_eq!(cold.size().unwrap(), 0);
    cold.load_snapshot(&path).unwrap();
    assert_eq!(cold.size().unwrap(), 3);

    let before = dim.query(&MeaningQuery::new(vec![0.9, 0.1], 3)).unwrap();
    let after = cold.query(&MeaningQuery::new(vec![0.9, 0.1], 3)).unwrap();
    assert_eq!(before, after);
}

#[test]
fn store_failure_surfaces_and_leaves_index_unchanged() {
    /// A store whose writes fail after a configurable number of puts.
    struct FailingStore {
        inner: MemoryStore,
        allowed_puts: std::sync::atomic::AtomicUsize,
    }
    impl datacube_meaning::ObjectStore for FailingStore {
        fn put_unversioned(&self, record: &Record) -> Result<datacube_meaning::PutResult, StoreError> {
            use std::sync::atomic::Ordering;
            if self.allowed_puts.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(StoreError::Backend("write quota exhausted".into()));
            }
            self.inner.put_unversioned(record)
        }
        fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
            self.inner.get(id)
        }
        fn reverse_map(
            &self,
            source_id: &RecordId,
            target_type: datacube_meaning::RecordType,
        ) -> Result<Vec<RecordId>, StoreError> {
            self.inner.reverse_map(source_id, target_type)
        }
    }

    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        // One put for the dimension record, then none for the meaning node
        allowed_puts: std::sync::atomic::AtomicUsize::new(1),
    });
    let dim = MeaningDimension::new(
        store,
        MeaningDimensionConfig::new(EmbeddingModel::Custom).with_custom_dimensions(2),
    )
    .unwrap();
    dim.init().unwrap();

    let err = dim.index_embedding(rid("obj"), &[1.0, 0.0], None).unwrap_err();
    assert!(matches!(err, MeaningError::Store(_)));
    // Store-first ordering: the failed write left no in-memory trace
    assert_eq!(dim.size().unwrap(), 0);
    assert!(!dim.is_indexed(&rid("obj")).unwrap());
}

#[test]
fn serialize_deserialize_reproduces_query_results() {
    let store = MemoryStore::new();
    let dim = custom_dimension(&store, 4);
    let mut rng = StdRng::seed_from_u64(3);
    for i in 0..25 {
        let v = random_unit_vector(&mut rng, 4);
        index_object(&store, &dim, &format!("p{i}"), &v);
    }

    let bytes = dim.serialize().unwrap();
    let clone_store = MemoryStore::new();
    let restored = custom_dimension(&clone_store, 4);
    restored.deserialize(&bytes).unwrap();

    for _ in 0..5 {
        let q = random_unit_vector(&mut rng, 4);
        let a = dim.query_with_scores(&MeaningQuery::new(q.clone(), 5)).unwrap();
        let b = restored.query_with_scores(&MeaningQuery::new(q, 5)).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.object_id, y.object_id);
            assert_eq!(x.similarity, y.similarity);
        }
    }
}
