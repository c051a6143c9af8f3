//! HNSW search: single-layer best-first traversal and multi-layer KNN.

use crate::error::Result;
use crate::hnsw::graph::{HnswIndex, SearchResult};
use crate::hnsw::visited::Visited;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Best-first traversal of a single layer.
///
/// Returns up to `ef` nodes closest to `query` among those reachable from
/// `entry` over layer-`layer` edges, as `(distance, internal_id)` sorted by
/// ascending distance (ties by internal id, i.e. insertion order).
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry: u32,
    ef: usize,
    layer: usize,
    visited: &mut Visited,
) -> Vec<(f32, u32)> {
    visited.reset();

    // candidates: min-heap by distance; results: max-heap by distance so the
    // current furthest sits on top for O(1) eviction.
    let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> = BinaryHeap::new();
    let mut results: BinaryHeap<(OrderedFloat<f32>, u32)> = BinaryHeap::with_capacity(ef + 1);

    let entry_node = match index.node(entry) {
        Some(n) => n,
        None => return Vec::new(),
    };
    let entry_dist = index.metric.distance(query, &entry_node.embedding);
    visited.mark(entry);
    candidates.push(Reverse((OrderedFloat(entry_dist), entry)));
    results.push((OrderedFloat(entry_dist), entry));

    while let Some(Reverse((OrderedFloat(closest_dist), closest))) = candidates.pop() {
        let furthest_dist = results.peek().map_or(f32::MAX, |r| r.0 .0);
        if closest_dist > furthest_dist {
            break;
        }

        let node = match index.node(closest) {
            Some(n) => n,
            None => continue,
        };
        let neighbors = match node.connections.get(layer) {
            Some(list) => list,
            None => continue,
        };

        for &neighbor in neighbors {
            if !visited.mark(neighbor) {
                continue;
            }
            let neighbor_node = match index.node(neighbor) {
                Some(n) => n,
                None => continue,
            };
            let dist = index.metric.distance(query, &neighbor_node.embedding);
            let furthest_dist = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if results.len() < ef || dist < furthest_dist {
                candidates.push(Reverse((OrderedFloat(dist), neighbor)));
                results.push((OrderedFloat(dist), neighbor));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut out: Vec<(f32, u32)> = results
        .into_iter()
        .map(|(OrderedFloat(d), id)| (d, id))
        .collect();
    out.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    out
}

impl HnswIndex {
    /// K-nearest-neighbor search.
    ///
    /// Zooms in from the top layer with ef=1, then runs an ef-bounded search
    /// on layer 0, converts distances to similarities, and filters by the
    /// inclusive `threshold` lower bound. Results are ordered by descending
    /// similarity, ties broken by insertion order. An empty index returns an
    /// empty result; a vector of the wrong width is rejected.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        self.check_width(query)?;

        let entry = match self.entry_point {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(crate::config::MAX_K);

        let mut visited = Visited::with_capacity(self.slots.len());
        let mut current = entry;
        for layer in (1..=self.max_level).rev() {
            if let Some(&(_, nearest)) = search_layer(self, query, current, 1, layer, &mut visited).first()
            {
                current = nearest;
            }
        }

        let ef = self.config.ef_search.max(k);
        let mut hits = search_layer(self, query, current, ef, 0, &mut visited);
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .filter_map(|(dist, internal)| {
                let node = self.node(internal)?;
                let similarity = self.metric.similarity_from_distance(dist);
                if let Some(t) = threshold {
                    if similarity < t {
                        return None;
                    }
                }
                Some(SearchResult {
                    object_id: node.object_id,
                    meaning_node_id: node.meaning_node_id,
                    similarity,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeaningError;
    use crate::hnsw::graph::HnswConfig;
    use crate::metric::Metric;
    use crate::store::RecordId;

    fn rid(tag: &str) -> RecordId {
        RecordId::from_content(tag.as_bytes())
    }

    fn index_with(vectors: &[(&str, [f32; 2])]) -> HnswIndex {
        let mut idx = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        for (tag, v) in vectors {
            idx.add(rid(tag), rid(&format!("mn-{tag}")), v).unwrap();
        }
        idx
    }

    #[test]
    fn test_search_empty_index() {
        let idx = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        assert!(idx.search(&[1.0, 0.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_wrong_width() {
        let idx = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        assert!(matches!(
            idx.search(&[1.0], 5, None),
            Err(MeaningError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_search_single_element() {
        let idx = index_with(&[("a", [1.0, 0.0])]);
        let hits = idx.search(&[0.5, 0.5], 1, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object_id, rid("a"));
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let idx = index_with(&[
            ("east", [1.0, 0.0]),
            ("north", [0.0, 1.0]),
            ("west", [-1.0, 0.0]),
            ("south", [0.0, -1.0]),
            ("near-east", [0.9, 0.1]),
        ]);
        let hits = idx.search(&[1.0, 0.0], 3, None).unwrap();
        assert_eq!(hits[0].object_id, rid("east"));
        assert_eq!(hits[1].object_id, rid("near-east"));
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
    }

    #[test]
    fn test_threshold_is_inclusive_lower_bound() {
        let idx = index_with(&[("east", [1.0, 0.0]), ("north", [0.0, 1.0])]);
        // north has cosine similarity 0 to the query; threshold 0 keeps it
        let hits = idx.search(&[1.0, 0.0], 10, Some(0.0)).unwrap();
        assert_eq!(hits.len(), 2);
        let hits = idx.search(&[1.0, 0.0], 10, Some(0.5)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object_id, rid("east"));
    }

    #[test]
    fn test_k_exceeding_size_returns_all() {
        let idx = index_with(&[("a", [1.0, 0.0]), ("b", [0.0, 1.0]), ("c", [0.7, 0.7])]);
        let hits = idx.search(&[1.0, 1.0], 50, None).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let idx = index_with(&[("a", [1.0, 0.0])]);
        assert!(idx.search(&[1.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_zero_magnitude_query_does_not_crash() {
        let idx = index_with(&[("a", [1.0, 0.0]), ("zero", [0.0, 0.0])]);
        let hits = idx.search(&[0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
