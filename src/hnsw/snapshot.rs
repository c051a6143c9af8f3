//! Index snapshot: a self-describing document for serialize/deserialize.
//!
//! Snapshots are caches, not truth: the authoritative recovery path is the
//! dimension's rebuild from the object store. `deserialize` revalidates every
//! structural invariant before accepting a snapshot and fails with
//! `CorruptSerializedState` otherwise.

use crate::error::{MeaningError, Result};
use crate::hnsw::graph::{HnswConfig, HnswIndex, HnswNode};
use crate::metric::Metric;
use crate::store::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct NodeSnapshot {
    object_id: RecordId,
    meaning_node_id: RecordId,
    embedding: Vec<f32>,
    level: usize,
    /// Per-layer neighbor lists, identified by external object id.
    connections: Vec<Vec<RecordId>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    dimensions: usize,
    metric: Metric,
    config: HnswConfig,
    entry_point: Option<RecordId>,
    max_level: usize,
    nodes: Vec<NodeSnapshot>,
}

fn corrupt(msg: impl Into<String>) -> MeaningError {
    MeaningError::CorruptSerializedState(msg.into())
}

impl HnswIndex {
    /// Serialize the index into a self-describing JSON document.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let nodes: Vec<NodeSnapshot> = self
            .slots
            .iter()
            .flatten()
            .map(|node| NodeSnapshot {
                object_id: node.object_id,
                meaning_node_id: node.meaning_node_id,
                embedding: node.embedding.clone(),
                level: node.level,
                connections: node
                    .connections
                    .iter()
                    .map(|layer| {
                        layer
                            .iter()
                            .filter_map(|&n| self.node(n).map(|o| o.object_id))
                            .collect()
                    })
                    .collect(),
            })
            .collect();

        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            dimensions: self.dimensions,
            metric: self.metric,
            config: self.config.clone(),
            entry_point: self
                .entry_point
                .and_then(|e| self.node(e))
                .map(|n| n.object_id),
            max_level: self.max_level,
            nodes,
        };
        serde_json::to_vec(&snapshot)
            .map_err(|e| corrupt(format!("snapshot encoding failed: {e}")))
    }

    /// Reconstruct an index from a snapshot produced by [`HnswIndex::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<HnswIndex> {
        let snapshot: IndexSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| corrupt(format!("snapshot decoding failed: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.dimensions == 0 {
            return Err(corrupt("snapshot dimensions must be positive"));
        }
        if snapshot.config.m < 2 {
            return Err(corrupt(format!(
                "snapshot config m={} is below the minimum of 2",
                snapshot.config.m
            )));
        }

        // First pass: assign internal ids in snapshot order
        let mut ids: HashMap<RecordId, u32> = HashMap::with_capacity(snapshot.nodes.len());
        for (i, node) in snapshot.nodes.iter().enumerate() {
            if ids.insert(node.object_id, i as u32).is_some() {
                return Err(corrupt(format!("duplicate object id {}", node.object_id)));
            }
        }

        // Second pass: structural checks and neighbor resolution
        let mut slots: Vec<Option<HnswNode>> = Vec::with_capacity(snapshot.nodes.len());
        for node in &snapshot.nodes {
            if node.embedding.len() != snapshot.dimensions {
                return Err(corrupt(format!(
                    "node {} embedding width {} != index dimensions {}",
                    node.object_id,
                    node.embedding.len(),
                    snapshot.dimensions
                )));
            }
            if node.connections.len() != node.level + 1 {
                return Err(corrupt(format!(
                    "node {} has {} connection layers for level {}",
                    node.object_id,
                    node.connections.len(),
                    node.level
                )));
            }
            if node.level > snapshot.max_level {
                return Err(corrupt(format!(
                    "node {} level {} exceeds max_level {}",
                    node.object_id, node.level, snapshot.max_level
                )));
            }
            let mut connections = Vec::with_capacity(node.connections.len());
            for layer in &node.connections {
                let mut resolved = Vec::with_capacity(layer.len());
                for neighbor in layer {
                    let internal = ids.get(neighbor).ok_or_else(|| {
                        corrupt(format!(
                            "node {} references unknown neighbor {neighbor}",
                            node.object_id
                        ))
                    })?;
                    resolved.push(*internal);
                }
                connections.push(resolved);
            }
            slots.push(Some(HnswNode {
                object_id: node.object_id,
                meaning_node_id: node.meaning_node_id,
                embedding: node.embedding.clone(),
                level: node.level,
                connections,
            }));
        }

        // Symmetry: j ∈ connections(i, L) ⇔ i ∈ connections(j, L)
        for node in &snapshot.nodes {
            for (layer, neighbors) in node.connections.iter().enumerate() {
                for neighbor in neighbors {
                    let j = ids[neighbor] as usize;
                    let back = snapshot.nodes[j]
                        .connections
                        .get(layer)
                        .map_or(false, |l| l.contains(&node.object_id));
                    if !back {
                        return Err(corrupt(format!(
                            "asymmetric edge {} -> {} at layer {layer}",
                            node.object_id, neighbor
                        )));
                    }
                }
            }
        }

        // Entry point invariants
        let entry_point = match snapshot.entry_point {
            None => {
                if !snapshot.nodes.is_empty() {
                    return Err(corrupt("non-empty snapshot without an entry point"));
                }
                if snapshot.max_level != 0 {
                    return Err(corrupt("empty snapshot with nonzero max_level"));
                }
                None
            }
            Some(ep) => {
                let internal = *ids
                    .get(&ep)
                    .ok_or_else(|| corrupt(format!("entry point {ep} is not a node")))?;
                let level = snapshot.nodes[internal as usize].level;
                if level != snapshot.max_level {
                    return Err(corrupt(format!(
                        "entry point level {level} != max_level {}",
                        snapshot.max_level
                    )));
                }
                Some(internal)
            }
        };

        Ok(HnswIndex {
            config: snapshot.config,
            metric: snapshot.metric,
            dimensions: snapshot.dimensions,
            slots,
            ids,
            entry_point,
            max_level: snapshot.max_level,
        })
    }
}
