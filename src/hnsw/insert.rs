//! HNSW insertion and removal.
//!
//! Insertion draws a layer from the geometric distribution, zooms in from the
//! entry point down to the node's layer, then wires bidirectional edges to
//! the closest M candidates on every layer the node occupies. Neighbor sets
//! are allowed to grow past M over time; edges are only ever added in pairs
//! and removed in pairs, so connection symmetry holds unconditionally.

use crate::error::Result;
use crate::hnsw::graph::{HnswIndex, HnswNode};
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::Visited;
use crate::store::RecordId;

impl HnswIndex {
    /// Insert an object into the graph. Idempotent on `object_id`: a second
    /// insert with the same id leaves the graph untouched.
    pub fn add(
        &mut self,
        object_id: RecordId,
        meaning_node_id: RecordId,
        embedding: &[f32],
    ) -> Result<()> {
        self.check_width(embedding)?;
        if self.ids.contains_key(&object_id) {
            return Ok(());
        }

        let level = self.random_level();
        let internal = self.slots.len() as u32;
        let connections = vec![Vec::new(); level + 1];

        // First node becomes the entry point
        if self.entry_point.is_none() {
            self.slots.push(Some(HnswNode {
                object_id,
                meaning_node_id,
                embedding: embedding.to_vec(),
                level,
                connections,
            }));
            self.ids.insert(object_id, internal);
            self.entry_point = Some(internal);
            self.max_level = level;
            return Ok(());
        }

        let entry = self.entry_point.expect("entry_point is Some after guard");
        let mut visited = Visited::with_capacity(self.slots.len());

        // Zoom-in: greedy descent from the top layer to level+1, no edges added
        let mut current = entry;
        for layer in (level + 1..=self.max_level).rev() {
            if let Some(&(_, nearest)) =
                search_layer(self, embedding, current, 1, layer, &mut visited).first()
            {
                current = nearest;
            }
        }

        // Collect neighbors per layer before mutating the arena
        let top = level.min(self.max_level);
        let mut selected_per_layer: Vec<Vec<u32>> = Vec::with_capacity(top + 1);
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                embedding,
                current,
                self.config.ef_construction,
                layer,
                &mut visited,
            );
            // Simple heuristic: first M by ascending distance
            let selected: Vec<u32> = candidates
                .iter()
                .take(self.config.m)
                .map(|&(_, id)| id)
                .collect();
            selected_per_layer.push(selected);
            if let Some(&(_, nearest)) = candidates.first() {
                current = nearest;
            }
        }
        selected_per_layer.reverse(); // back to layer-ascending order

        let mut node = HnswNode {
            object_id,
            meaning_node_id,
            embedding: embedding.to_vec(),
            level,
            connections,
        };
        for (layer, selected) in selected_per_layer.iter().enumerate() {
            node.connections[layer] = selected.clone();
        }
        self.slots.push(Some(node));
        self.ids.insert(object_id, internal);

        // Back-edges from each chosen neighbor
        for (layer, selected) in selected_per_layer.iter().enumerate() {
            for &neighbor in selected {
                if let Some(other) = self.slots[neighbor as usize].as_mut() {
                    if let Some(list) = other.connections.get_mut(layer) {
                        list.push(internal);
                    }
                }
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(internal);
        }
        Ok(())
    }

    /// Remove an object from the graph. Returns `true` iff it was present.
    ///
    /// The node is scrubbed from every neighbor's connection list on every
    /// layer it occupies, then its slot is tombstoned. No graph repair is
    /// performed; recall degrades gracefully. If the removed node was the
    /// entry point, a remaining node of maximum level is elected (first
    /// encountered in arena order), or the graph resets to empty.
    pub fn remove(&mut self, object_id: &RecordId) -> bool {
        let internal = match self.ids.remove(object_id) {
            Some(i) => i,
            None => return false,
        };
        let node = self.slots[internal as usize]
            .take()
            .expect("mapped id points at a live slot");

        for (layer, neighbors) in node.connections.iter().enumerate() {
            for &neighbor in neighbors {
                if let Some(other) = self.slots[neighbor as usize].as_mut() {
                    if let Some(list) = other.connections.get_mut(layer) {
                        list.retain(|&id| id != internal);
                    }
                }
            }
        }

        if self.entry_point == Some(internal) {
            self.entry_point = None;
            self.max_level = 0;
            let mut best: Option<(u32, usize)> = None;
            for (i, slot) in self.slots.iter().enumerate() {
                if let Some(n) = slot {
                    if best.map_or(true, |(_, level)| n.level > level) {
                        best = Some((i as u32, n.level));
                    }
                }
            }
            if let Some((id, level)) = best {
                self.entry_point = Some(id);
                self.max_level = level;
            }
        }
        true
    }
}
