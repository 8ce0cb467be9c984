//! Incremental proximity-graph index (HNSW-style).
//!
//! Insertions go straight into the live graph and are searchable
//! immediately, with no build step. Deletion is logical: the node stays in
//! the graph so traversal can still pass through it, but it is filtered from
//! results. As the deleted fraction grows, search widens its beam to
//! compensate, degrading latency until a rebuild reconstructs a clean graph
//! from the live vectors.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use tracing::debug;

use crate::config::{GraphConfig, IndexKind};
use crate::error::Result;
use crate::index::{check_dimensions, rank_candidates, ScoredId, VectorIndex};
use crate::metric::Metric;

struct GraphNode {
    doc_id: String,
    vector: Vec<f32>,
    neighbors: Vec<u64>,
    deleted: bool,
}

/// Mutable proximity-graph index with greedy beam-search traversal.
///
/// Construction parameters: `max_connections` caps the neighbor list per
/// node, `ef_construction` is the candidate breadth while inserting, and
/// `ef_search` the breadth while querying. Insertion order determines the
/// graph shape, so rebuilding from the same live set is deterministic.
pub struct GraphIndex {
    dimensions: usize,
    metric: Metric,
    max_connections: usize,
    ef_construction: usize,
    ef_search: usize,
    rebuild_threshold: f32,
    /// Nodes by internal ID; `BTreeMap` keeps iteration in insertion order.
    nodes: BTreeMap<u64, GraphNode>,
    id_to_internal: HashMap<String, u64>,
    /// Traversal starting point; always a live node or `None`.
    entry_point: Option<u64>,
    next_internal: u64,
    deleted_count: usize,
}

impl GraphIndex {
    /// Create an empty graph index for vectors of the given dimensionality.
    pub fn new(dimensions: usize, metric: Metric, config: &GraphConfig) -> Self {
        debug!(
            dimensions,
            ?metric,
            max_connections = config.max_connections,
            ef_construction = config.ef_construction,
            ef_search = config.ef_search,
            "initialized graph index"
        );
        Self {
            dimensions,
            metric,
            max_connections: config.max_connections,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            rebuild_threshold: config.rebuild_threshold,
            nodes: BTreeMap::new(),
            id_to_internal: HashMap::new(),
            entry_point: None,
            next_internal: 0,
            deleted_count: 0,
        }
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        self.metric.to_distance(self.metric.score(a, b))
    }

    /// Greedy beam search from the entry point, keeping the `ef` closest
    /// nodes seen. Deleted nodes participate in traversal (their edges are
    /// still useful) and are filtered by the caller.
    fn search_layer(&self, query: &[f32], ef: usize) -> Vec<(u64, f32)> {
        let Some(entry) = self.entry_point else { return Vec::new() };
        let Some(entry_node) = self.nodes.get(&entry) else { return Vec::new() };

        let d0 = self.distance(query, &entry_node.vector);
        let mut visited: HashSet<u64> = HashSet::from([entry]);
        let mut candidates = BinaryHeap::from([Reverse(DistEntry { dist: d0, id: entry })]);
        let mut found: BinaryHeap<DistEntry> = BinaryHeap::from([DistEntry { dist: d0, id: entry }]);

        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(worst) = found.peek() {
                if found.len() >= ef && current.dist > worst.dist {
                    break;
                }
            }
            let Some(node) = self.nodes.get(&current.id) else { continue };
            for &neighbor in &node.neighbors {
                if !visited.insert(neighbor) {
                    continue;
                }
                let Some(neighbor_node) = self.nodes.get(&neighbor) else { continue };
                let dist = self.distance(query, &neighbor_node.vector);
                let worst = found.peek().map(|w| w.dist).unwrap_or(f32::INFINITY);
                if found.len() < ef || dist < worst {
                    candidates.push(Reverse(DistEntry { dist, id: neighbor }));
                    found.push(DistEntry { dist, id: neighbor });
                    if found.len() > ef {
                        found.pop();
                    }
                }
            }
        }

        let mut out: Vec<(u64, f32)> = found.into_iter().map(|e| (e.id, e.dist)).collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Keep only the `max_connections` nearest neighbors of a node.
    fn prune_neighbors(&mut self, node_id: u64) {
        let (vector, neighbors) = match self.nodes.get(&node_id) {
            Some(n) if n.neighbors.len() > self.max_connections => {
                (n.vector.clone(), n.neighbors.clone())
            }
            _ => return,
        };
        let mut scored: Vec<(u64, f32)> = neighbors
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| (*id, self.distance(&vector, &n.vector))))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(self.max_connections);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.neighbors = scored.into_iter().map(|(id, _)| id).collect();
        }
    }
}

impl VectorIndex for GraphIndex {
    fn add_item(&mut self, doc_id: &str, vector: &[f32]) -> Result<()> {
        check_dimensions(self.dimensions, vector)?;
        if self.id_to_internal.contains_key(doc_id) {
            // Re-add: logically delete the old node; it keeps a fresh
            // internal ID like any other insert.
            self.delete_item(doc_id);
        }
        let internal = self.next_internal;
        self.next_internal += 1;

        let neighbors: Vec<u64> = if self.entry_point.is_some() {
            let ef = self.ef_construction.max(self.max_connections);
            self.search_layer(vector, ef)
                .into_iter()
                .filter(|(id, _)| self.nodes.get(id).is_some_and(|n| !n.deleted))
                .take(self.max_connections)
                .map(|(id, _)| id)
                .collect()
        } else {
            Vec::new()
        };

        self.nodes.insert(
            internal,
            GraphNode {
                doc_id: doc_id.to_string(),
                vector: vector.to_vec(),
                neighbors: neighbors.clone(),
                deleted: false,
            },
        );
        self.id_to_internal.insert(doc_id.to_string(), internal);
        if self.entry_point.is_none() {
            self.entry_point = Some(internal);
        }

        for neighbor in neighbors {
            if let Some(node) = self.nodes.get_mut(&neighbor) {
                if !node.neighbors.contains(&internal) {
                    node.neighbors.push(internal);
                }
            }
            self.prune_neighbors(neighbor);
        }
        Ok(())
    }

    fn delete_item(&mut self, doc_id: &str) -> bool {
        match self.id_to_internal.remove(doc_id) {
            Some(internal) => {
                if let Some(node) = self.nodes.get_mut(&internal) {
                    if !node.deleted {
                        node.deleted = true;
                        self.deleted_count += 1;
                    }
                }
                if self.entry_point == Some(internal) {
                    self.entry_point =
                        self.nodes.iter().find(|(_, n)| !n.deleted).map(|(id, _)| *id);
                }
                debug!(doc.id = %doc_id, deleted = self.deleted_count, "marked node deleted");
                true
            }
            None => false,
        }
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredId>> {
        check_dimensions(self.dimensions, query)?;
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        // Widen the beam by the deleted count so logically removed nodes
        // cannot crowd live results out of the frontier.
        let ef = self.ef_search.max(top_k).saturating_add(self.deleted_count);
        let scored: Vec<(u64, f32)> = self
            .search_layer(query, ef)
            .into_iter()
            .filter_map(|(id, _)| {
                self.nodes
                    .get(&id)
                    .filter(|n| !n.deleted)
                    .map(|n| (id, self.metric.score(query, &n.vector)))
            })
            .collect();

        Ok(rank_candidates(self.metric, scored, top_k)
            .into_iter()
            .filter_map(|(id, score)| {
                self.nodes.get(&id).map(|n| ScoredId { doc_id: n.doc_id.clone(), score })
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.nodes.len() - self.deleted_count
    }

    fn rebuild(&mut self) -> Result<()> {
        let live: Vec<(String, Vec<f32>)> = self
            .nodes
            .values()
            .filter(|n| !n.deleted)
            .map(|n| (n.doc_id.clone(), n.vector.clone()))
            .collect();

        self.nodes.clear();
        self.id_to_internal.clear();
        self.entry_point = None;
        self.next_internal = 0;
        self.deleted_count = 0;

        for (doc_id, vector) in &live {
            self.add_item(doc_id, vector)?;
        }
        debug!(items = live.len(), "rebuilt graph index");
        Ok(())
    }

    fn is_searchable(&self) -> bool {
        true
    }

    fn needs_rebuild(&self) -> bool {
        if self.deleted_count == 0 {
            return false;
        }
        self.deleted_count as f32 > self.rebuild_threshold * self.len().max(1) as f32
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Graph
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A node at a known distance from the query, ordered by distance.
struct DistEntry {
    dist: f32,
    id: u64,
}

impl PartialEq for DistEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for DistEntry {}

impl PartialOrd for DistEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist.total_cmp(&other.dist).then_with(|| self.id.cmp(&other.id))
    }
}
