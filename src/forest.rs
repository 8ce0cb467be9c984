//! Build-once tree-forest index (ANNOY-style).
//!
//! Vectors accumulate in a buffer until [`rebuild`](crate::index::VectorIndex::rebuild)
//! compiles them into a forest of random-projection trees. Searching an
//! unbuilt forest fails with [`SearchError::IndexNotBuilt`]; adding to a
//! built forest transparently demotes it back to accumulating. Deletion only
//! tombstones entries, which keep occupying the built trees until the next
//! rebuild compacts them away.

use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{ForestConfig, IndexKind};
use crate::error::{Result, SearchError};
use crate::index::{check_dimensions, rank_candidates, ScoredId, VectorIndex};
use crate::metric::{dot, norm, Metric};

/// Items per leaf before a node is split.
const LEAF_SIZE: usize = 16;
/// Attempts at finding a separating hyperplane before giving up on a split.
const SPLIT_ATTEMPTS: usize = 3;

enum Node {
    Split { normal: Vec<f32>, threshold: f32, left: usize, right: usize },
    Leaf(Vec<u64>),
}

struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

/// ANNOY-style immutable-build forest of random-projection trees.
///
/// Tree splits come from a seeded RNG, so rebuilding the same live vector
/// set always produces the same forest and therefore identical search
/// results.
pub struct ForestIndex {
    dimensions: usize,
    metric: Metric,
    tree_count: usize,
    rebuild_threshold: f32,
    seed: u64,
    /// Live vectors by internal ID. Tombstoned entries are removed here but
    /// their IDs linger in the built trees until the next rebuild.
    vectors: HashMap<u64, Vec<f32>>,
    id_to_internal: HashMap<String, u64>,
    internal_to_id: HashMap<u64, String>,
    tombstones: HashSet<u64>,
    next_internal: u64,
    /// `Some` when built and searchable, `None` while accumulating.
    trees: Option<Vec<Tree>>,
}

impl ForestIndex {
    /// Create an empty forest index for vectors of the given dimensionality.
    pub fn new(dimensions: usize, metric: Metric, config: &ForestConfig) -> Self {
        debug!(
            dimensions,
            ?metric,
            tree_count = config.tree_count,
            "initialized forest index"
        );
        Self {
            dimensions,
            metric,
            tree_count: config.tree_count,
            rebuild_threshold: config.rebuild_threshold,
            seed: config.seed,
            vectors: HashMap::new(),
            id_to_internal: HashMap::new(),
            internal_to_id: HashMap::new(),
            tombstones: HashSet::new(),
            next_internal: 0,
            trees: None,
        }
    }

    fn tombstone_internal(&mut self, internal: u64) {
        self.vectors.remove(&internal);
        self.internal_to_id.remove(&internal);
        self.tombstones.insert(internal);
    }

    /// Collect candidate internal IDs by priority-queue traversal across all
    /// trees, preferring subtrees whose splitting hyperplane is closest to
    /// the query.
    fn collect_candidates(&self, trees: &[Tree], query: &[f32], target: usize) -> HashSet<u64> {
        let mut heap: BinaryHeap<TraversalEntry> = trees
            .iter()
            .enumerate()
            .map(|(tree, t)| TraversalEntry { priority: f32::INFINITY, tree, node: t.root })
            .collect();
        let mut candidates = HashSet::new();

        while let Some(entry) = heap.pop() {
            if candidates.len() >= target {
                break;
            }
            match &trees[entry.tree].nodes[entry.node] {
                Node::Leaf(ids) => {
                    candidates.extend(ids.iter().filter(|id| self.vectors.contains_key(id)));
                }
                Node::Split { normal, threshold, left, right } => {
                    let margin = dot(query, normal) - threshold;
                    heap.push(TraversalEntry {
                        priority: entry.priority.min(-margin),
                        tree: entry.tree,
                        node: *left,
                    });
                    heap.push(TraversalEntry {
                        priority: entry.priority.min(margin),
                        tree: entry.tree,
                        node: *right,
                    });
                }
            }
        }
        candidates
    }
}

impl VectorIndex for ForestIndex {
    fn add_item(&mut self, doc_id: &str, vector: &[f32]) -> Result<()> {
        check_dimensions(self.dimensions, vector)?;
        if self.trees.is_some() {
            // Transparent demotion: discard the built forest and accumulate.
            debug!(doc.id = %doc_id, "forest is built; demoting to accumulate new items");
            self.trees = None;
        }
        if let Some(old) = self.id_to_internal.get(doc_id).copied() {
            self.tombstone_internal(old);
        }
        let internal = self.next_internal;
        self.next_internal += 1;
        self.id_to_internal.insert(doc_id.to_string(), internal);
        self.internal_to_id.insert(internal, doc_id.to_string());
        self.vectors.insert(internal, vector.to_vec());
        Ok(())
    }

    fn delete_item(&mut self, doc_id: &str) -> bool {
        match self.id_to_internal.remove(doc_id) {
            Some(internal) => {
                self.tombstone_internal(internal);
                debug!(doc.id = %doc_id, tombstones = self.tombstones.len(), "tombstoned item");
                true
            }
            None => false,
        }
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredId>> {
        check_dimensions(self.dimensions, query)?;
        let trees = self.trees.as_ref().ok_or(SearchError::IndexNotBuilt)?;
        if top_k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let target = top_k.saturating_mul(self.tree_count).max(top_k);
        let candidates = self.collect_candidates(trees, query, target);

        let scored: Vec<(u64, f32)> = candidates
            .into_iter()
            .filter_map(|id| self.vectors.get(&id).map(|v| (id, self.metric.score(query, v))))
            .collect();

        Ok(rank_candidates(self.metric, scored, top_k)
            .into_iter()
            .filter_map(|(id, score)| {
                self.internal_to_id.get(&id).map(|doc_id| ScoredId { doc_id: doc_id.clone(), score })
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn rebuild(&mut self) -> Result<()> {
        // Compact into a fresh generation: live items get contiguous internal
        // IDs in their previous insertion order, tombstones are dropped.
        let mut live: Vec<u64> = self.vectors.keys().copied().collect();
        live.sort_unstable();

        let mut vectors = HashMap::with_capacity(live.len());
        let mut id_to_internal = HashMap::with_capacity(live.len());
        let mut internal_to_id = HashMap::with_capacity(live.len());
        for (new_id, old_id) in live.iter().enumerate() {
            let new_id = new_id as u64;
            if let (Some(vector), Some(doc_id)) =
                (self.vectors.remove(old_id), self.internal_to_id.remove(old_id))
            {
                id_to_internal.insert(doc_id.clone(), new_id);
                internal_to_id.insert(new_id, doc_id);
                vectors.insert(new_id, vector);
            }
        }
        self.vectors = vectors;
        self.id_to_internal = id_to_internal;
        self.internal_to_id = internal_to_id;
        self.tombstones.clear();
        self.next_internal = self.vectors.len() as u64;

        let items: Vec<u64> = (0..self.next_internal).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees = (0..self.tree_count)
            .map(|_| build_tree(&items, &self.vectors, &mut rng))
            .collect();
        self.trees = Some(trees);
        debug!(items = items.len(), trees = self.tree_count, "built forest index");
        Ok(())
    }

    fn is_searchable(&self) -> bool {
        self.trees.is_some()
    }

    fn needs_rebuild(&self) -> bool {
        if self.tombstones.is_empty() {
            return false;
        }
        self.tombstones.len() as f32 > self.rebuild_threshold * self.vectors.len().max(1) as f32
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Forest
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A subtree queued for traversal, ordered by descending priority.
struct TraversalEntry {
    priority: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for TraversalEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for TraversalEntry {}

impl PartialOrd for TraversalEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TraversalEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.tree.cmp(&other.tree))
            .then_with(|| self.node.cmp(&other.node))
    }
}

fn build_tree(items: &[u64], vectors: &HashMap<u64, Vec<f32>>, rng: &mut StdRng) -> Tree {
    let mut nodes = Vec::new();
    let root = build_node(items.to_vec(), vectors, rng, &mut nodes);
    Tree { nodes, root }
}

fn build_node(
    items: Vec<u64>,
    vectors: &HashMap<u64, Vec<f32>>,
    rng: &mut StdRng,
    nodes: &mut Vec<Node>,
) -> usize {
    if items.len() <= LEAF_SIZE {
        nodes.push(Node::Leaf(items));
        return nodes.len() - 1;
    }

    for _ in 0..SPLIT_ATTEMPTS {
        let i = rng.gen_range(0..items.len());
        let j = rng.gen_range(0..items.len());
        if i == j {
            continue;
        }
        let (Some(a), Some(b)) = (vectors.get(&items[i]), vectors.get(&items[j])) else {
            continue;
        };
        let mut normal: Vec<f32> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
        let len = norm(&normal);
        if len < 1e-9 {
            continue;
        }
        for v in &mut normal {
            *v /= len;
        }
        let threshold = (dot(&normal, a) + dot(&normal, b)) / 2.0;

        let (left_items, right_items): (Vec<u64>, Vec<u64>) = items.iter().copied().partition(|id| {
            vectors.get(id).map(|v| dot(v, &normal) < threshold).unwrap_or(false)
        });
        if left_items.is_empty() || right_items.is_empty() {
            continue;
        }

        let left = build_node(left_items, vectors, rng, nodes);
        let right = build_node(right_items, vectors, rng, nodes);
        nodes.push(Node::Split { normal, threshold, left, right });
        return nodes.len() - 1;
    }

    // No separating hyperplane found (near-identical vectors); keep them in
    // one oversized leaf rather than splitting arbitrarily.
    nodes.push(Node::Leaf(items));
    nodes.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_forest(dimensions: usize) -> ForestIndex {
        let config = ForestConfig { tree_count: 4, rebuild_threshold: 0.1, seed: 7 };
        ForestIndex::new(dimensions, Metric::Cosine, &config)
    }

    #[test]
    fn search_before_build_fails() {
        let mut index = small_forest(4);
        index.add_item("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, SearchError::IndexNotBuilt));
    }

    #[test]
    fn rebuild_makes_all_items_searchable() {
        let mut index = small_forest(4);
        for i in 0..10 {
            let mut v = [0.0f32; 4];
            v[i % 4] = 1.0;
            v[(i + 1) % 4] = 0.5;
            index.add_item(&format!("doc-{i}"), &v).unwrap();
        }
        index.rebuild().unwrap();
        assert_eq!(index.len(), 10);
        assert!(index.is_searchable());
        let results = index.search(&[1.0, 0.5, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn cosine_ordering_scenario() {
        let mut index = small_forest(4);
        index.add_item("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_item("b", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.add_item("c", &[0.9, 0.1, 0.0, 0.0]).unwrap();
        index.rebuild().unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn dimension_mismatch_leaves_index_unchanged() {
        let mut index = small_forest(4);
        let err = index.add_item("a", &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 4, actual: 3 }));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn deleted_items_never_returned_even_before_rebuild() {
        let mut index = small_forest(4);
        index.add_item("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_item("b", &[0.9, 0.1, 0.0, 0.0]).unwrap();
        index.rebuild().unwrap();
        assert!(index.delete_item("a"));

        // "a" is still physically present in the built trees, only tombstoned.
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn delete_unknown_id_is_false() {
        let mut index = small_forest(4);
        assert!(!index.delete_item("missing"));
    }

    #[test]
    fn add_after_build_demotes_transparently() {
        let mut index = small_forest(4);
        index.add_item("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.rebuild().unwrap();
        assert!(index.is_searchable());

        index.add_item("b", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert!(!index.is_searchable());
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0, 0.0], 1),
            Err(SearchError::IndexNotBuilt)
        ));

        index.rebuild().unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn readd_tombstones_old_internal_id() {
        let mut index = small_forest(4);
        index.add_item("a", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_item("a", &[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(index.len(), 1);
        index.rebuild().unwrap();

        let results = index.search(&[0.0, 1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].doc_id, "a");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn repeated_rebuild_is_idempotent() {
        let mut index = small_forest(8);
        for i in 0..40u32 {
            let v: Vec<f32> = (0..8).map(|d| ((i + d) % 7) as f32 / 7.0 + 0.1).collect();
            index.add_item(&format!("doc-{i}"), &v).unwrap();
        }
        index.rebuild().unwrap();
        let query: Vec<f32> = (0..8).map(|d| (d % 3) as f32 + 0.2).collect();
        let first = index.search(&query, 5).unwrap();
        index.rebuild().unwrap();
        let second = index.search(&query, 5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tombstone_fraction_triggers_rebuild() {
        let mut index = small_forest(4);
        for i in 0..10 {
            index.add_item(&format!("doc-{i}"), &[i as f32, 1.0, 0.0, 0.0]).unwrap();
        }
        index.rebuild().unwrap();
        assert!(!index.needs_rebuild());
        index.delete_item("doc-0");
        index.delete_item("doc-1");
        // 2 tombstones against 8 live items exceeds the 0.1 threshold
        assert!(index.needs_rebuild());
        index.rebuild().unwrap();
        assert!(!index.needs_rebuild());
        assert_eq!(index.len(), 8);
    }

    #[test]
    fn rebuild_of_empty_index_yields_empty_results() {
        let mut index = small_forest(4);
        index.rebuild().unwrap();
        assert!(index.is_empty());
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn searches_well_beyond_leaf_size() {
        // Enough items that trees actually split; nearest neighbor must
        // still surface.
        let config = ForestConfig { tree_count: 8, rebuild_threshold: 0.1, seed: 3 };
        let mut index = ForestIndex::new(4, Metric::Euclidean, &config);
        for i in 0..100u32 {
            let angle = i as f32 * 0.07;
            index
                .add_item(&format!("doc-{i}"), &[angle.cos(), angle.sin(), angle * 0.01, 1.0])
                .unwrap();
        }
        index.rebuild().unwrap();
        let target = [0.35f32.cos(), 0.35f32.sin(), 0.05, 1.0];
        let results = index.search(&target, 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().any(|r| r.doc_id == "doc-5"));
    }
}
