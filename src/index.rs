//! The vector index trait shared by both ANN variants.

use crate::config::IndexKind;
use crate::error::{Result, SearchError};
use crate::metric::Metric;

/// A document ID paired with its score for one search result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    /// The document ID associated with the matched vector.
    pub doc_id: String,
    /// Score under the index's metric: similarity for cosine/dot
    /// (descending), distance for euclidean (ascending).
    pub score: f32,
}

/// An approximate-nearest-neighbor index over doc-ID-keyed vectors.
///
/// Both variants share this contract; variant-specific state (build status,
/// tombstones) stays inside each implementation. Internal integer IDs are
/// assigned at insertion and never reused within a build generation.
pub trait VectorIndex: Send + Sync {
    /// Add a vector under a document ID.
    ///
    /// Re-adding an existing ID tombstones the old entry and assigns a fresh
    /// internal ID.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::DimensionMismatch`] without mutating anything
    /// if the vector length is wrong.
    fn add_item(&mut self, doc_id: &str, vector: &[f32]) -> Result<()>;

    /// Remove a document from the live result set.
    ///
    /// Returns `false` if the ID is unknown. The underlying structure may
    /// retain the entry until the next rebuild, but it is never returned
    /// from [`search`](VectorIndex::search).
    fn delete_item(&mut self, doc_id: &str) -> bool;

    /// Find the up-to-`top_k` nearest live items to `query`.
    ///
    /// Results are ordered best-first for the configured metric; ties are
    /// broken by smaller internal ID so results are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::DimensionMismatch`] for a wrong-length query,
    /// or [`SearchError::IndexNotBuilt`] on a forest index that has pending
    /// unbuilt items.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredId>>;

    /// Number of live (non-tombstoned) items.
    fn len(&self) -> usize;

    /// Whether the index holds no live items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the index from its current live vector set.
    ///
    /// Compacts away tombstones; afterwards the physical item count equals
    /// [`len`](VectorIndex::len). Mandatory for the forest variant before
    /// its first search, optional maintenance for the graph variant.
    fn rebuild(&mut self) -> Result<()>;

    /// Whether [`search`](VectorIndex::search) can currently succeed.
    ///
    /// Always `true` for the graph variant; `false` for a forest with items
    /// accumulated since the last build.
    fn is_searchable(&self) -> bool;

    /// Whether the tombstone fraction has crossed the rebuild threshold.
    fn needs_rebuild(&self) -> bool;

    /// Which index variant this is.
    fn kind(&self) -> IndexKind;

    /// The fixed vector dimensionality.
    fn dimensions(&self) -> usize;
}

/// Reject vectors whose length differs from the index dimensionality.
pub(crate) fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(SearchError::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}

/// Order candidates best-first with internal-ID tie-breaking and truncate.
pub(crate) fn rank_candidates(
    metric: Metric,
    mut candidates: Vec<(u64, f32)>,
    top_k: usize,
) -> Vec<(u64, f32)> {
    candidates.sort_by(|a, b| metric.cmp_scores(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
    candidates.truncate(top_k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_dimensions_rejects_wrong_length() {
        let err = check_dimensions(4, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 4, actual: 3 }));
        assert!(check_dimensions(4, &[0.0; 4]).is_ok());
    }

    #[test]
    fn rank_breaks_ties_by_smaller_internal_id() {
        let candidates = vec![(7, 0.5), (2, 0.5), (9, 0.9)];
        let ranked = rank_candidates(Metric::Cosine, candidates, 3);
        assert_eq!(ranked, vec![(9, 0.9), (2, 0.5), (7, 0.5)]);
    }

    #[test]
    fn rank_orders_euclidean_ascending() {
        let candidates = vec![(1, 3.0), (2, 0.5), (3, 1.5)];
        let ranked = rank_candidates(Metric::Euclidean, candidates, 2);
        assert_eq!(ranked, vec![(2, 0.5), (3, 1.5)]);
    }
}
