//! Injected observability hook for engine operations.

use std::time::Duration;

/// Observer invoked by the [`SearchEngine`](crate::engine::SearchEngine) at
/// defined points: add, delete, search, and rebuild.
///
/// All methods default to no-ops, so implementors override only what they
/// care about. The engine behaves identically whether or not an observer is
/// attached; ambient `tracing` output is emitted either way.
pub trait SearchObserver: Send + Sync {
    /// A document was indexed.
    fn on_add(&self, doc_id: &str, index_size: usize) {
        let _ = (doc_id, index_size);
    }

    /// A delete was attempted; `deleted` is `false` for unknown IDs.
    fn on_delete(&self, doc_id: &str, deleted: bool, index_size: usize) {
        let _ = (doc_id, deleted, index_size);
    }

    /// A search completed.
    fn on_search(&self, query: &str, result_count: usize, elapsed: Duration) {
        let _ = (query, result_count, elapsed);
    }

    /// The index was rebuilt, either explicitly or by maintenance policy.
    fn on_rebuild(&self, index_size: usize, elapsed: Duration) {
        let _ = (index_size, elapsed);
    }
}
