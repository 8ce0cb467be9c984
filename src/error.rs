//! Error types for the `densearch` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in vector search operations.
///
/// Unknown document IDs are deliberately not represented here: lookups and
/// deletes for absent IDs return `Option`/`bool`/empty results instead of
/// failing.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A vector's length does not match the index dimensionality.
    ///
    /// Structural and non-retryable; the vector is rejected without mutating
    /// any state.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the index was constructed with.
        expected: usize,
        /// The length of the rejected vector.
        actual: usize,
    },

    /// Search was attempted on a forest index that has not been built yet.
    ///
    /// The caller (or the coordinating engine) must rebuild the index before
    /// searching.
    #[error("index has not been built; rebuild before searching")]
    IndexNotBuilt,

    /// The embedding provider failed to encode text.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding call exceeded the configured deadline.
    ///
    /// Transient and retryable; no store or index state was touched.
    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),

    /// The document store is at its configured capacity.
    ///
    /// New adds are rejected; existing documents are unaffected.
    #[error("document capacity exceeded (max {max})")]
    CapacityExceeded {
        /// The configured maximum document count.
        max: usize,
    },

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A convenience result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
