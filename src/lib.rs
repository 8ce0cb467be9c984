//! Vector similarity search over dense text embeddings.
//!
//! This crate stores per-document embeddings, maintains an
//! approximate-nearest-neighbor index over them, and answers top-k
//! similarity queries while keeping document metadata and the index
//! consistent across adds, updates, and deletes.
//!
//! Two index variants are provided behind the [`VectorIndex`] trait:
//!
//! - [`ForestIndex`] — build-once random-projection tree forest
//!   (ANNOY-style). Items accumulate until a rebuild compiles a static
//!   searchable structure; deletes are tombstoned until the next rebuild.
//! - [`GraphIndex`] — incremental proximity graph (HNSW-style). Items are
//!   searchable immediately; deletes are logical and periodic rebuilds
//!   restore search quality.
//!
//! The [`SearchEngine`] coordinator owns a [`DocumentStore`] and one index,
//! translating document-level operations into embedding calls plus index and
//! store updates that never diverge.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use densearch::{EngineConfig, IndexKind, SearchEngine};
//!
//! let engine = SearchEngine::builder()
//!     .config(EngineConfig::builder().index(IndexKind::Graph).build()?)
//!     .embedding_provider(Arc::new(my_provider))
//!     .build()?;
//!
//! let outcome = engine.index_text("the quick brown fox", None, None).await?;
//! let response = engine.search_text("quick fox", 5).await?;
//! engine.delete(&outcome.id).await?;
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod forest;
pub mod graph;
pub mod index;
pub mod metric;
pub mod observer;
pub mod store;

pub use config::{EngineConfig, EngineConfigBuilder, ForestConfig, GraphConfig, IndexKind};
pub use document::Document;
pub use embedding::EmbeddingProvider;
pub use engine::{
    DeleteOutcome, EngineStats, IndexOutcome, SearchEngine, SearchEngineBuilder, SearchHit,
    SearchResponse,
};
pub use error::{Result, SearchError};
pub use forest::ForestIndex;
pub use graph::GraphIndex;
pub use index::{ScoredId, VectorIndex};
pub use metric::Metric;
pub use observer::SearchObserver;
pub use store::DocumentStore;
