//! The search engine coordinator.
//!
//! [`SearchEngine`] owns one [`DocumentStore`] and one [`VectorIndex`] and
//! keeps them consistent across add/delete/search/rebuild. A single
//! `tokio::sync::RwLock` guards the pair: searches share the read side,
//! mutations and rebuilds take the write side, so a caller can never observe
//! a document present in one but absent from the other.
//!
//! Embedding happens before any lock is taken and is bounded by the
//! configured timeout, so an embedding failure (or a cancelled caller)
//! leaves no partial state behind. Once the write lock is held, the store
//! and index mutations run in one synchronous critical section with no
//! await points in between, which makes every mutation atomic under task
//! cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, IndexKind};
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::forest::ForestIndex;
use crate::graph::GraphIndex;
use crate::index::VectorIndex;
use crate::observer::SearchObserver;
use crate::store::DocumentStore;

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    /// The document ID (generated if the caller did not supply one).
    pub id: String,
    /// Live index size after the insert.
    pub index_size: usize,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matched document ID.
    pub id: String,
    /// Score under the configured metric.
    pub score: f32,
    /// Zero-based rank within this response.
    pub rank: usize,
    /// The document text, if the document is still in the store.
    pub text: Option<String>,
    /// The document metadata, if the document is still in the store.
    pub metadata: Option<HashMap<String, Value>>,
}

/// A completed search.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// Ranked hits, best first.
    pub results: Vec<SearchHit>,
    /// Number of hits returned.
    pub total_results: usize,
    /// Wall-clock time spent on the search, embedding included.
    pub elapsed: Duration,
}

/// Result of deleting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether the document existed.
    pub deleted: bool,
    /// Live index size after the delete (and any triggered rebuild).
    pub index_size: usize,
}

/// A snapshot of engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// The configured index variant.
    pub index_kind: IndexKind,
    /// Live item count in the index.
    pub index_size: usize,
    /// Document count in the store.
    pub document_count: usize,
    /// The embedding dimensionality.
    pub dimensions: usize,
}

struct EngineState {
    store: DocumentStore,
    index: Box<dyn VectorIndex>,
}

/// Coordinates the document store, the vector index, and the embedding
/// provider. Construct one via [`SearchEngine::builder()`].
pub struct SearchEngine {
    config: EngineConfig,
    provider: Arc<dyn EmbeddingProvider>,
    observer: Option<Arc<dyn SearchObserver>>,
    state: RwLock<EngineState>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Create a new [`SearchEngineBuilder`].
    pub fn builder() -> SearchEngineBuilder {
        SearchEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Embed text with the configured deadline. No engine state is touched,
    /// so a failure or timeout here aborts the operation cleanly.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let deadline = self.config.embed_timeout();
        match tokio::time::timeout(deadline, self.provider.embed(text)).await {
            Ok(Ok(vector)) => {
                let expected = self.provider.dimensions();
                if vector.len() != expected {
                    return Err(SearchError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Ok(vector)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(provider = self.provider.name(), ?deadline, "embedding call timed out");
                Err(SearchError::Timeout(deadline))
            }
        }
    }

    /// Embed `text` and index it: store the document, insert the vector,
    /// and attach the embedding, all under one exclusive lock.
    ///
    /// Re-indexing an existing ID overwrites its text/metadata and replaces
    /// its vector; `created_at` is preserved by the store.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::CapacityExceeded`] when the store is full,
    /// or an embedding error/timeout before any state is mutated.
    pub async fn index_text(
        &self,
        text: &str,
        id: Option<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<IndexOutcome> {
        let vector = self.embed(text).await?;

        let mut state = self.state.write().await;
        let existed = id.as_deref().map(|i| state.store.contains(i)).unwrap_or(false);
        if !existed && state.store.len() >= self.config.max_documents {
            return Err(SearchError::CapacityExceeded { max: self.config.max_documents });
        }

        let id = state.store.add_document(text, id, metadata);
        if let Err(e) = state.index.add_item(&id, &vector) {
            // Roll back the store write so the two sides stay aligned.
            if !existed {
                state.store.delete_document(&id);
            }
            error!(doc.id = %id, error = %e, "index insert failed");
            return Err(e);
        }
        state.store.update_embedding(&id, vector);
        let index_size = state.index.len();
        drop(state);

        info!(doc.id = %id, index_size, "indexed document");
        if let Some(observer) = &self.observer {
            observer.on_add(&id, index_size);
        }
        Ok(IndexOutcome { id, index_size })
    }

    /// Embed `query` and return up to `top_k` ranked documents.
    ///
    /// `top_k` is clamped to the configured maximum; zero returns an empty
    /// response. A forest index with unbuilt items is built on demand under
    /// an exclusive lock before the search runs.
    pub async fn search_text(&self, query: &str, top_k: usize) -> Result<SearchResponse> {
        let started = Instant::now();
        if top_k == 0 {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_results: 0,
                elapsed: started.elapsed(),
            });
        }
        let top_k = top_k.min(self.config.max_top_k);
        let vector = self.embed(query).await?;

        // Fast path: searchable index, shared lock.
        let hits = {
            let state = self.state.read().await;
            if state.index.is_searchable() {
                Some(Self::run_search(&state, &vector, top_k)?)
            } else {
                None
            }
        };
        let (hits, rebuilt) = match hits {
            Some(hits) => (hits, None),
            None => {
                let mut state = self.state.write().await;
                let rebuilt = if state.index.is_searchable() {
                    None
                } else {
                    let build_start = Instant::now();
                    state.index.rebuild()?;
                    info!(index_size = state.index.len(), "built index before search");
                    Some((state.index.len(), build_start.elapsed()))
                };
                (Self::run_search(&state, &vector, top_k)?, rebuilt)
            }
        };

        let elapsed = started.elapsed();
        debug!(result_count = hits.len(), ?elapsed, "search completed");
        if let Some(observer) = &self.observer {
            // Notify outside the lock; a slow observer must not extend the
            // exclusive section.
            if let Some((index_size, build_elapsed)) = rebuilt {
                observer.on_rebuild(index_size, build_elapsed);
            }
            observer.on_search(query, hits.len(), elapsed);
        }
        Ok(SearchResponse { total_results: hits.len(), results: hits, elapsed })
    }

    fn run_search(state: &EngineState, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let scored = state.index.search(vector, top_k)?;
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, s)| {
                let doc = state.store.get_document(&s.doc_id);
                let text = doc.map(|d| d.text.clone());
                let metadata = doc.map(|d| d.metadata.clone());
                SearchHit { id: s.doc_id, score: s.score, rank, text, metadata }
            })
            .collect())
    }

    /// Delete a document from both the index and the store.
    ///
    /// Both removals happen in one exclusive critical section, so they can
    /// never diverge. If the delete pushes the tombstone fraction over the
    /// configured threshold, the index is rebuilt under the same lock.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.write().await;
        let in_index = state.index.delete_item(id);
        let in_store = state.store.delete_document(id);
        let deleted = in_index || in_store;

        let mut rebuilt = None;
        if deleted && state.index.needs_rebuild() {
            let build_start = Instant::now();
            state.index.rebuild()?;
            info!(index_size = state.index.len(), "rebuilt index after delete");
            rebuilt = Some((state.index.len(), build_start.elapsed()));
        }
        let index_size = state.index.len();
        drop(state);

        if deleted {
            info!(doc.id = %id, index_size, "deleted document");
        } else {
            warn!(doc.id = %id, "delete requested for unknown document");
        }
        if let Some(observer) = &self.observer {
            if let Some((size, build_elapsed)) = rebuilt {
                observer.on_rebuild(size, build_elapsed);
            }
            observer.on_delete(id, deleted, index_size);
        }
        Ok(DeleteOutcome { deleted, index_size })
    }

    /// Rebuild the index from its live vector set, holding exclusive access
    /// for the duration.
    pub async fn rebuild(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let build_start = Instant::now();
        state.index.rebuild()?;
        let index_size = state.index.len();
        drop(state);

        info!(index_size, "rebuilt index");
        if let Some(observer) = &self.observer {
            observer.on_rebuild(index_size, build_start.elapsed());
        }
        Ok(())
    }

    /// Snapshot the current engine state.
    pub async fn stats(&self) -> EngineStats {
        let state = self.state.read().await;
        EngineStats {
            index_kind: state.index.kind(),
            index_size: state.index.len(),
            document_count: state.store.len(),
            dimensions: state.index.dimensions(),
        }
    }

    /// Retrieve a document by ID.
    pub async fn get_document(&self, id: &str) -> Option<Document> {
        let state = self.state.read().await;
        state.store.get_document(id).cloned()
    }

    /// List documents in insertion order, up to `limit` if given.
    pub async fn list_documents(&self, limit: Option<usize>) -> Vec<Document> {
        let state = self.state.read().await;
        state.store.list_documents(limit).into_iter().cloned().collect()
    }
}

/// Builder for constructing a [`SearchEngine`].
///
/// The embedding provider is required; configuration defaults to
/// [`EngineConfig::default()`] and the observer is optional.
#[derive(Default)]
pub struct SearchEngineBuilder {
    config: Option<EngineConfig>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    observer: Option<Arc<dyn SearchObserver>>,
}

impl SearchEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set an optional observer for add/delete/search/rebuild events.
    pub fn observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the [`SearchEngine`], constructing the configured index variant
    /// with the provider's dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the provider is missing or reports
    /// zero dimensions.
    pub fn build(self) -> Result<SearchEngine> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .provider
            .ok_or_else(|| SearchError::Config("embedding_provider is required".to_string()))?;
        let dimensions = provider.dimensions();
        if dimensions == 0 {
            return Err(SearchError::Config(
                "embedding provider reports zero dimensions".to_string(),
            ));
        }

        let index: Box<dyn VectorIndex> = match config.index {
            IndexKind::Forest => {
                Box::new(ForestIndex::new(dimensions, config.metric, &config.forest))
            }
            IndexKind::Graph => Box::new(GraphIndex::new(dimensions, config.metric, &config.graph)),
        };
        info!(index = ?config.index, dimensions, "initialized search engine");

        Ok(SearchEngine {
            config,
            provider,
            observer: self.observer,
            state: RwLock::new(EngineState { store: DocumentStore::new(), index }),
        })
    }
}
