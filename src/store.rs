//! In-memory document store.
//!
//! [`DocumentStore`] is the single point of truth for document identity and
//! metadata. It never performs similarity computation and knows nothing about
//! indexes; the [`SearchEngine`](crate::engine::SearchEngine) keeps it and
//! the vector index consistent.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::document::Document;

/// In-memory document storage with insertion-ordered listing.
///
/// All operations are synchronous in-memory mutations; concurrency control
/// belongs to the caller.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<String, Document>,
    order: Vec<String>,
}

impl DocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, generating a UUID if no ID is given. Returns the ID.
    ///
    /// Re-adding an existing ID overwrites text and metadata (last write
    /// wins) but keeps the original `created_at` and any existing embedding.
    /// The retained embedding is stale until the caller re-indexes the text.
    pub fn add_document(
        &mut self,
        text: &str,
        id: Option<String>,
        metadata: Option<HashMap<String, Value>>,
    ) -> String {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let metadata = metadata.unwrap_or_default();
        match self.documents.get_mut(&id) {
            Some(existing) => {
                warn!(doc.id = %id, "document already exists, overwriting text and metadata");
                existing.text = text.to_string();
                existing.metadata = metadata;
            }
            None => {
                self.documents
                    .insert(id.clone(), Document::new(id.clone(), text.to_string(), metadata));
                self.order.push(id.clone());
                debug!(doc.id = %id, "stored document");
            }
        }
        id
    }

    /// Retrieve a document by ID.
    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Whether a document with this ID exists.
    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Delete a document. Returns `false` if the ID is unknown.
    pub fn delete_document(&mut self, id: &str) -> bool {
        if self.documents.remove(id).is_some() {
            self.order.retain(|d| d != id);
            debug!(doc.id = %id, remaining = self.documents.len(), "deleted document");
            true
        } else {
            false
        }
    }

    /// List documents in insertion order, up to `limit` if given.
    pub fn list_documents(&self, limit: Option<usize>) -> Vec<&Document> {
        self.order
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .filter_map(|id| self.documents.get(id))
            .collect()
    }

    /// Retrieve documents by ID, preserving the input order.
    ///
    /// Unknown IDs are skipped, so the result may be shorter than `ids`.
    pub fn get_documents_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Document> {
        ids.iter().filter_map(|id| self.documents.get(id.as_ref())).collect()
    }

    /// Attach or replace the embedding for a document.
    ///
    /// Returns `false` if the ID is unknown.
    pub fn update_embedding(&mut self, id: &str, embedding: Vec<f32>) -> bool {
        match self.documents.get_mut(id) {
            Some(doc) => {
                doc.embedding = Some(embedding);
                true
            }
            None => false,
        }
    }

    /// Number of documents in the store.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Remove all documents.
    pub fn clear(&mut self) {
        let count = self.documents.len();
        self.documents.clear();
        self.order.clear();
        debug!(cleared = count, "cleared document store");
    }
}
