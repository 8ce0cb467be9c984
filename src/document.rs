//! The document data type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: text, metadata, and (once indexed) its embedding.
///
/// `embedding` is `Some` if and only if the document has been successfully
/// indexed at least once. When a document is overwritten with new text the
/// old embedding is retained but stale until the caller re-indexes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Opaque key-value metadata associated with the document.
    pub metadata: HashMap<String, Value>,
    /// Creation time; preserved across overwrites of the same ID.
    pub created_at: DateTime<Utc>,
    /// The dense embedding for this document's text, set on first index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a new document with the current timestamp and no embedding.
    pub fn new(id: String, text: String, metadata: HashMap<String, Value>) -> Self {
        Self { id, text, metadata, created_at: Utc::now(), embedding: None }
    }
}
