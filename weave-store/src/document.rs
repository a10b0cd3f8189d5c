//! Document and collection models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_types::{CollectionId, DocumentId};

/// A document in a collection: content, optional embedding vector, opaque
/// metadata. The embedding is local-only and never crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    /// Embedding vector produced by the local embedding service.
    pub embedding: Option<Vec<f32>>,
    /// Opaque attributes carried alongside the content.
    #[serde(default)]
    pub metadata: Value,
    pub added_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// Creates a document with fresh timestamps and no embedding.
    #[must_use]
    pub fn new(id: DocumentId, content: impl Into<String>, metadata: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            content: content.into(),
            embedding: None,
            metadata,
            added_at: now,
            modified_at: now,
        }
    }

    /// Attaches an embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Collection-level identity and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Opaque collection attributes.
    #[serde(default)]
    pub attributes: Value,
    /// Whether the collection is visible to peers.
    #[serde(default)]
    pub published: bool,
}

impl CollectionInfo {
    /// Creates a new unpublished collection.
    #[must_use]
    pub fn new(id: CollectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            attributes: Value::Null,
            published: false,
        }
    }
}
