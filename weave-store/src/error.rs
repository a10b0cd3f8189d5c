//! Error types for the storage layer.

use thiserror::Error;
use weave_types::CollectionId;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionId),

    /// Filesystem error (snapshot files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by a storage backend.
    #[error("backend error: {0}")]
    Backend(String),

    /// Error reported by the embedding service.
    #[error("embedding error: {0}")]
    Embedding(String),
}
