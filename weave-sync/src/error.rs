//! Error types for the sync layer.

use thiserror::Error;
use weave_store::StoreError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error (peer unreachable, request timed out).
    #[error("network error: {0}")]
    Network(String),

    /// The peer answered with a non-success status.
    #[error("peer returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Malformed response from the peer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Run ledger error.
    #[error("ledger error: {0}")]
    Ledger(String),
}
