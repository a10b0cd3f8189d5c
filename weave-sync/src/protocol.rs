//! Sync wire types.
//!
//! The protocol is three HTTP calls against the peer's API:
//! 1. `GET  /collections/{id}/sync/metadata` — per-document hashes and times
//! 2. `POST /collections/{id}/sync/push` — send full documents in batches
//! 3. `POST /collections/{id}/sync/pull` — fetch full documents by id
//!
//! Metadata drives the diff; content moves separately in batches.
//! Embeddings never appear on the wire — pulled content is re-embedded
//! locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use weave_types::DocumentId;

/// Maximum number of documents in a single push or pull batch.
pub const MAX_BATCH_SIZE: usize = 100;

/// Which way documents flow in a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Push,
    Pull,
    Bidirectional,
}

impl SyncDirection {
    /// Whether this direction sends local documents to the peer.
    #[must_use]
    pub fn allows_push(self) -> bool {
        matches!(self, Self::Push | Self::Bidirectional)
    }

    /// Whether this direction fetches remote documents.
    #[must_use]
    pub fn allows_pull(self) -> bool {
        matches!(self, Self::Pull | Self::Bidirectional)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(format!("unknown sync direction: {other}")),
        }
    }
}

/// Lifecycle of a sync run. Transitions are monotonic:
/// pending → in_progress → {completed | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    /// Whether the run can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// Per-document sync metadata: enough to diff, nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Hex SHA-256 of the document content.
    pub content_hash: String,
    pub modified_at: DateTime<Utc>,
    /// Opaque attributes carried alongside the hash.
    #[serde(rename = "metadata", default)]
    pub attributes: Value,
}

impl DocumentMetadata {
    /// Whether this entry is a deletion tombstone (`"deleted": true` in its
    /// attributes).
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.attributes
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Body of the metadata endpoint response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub documents: HashMap<DocumentId, DocumentMetadata>,
}

/// Body of a push request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub documents: Vec<PushDocument>,
}

/// One document as sent to the peer. No embedding: the receiver re-embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushDocument {
    pub id: DocumentId,
    pub content: String,
    #[serde(rename = "metadata", default)]
    pub attributes: Value,
    pub modified_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Body of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub document_ids: Vec<DocumentId>,
}

/// Body of the pull endpoint response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullResponse {
    pub documents: Vec<PulledDocument>,
}

/// One document as returned by the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulledDocument {
    pub id: DocumentId,
    pub content: String,
    #[serde(rename = "metadata", default)]
    pub attributes: Value,
}
