//! Conflict records and resolution policy.
//!
//! Resolution is policy-driven, not merge-based: each conflicted document
//! ends up in exactly one of the transfer lists, never both, and every
//! conflict carries its resolution before push or pull proceeds.

use crate::diff::SyncPlan;
use crate::protocol::DocumentMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use weave_types::DocumentId;

/// What kind of divergence conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Both sides modified the document concurrently.
    Modified,
    /// One side modified while the other deleted.
    Deleted,
}

/// How one conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
    /// A manually merged result to be pushed. No policy produces this;
    /// it exists for callers that resolve conflicts out of band.
    Merge,
}

/// Process-level conflict resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    KeepLocal,
    KeepRemote,
    /// The side with the later `modified_at` wins; local wins exact ties.
    #[default]
    KeepLatest,
    /// Placeholder for a human-in-the-loop resolver. Until one is wired in
    /// this keeps the local copy and says so at warn level.
    Ask,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepLocal => write!(f, "keep_local"),
            Self::KeepRemote => write!(f, "keep_remote"),
            Self::KeepLatest => write!(f, "keep_latest"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_local" => Ok(Self::KeepLocal),
            "keep_remote" => Ok(Self::KeepRemote),
            "keep_latest" => Ok(Self::KeepLatest),
            "ask" => Ok(Self::Ask),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

/// One document with concurrent divergent edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub document_id: DocumentId,
    pub local: DocumentMetadata,
    pub remote: DocumentMetadata,
    pub conflict_type: ConflictType,
    /// Filled in by `resolve_conflicts`; never left empty before transfer.
    pub resolution: Option<ConflictResolution>,
}

/// Resolves every conflict in the plan per `policy`, moving each document
/// into exactly one of the transfer lists.
pub fn resolve_conflicts(plan: &mut SyncPlan, policy: ConflictPolicy) {
    let mut conflicts = std::mem::take(&mut plan.conflicts);
    for conflict in &mut conflicts {
        let resolution = match policy {
            ConflictPolicy::KeepLocal => ConflictResolution::KeepLocal,
            ConflictPolicy::KeepRemote => ConflictResolution::KeepRemote,
            ConflictPolicy::KeepLatest => {
                if conflict.local.modified_at >= conflict.remote.modified_at {
                    ConflictResolution::KeepLocal
                } else {
                    ConflictResolution::KeepRemote
                }
            }
            ConflictPolicy::Ask => {
                warn!(
                    document = %conflict.document_id,
                    "no interactive resolver available, keeping local copy"
                );
                ConflictResolution::KeepLocal
            }
        };
        conflict.resolution = Some(resolution);

        match resolution {
            ConflictResolution::KeepLocal | ConflictResolution::Merge => {
                plan.to_pull.retain(|id| id != &conflict.document_id);
                if !plan.to_push.contains(&conflict.document_id) {
                    plan.to_push.push(conflict.document_id.clone());
                }
            }
            ConflictResolution::KeepRemote => {
                plan.to_push.retain(|id| id != &conflict.document_id);
                if !plan.to_pull.contains(&conflict.document_id) {
                    plan.to_pull.push(conflict.document_id.clone());
                }
            }
        }
    }
    plan.to_push.sort();
    plan.to_pull.sort();
    plan.conflicts = conflicts;
}
