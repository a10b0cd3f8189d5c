//! Metadata diffing.
//!
//! The diff partitions divergent documents into push candidates, pull
//! candidates and conflicts. Hash inequality is the sole change trigger —
//! identical hashes are a no-op whatever the timestamp skew says. When
//! hashes differ, one side must be strictly newer by more than the conflict
//! window (`>`, not `≥`) to win; otherwise the edits are concurrent and the
//! document conflicts.

use crate::conflict::{ConflictRecord, ConflictType};
use crate::protocol::{DocumentMetadata, SyncDirection};
use chrono::Duration;
use std::collections::HashMap;
use weave_types::DocumentId;

/// Outcome of diffing local metadata against a peer's.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Documents to send to the peer.
    pub to_push: Vec<DocumentId>,
    /// Documents to fetch from the peer.
    pub to_pull: Vec<DocumentId>,
    /// Documents with concurrent divergent edits, unresolved.
    pub conflicts: Vec<ConflictRecord>,
}

/// Diffs two metadata sets, subject to `direction`.
///
/// A remote entry whose attributes carry `"deleted": true` is a tombstone:
/// a strictly-newer tombstone applies the deletion through the pull phase,
/// a strictly-newer local edit pushes the document back, and concurrent
/// edit-vs-delete is a `Deleted` conflict.
#[must_use]
pub fn compute_plan(
    local: &HashMap<DocumentId, DocumentMetadata>,
    remote: &HashMap<DocumentId, DocumentMetadata>,
    direction: SyncDirection,
    conflict_window: Duration,
) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for (id, local_meta) in local {
        let Some(remote_meta) = remote.get(id) else {
            if direction.allows_push() {
                plan.to_push.push(id.clone());
            }
            continue;
        };

        if remote_meta.is_tombstone() {
            classify(
                &mut plan,
                id,
                local_meta,
                remote_meta,
                direction,
                conflict_window,
                ConflictType::Deleted,
            );
            continue;
        }

        if local_meta.content_hash == remote_meta.content_hash {
            continue;
        }
        classify(
            &mut plan,
            id,
            local_meta,
            remote_meta,
            direction,
            conflict_window,
            ConflictType::Modified,
        );
    }

    for (id, remote_meta) in remote {
        if !local.contains_key(id) && !remote_meta.is_tombstone() && direction.allows_pull() {
            plan.to_pull.push(id.clone());
        }
    }

    // Stable ordering so batches and tests are deterministic.
    plan.to_push.sort();
    plan.to_pull.sort();
    plan.conflicts.sort_by(|a, b| a.document_id.cmp(&b.document_id));
    plan
}

fn classify(
    plan: &mut SyncPlan,
    id: &DocumentId,
    local_meta: &DocumentMetadata,
    remote_meta: &DocumentMetadata,
    direction: SyncDirection,
    conflict_window: Duration,
    conflict_type: ConflictType,
) {
    let delta = local_meta
        .modified_at
        .signed_duration_since(remote_meta.modified_at);

    if delta > conflict_window {
        if direction.allows_push() {
            plan.to_push.push(id.clone());
        }
    } else if -delta > conflict_window {
        if direction.allows_pull() {
            plan.to_pull.push(id.clone());
        }
    } else {
        plan.conflicts.push(ConflictRecord {
            document_id: id.clone(),
            local: local_meta.clone(),
            remote: remote_meta.clone(),
            conflict_type,
            resolution: None,
        });
    }
}
