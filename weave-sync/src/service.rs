//! The sync service.
//!
//! `initiate_sync` is detach-and-poll: it records a pending run, spawns the
//! protocol as a background task and returns the sync id immediately. The
//! outcome is observable only through the run history. Concurrent runs for
//! the same (collection, peer) pair are not fenced against each other —
//! they race exactly like independent callers would, and re-running is
//! always safe because every run re-diffs from current state.

use crate::client::PeerClient;
use crate::conflict::{resolve_conflicts, ConflictPolicy};
use crate::diff::compute_plan;
use crate::error::SyncResult;
use crate::ledger::RunLedger;
use crate::metadata::{content_hash, local_metadata};
use crate::protocol::{
    DocumentMetadata, PushDocument, SyncDirection, SyncStatus, MAX_BATCH_SIZE,
};
use crate::run::SyncRun;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use weave_store::{BackupManager, CollectionStore, Document, Embedder};
use weave_types::{CollectionId, DeviceId, DocumentId, SyncId};

/// Configuration for the sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Documents per push/pull batch.
    pub batch_size: usize,
    /// Symmetric window within which divergent edits count as concurrent.
    pub conflict_window_secs: i64,
    /// Request-level timeout for peer HTTP calls.
    pub http_timeout_secs: u64,
    /// How conflicts are resolved.
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            conflict_window_secs: 60,
            http_timeout_secs: 30,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl SyncConfig {
    fn conflict_window(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.conflict_window_secs)
    }

    fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Orchestrates sync runs between local collections and remote peers.
pub struct SyncService {
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn Embedder>,
    backups: Arc<BackupManager>,
    ledger: Arc<RunLedger>,
    config: SyncConfig,
}

impl SyncService {
    /// Creates a sync service over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        embedder: Arc<dyn Embedder>,
        backups: Arc<BackupManager>,
        ledger: Arc<RunLedger>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            backups,
            ledger,
            config,
        }
    }

    /// Starts a sync run and returns its id immediately.
    ///
    /// Run-level failures never surface here: the run executes on a
    /// detached task and callers observe the result via `sync_history`.
    /// Only failure to record the pending run is reported synchronously.
    pub fn initiate_sync(
        &self,
        collection_id: CollectionId,
        source_device_id: DeviceId,
        target_device_id: DeviceId,
        target_address: &str,
        direction: SyncDirection,
        filter: Option<Value>,
    ) -> SyncResult<SyncId> {
        let run = SyncRun::begin(collection_id, source_device_id, target_device_id, direction);
        self.ledger.record(&run)?;

        info!(
            sync_id = %run.sync_id,
            collection = %collection_id,
            target = %target_device_id,
            %direction,
            "sync run initiated"
        );

        let sync_id = run.sync_id.clone();
        let task = RunTask {
            store: self.store.clone(),
            embedder: self.embedder.clone(),
            backups: self.backups.clone(),
            ledger: self.ledger.clone(),
            config: self.config.clone(),
            target_address: target_address.to_string(),
            filter,
        };
        tokio::spawn(task.execute(run));

        Ok(sync_id)
    }

    /// Run history, newest first, optionally filtered by collection and/or
    /// participating device.
    pub fn sync_history(
        &self,
        collection_id: Option<CollectionId>,
        device_id: Option<DeviceId>,
        limit: usize,
    ) -> SyncResult<Vec<SyncRun>> {
        self.ledger
            .history(collection_id.as_ref(), device_id.as_ref(), limit)
    }
}

/// Everything one detached run needs, cloned out of the service.
struct RunTask {
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn Embedder>,
    backups: Arc<BackupManager>,
    ledger: Arc<RunLedger>,
    config: SyncConfig,
    target_address: String,
    filter: Option<Value>,
}

impl RunTask {
    async fn execute(self, run: SyncRun) {
        if let Err(e) = self.ledger.mark_in_progress(&run.sync_id) {
            error!("failed to mark run {} in progress: {e}", run.sync_id);
        }

        let mut synced: u64 = 0;
        let mut conflicts: u64 = 0;
        let outcome = self.run_protocol(&run, &mut synced, &mut conflicts).await;

        let (status, message) = match &outcome {
            Ok(()) => {
                info!(
                    sync_id = %run.sync_id,
                    documents = synced,
                    conflicts,
                    "sync run completed"
                );
                (SyncStatus::Completed, None)
            }
            Err(e) => {
                // Partial push progress is already on the peer and stays
                // counted; nothing to roll back on our side for push, and
                // the pull phase rolled itself back under its snapshot.
                error!(sync_id = %run.sync_id, "sync run failed: {e}");
                (SyncStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = self.ledger.finish(
            &run.sync_id,
            status,
            synced,
            conflicts,
            message.as_deref(),
        ) {
            error!("failed to record outcome of run {}: {e}", run.sync_id);
        }
    }

    async fn run_protocol(
        &self,
        run: &SyncRun,
        synced: &mut u64,
        conflicts: &mut u64,
    ) -> SyncResult<()> {
        let client = PeerClient::for_address(&self.target_address, self.config.http_timeout())?;
        let collection_id = run.collection_id;

        let local = local_metadata(&self.store, &collection_id).await?;
        let remote = client
            .fetch_metadata(&collection_id, self.filter.as_ref())
            .await?
            .documents;
        debug!(
            sync_id = %run.sync_id,
            local = local.len(),
            remote = remote.len(),
            "fetched metadata"
        );

        let mut plan = compute_plan(&local, &remote, run.direction, self.config.conflict_window());
        resolve_conflicts(&mut plan, self.config.conflict_policy);
        *conflicts = plan.conflicts.len() as u64;
        debug!(
            sync_id = %run.sync_id,
            to_push = plan.to_push.len(),
            to_pull = plan.to_pull.len(),
            conflicts = *conflicts,
            "computed plan"
        );

        if run.direction.allows_push() && !plan.to_push.is_empty() {
            for chunk in plan.to_push.chunks(self.config.batch_size) {
                let documents = self.store.get_documents(&collection_id, chunk).await?;
                let batch: Vec<PushDocument> = documents
                    .into_iter()
                    .map(|doc| PushDocument {
                        content_hash: content_hash(&doc.content),
                        id: doc.id,
                        content: doc.content,
                        attributes: doc.metadata,
                        modified_at: doc.modified_at,
                    })
                    .collect();
                client.push_documents(&collection_id, &batch).await?;
                *synced += batch.len() as u64;
            }
        }

        if run.direction.allows_pull() && !plan.to_pull.is_empty() {
            let pulled = self
                .backups
                .run_with_rollback(collection_id, || {
                    self.pull_phase(&client, collection_id, &plan.to_pull, &remote)
                })
                .await?;
            *synced += pulled;
        }

        Ok(())
    }

    /// Fetches, re-embeds and upserts the pull candidates. Tombstoned ids
    /// the peer no longer returns are deleted locally. Runs under a
    /// collection snapshot: any error here rolls the collection back.
    async fn pull_phase(
        &self,
        client: &PeerClient,
        collection_id: CollectionId,
        to_pull: &[DocumentId],
        remote: &HashMap<DocumentId, DocumentMetadata>,
    ) -> SyncResult<u64> {
        let mut count: u64 = 0;
        for chunk in to_pull.chunks(self.config.batch_size) {
            let pulled = client.pull_documents(&collection_id, chunk).await?;
            let returned: HashSet<&DocumentId> = pulled.iter().map(|d| &d.id).collect();

            let mut documents = Vec::with_capacity(pulled.len());
            for doc in &pulled {
                let embedding = self.embedder.embed(&doc.content).await?;
                let modified_at = remote
                    .get(&doc.id)
                    .map(|m| m.modified_at)
                    .unwrap_or_else(Utc::now);
                let mut document =
                    Document::new(doc.id.clone(), doc.content.clone(), doc.attributes.clone())
                        .with_embedding(embedding);
                document.modified_at = modified_at;
                documents.push(document);
            }
            count += documents.len() as u64;
            self.store.upsert_documents(&collection_id, documents).await?;

            let deletions: Vec<DocumentId> = chunk
                .iter()
                .filter(|id| {
                    !returned.contains(*id)
                        && remote.get(*id).is_some_and(DocumentMetadata::is_tombstone)
                })
                .cloned()
                .collect();
            if !deletions.is_empty() {
                self.store.delete_documents(&collection_id, &deletions).await?;
                count += deletions.len() as u64;
            }
        }
        Ok(count)
    }
}
