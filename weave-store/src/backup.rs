//! Collection backup and restore.
//!
//! A `CollectionBackup` is a full snapshot — info, every document, every
//! embedding — taken immediately before a risky operation. Snapshots are
//! held in memory and mirrored to a JSON file, so a crash between backup
//! and restore stays recoverable once the process restarts. Best-effort
//! durability: there is no journal or fsync ordering guarantee.

use crate::document::{CollectionInfo, Document};
use crate::error::{StoreError, StoreResult};
use crate::store::CollectionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};
use weave_types::CollectionId;

/// Full-content snapshot of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionBackup {
    pub collection: CollectionInfo,
    pub documents: Vec<Document>,
    pub taken_at: DateTime<Utc>,
}

/// Takes, holds and applies collection snapshots.
///
/// One snapshot per collection at a time: the manager owns it for the
/// duration of the guarded operation, discards it on success and applies it
/// on failure.
pub struct BackupManager {
    store: Arc<dyn CollectionStore>,
    dir: PathBuf,
    snapshots: Mutex<HashMap<CollectionId, CollectionBackup>>,
}

impl BackupManager {
    /// Creates a manager persisting snapshot files under `dir`.
    pub fn new(store: Arc<dyn CollectionStore>, dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            store,
            dir,
            snapshots: Mutex::new(HashMap::new()),
        })
    }

    fn snapshot_path(&self, collection_id: &CollectionId) -> PathBuf {
        self.dir.join(format!("{collection_id}.backup.json"))
    }

    /// Snapshots a collection's full content. Returns `None` when the
    /// collection does not exist (nothing to guard).
    pub async fn backup(&self, collection_id: &CollectionId) -> StoreResult<Option<CollectionBackup>> {
        let Some(collection) = self.store.get_collection(collection_id).await? else {
            return Ok(None);
        };
        let documents = self.store.list_documents(collection_id).await?;

        let snapshot = CollectionBackup {
            collection,
            documents,
            taken_at: Utc::now(),
        };

        if let Err(e) = persist_snapshot(&self.snapshot_path(collection_id), &snapshot) {
            warn!("failed to persist snapshot for {collection_id}: {e}");
        }
        self.snapshots
            .lock()
            .unwrap()
            .insert(*collection_id, snapshot.clone());

        debug!(
            "took snapshot of {} ({} documents)",
            collection_id,
            snapshot.documents.len()
        );
        Ok(Some(snapshot))
    }

    /// Restores a collection from its snapshot: the collection is deleted
    /// and recreated verbatim, documents and vectors included. Returns
    /// whether the restore succeeded.
    pub async fn restore(&self, collection_id: &CollectionId) -> bool {
        let snapshot = self.snapshots.lock().unwrap().remove(collection_id);
        let snapshot = match snapshot {
            Some(s) => Some(s),
            None => match load_snapshot(&self.snapshot_path(collection_id)) {
                Ok(s) => s,
                Err(e) => {
                    warn!("failed to load snapshot file for {collection_id}: {e}");
                    None
                }
            },
        };
        let Some(snapshot) = snapshot else {
            warn!("no snapshot to restore for {collection_id}");
            return false;
        };

        let result: StoreResult<()> = async {
            self.store.delete_collection(collection_id).await?;
            self.store.create_collection(snapshot.collection.clone()).await?;
            self.store
                .upsert_documents(collection_id, snapshot.documents.clone())
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.remove_snapshot_file(collection_id);
                debug!("restored {} from snapshot", collection_id);
                true
            }
            Err(e) => {
                error!("restore of {collection_id} failed: {e}");
                // Keep the snapshot so the caller can retry.
                self.snapshots
                    .lock()
                    .unwrap()
                    .insert(*collection_id, snapshot);
                false
            }
        }
    }

    /// Discards the snapshot for a collection, memory and disk.
    pub fn cleanup(&self, collection_id: &CollectionId) {
        self.snapshots.lock().unwrap().remove(collection_id);
        self.remove_snapshot_file(collection_id);
    }

    /// Re-hydrates a snapshot left on disk by a crashed process, making it
    /// available to `restore`.
    pub fn load_pending(&self, collection_id: &CollectionId) -> StoreResult<Option<CollectionBackup>> {
        let Some(snapshot) = load_snapshot(&self.snapshot_path(collection_id))? else {
            return Ok(None);
        };
        self.snapshots
            .lock()
            .unwrap()
            .insert(*collection_id, snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Runs `op` guarded by a snapshot of the collection.
    ///
    /// On success the snapshot is discarded; on error the collection is
    /// restored from it and the original error is returned. When the
    /// collection does not exist yet, `op` runs unguarded.
    pub async fn run_with_rollback<T, E, F, Fut>(
        &self,
        collection_id: CollectionId,
        op: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StoreError> + Display,
    {
        let snapshot = self.backup(&collection_id).await.map_err(E::from)?;

        match op().await {
            Ok(value) => {
                self.cleanup(&collection_id);
                Ok(value)
            }
            Err(err) => {
                if snapshot.is_some() {
                    warn!("operation on {collection_id} failed ({err}), rolling back");
                    if !self.restore(&collection_id).await {
                        error!("rollback of {collection_id} failed; snapshot retained");
                    }
                }
                Err(err)
            }
        }
    }

    fn remove_snapshot_file(&self, collection_id: &CollectionId) {
        let path = self.snapshot_path(collection_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to remove snapshot file {}: {e}", path.display());
            }
        }
    }
}

fn persist_snapshot(path: &Path, snapshot: &CollectionBackup) -> StoreResult<()> {
    let json = serde_json::to_string(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn load_snapshot(path: &Path) -> StoreResult<Option<CollectionBackup>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}
