//! Structural collection operations.
//!
//! Rename and publish touch collection state the underlying store cannot
//! change transactionally, so each runs inside a snapshot/rollback guard and
//! appears atomic to callers.

use crate::backup::BackupManager;
use crate::error::{StoreError, StoreResult};
use crate::store::CollectionStore;
use std::sync::Arc;
use tracing::info;
use weave_types::CollectionId;

/// Facade for rollback-guarded collection operations.
pub struct Collections {
    store: Arc<dyn CollectionStore>,
    backups: Arc<BackupManager>,
}

impl Collections {
    /// Creates the facade over a store and its backup manager.
    #[must_use]
    pub fn new(store: Arc<dyn CollectionStore>, backups: Arc<BackupManager>) -> Self {
        Self { store, backups }
    }

    /// Renames a collection, restoring the snapshot if the store fails
    /// mid-operation.
    pub async fn rename(&self, collection_id: CollectionId, new_name: &str) -> StoreResult<()> {
        self.backups
            .run_with_rollback(collection_id, || async {
                self.require(&collection_id).await?;
                self.store.rename_collection(&collection_id, new_name).await
            })
            .await?;
        info!("renamed collection {collection_id} to {new_name:?}");
        Ok(())
    }

    /// Changes a collection's published flag under rollback protection.
    pub async fn publish(&self, collection_id: CollectionId, published: bool) -> StoreResult<()> {
        self.backups
            .run_with_rollback(collection_id, || async {
                self.require(&collection_id).await?;
                self.store.set_published(&collection_id, published).await
            })
            .await?;
        info!("set published={published} on collection {collection_id}");
        Ok(())
    }

    async fn require(&self, collection_id: &CollectionId) -> StoreResult<()> {
        match self.store.get_collection(collection_id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::CollectionNotFound(*collection_id)),
        }
    }
}
