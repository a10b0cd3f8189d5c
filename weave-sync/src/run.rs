//! Sync run records.

use crate::protocol::{SyncDirection, SyncStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use weave_types::{CollectionId, DeviceId, SyncId};

/// One execution of the synchronization protocol between two devices for
/// one collection. Persisted in the run ledger for history; terminal runs
/// are immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub sync_id: SyncId,
    pub collection_id: CollectionId,
    pub source_device_id: DeviceId,
    pub target_device_id: DeviceId,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub documents_synced: u64,
    pub conflicts_count: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SyncRun {
    /// Creates a pending run with a content-derived id.
    #[must_use]
    pub fn begin(
        collection_id: CollectionId,
        source_device_id: DeviceId,
        target_device_id: DeviceId,
        direction: SyncDirection,
    ) -> Self {
        let started_at = Utc::now();
        Self {
            sync_id: derive_sync_id(&collection_id, &source_device_id, &target_device_id, started_at),
            collection_id,
            source_device_id,
            target_device_id,
            direction,
            status: SyncStatus::Pending,
            documents_synced: 0,
            conflicts_count: 0,
            started_at,
            completed_at: None,
            error_message: None,
        }
    }
}

/// Derives a sync id from the collection, both device ids and the start
/// timestamp. The same logical run always hashes to the same id.
#[must_use]
pub fn derive_sync_id(
    collection_id: &CollectionId,
    source_device_id: &DeviceId,
    target_device_id: &DeviceId,
    started_at: DateTime<Utc>,
) -> SyncId {
    let mut hasher = Sha256::new();
    hasher.update(collection_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(source_device_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(target_device_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(started_at.timestamp_millis().to_le_bytes());
    let digest = hasher.finalize();
    SyncId::from_raw(hex::encode(&digest[..16]))
}
