//! Collection synchronization engine for Weave.
//!
//! Reconciles divergent copies of a document collection between two devices
//! over the peer's HTTP sync API.
//!
//! # Sync process
//!
//! 1. **Metadata**: hash every local document, fetch the peer's metadata
//! 2. **Diff**: partition into push candidates, pull candidates, conflicts
//!    (hash-first; a symmetric conflict window decides "concurrent")
//! 3. **Resolve**: apply the configured conflict policy
//! 4. **Push**: send full documents in batches
//! 5. **Pull**: fetch full documents, re-embed locally, upsert under a
//!    collection snapshot so a mid-pull failure rolls back cleanly
//!
//! Runs are detached: `initiate_sync` returns an id at once and the outcome
//! lands in the persistent run ledger.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use weave_store::{BackupManager, FixedEmbedder, MemoryCollectionStore};
//! use weave_sync::{RunLedger, SyncConfig, SyncService};
//!
//! let store = Arc::new(MemoryCollectionStore::new());
//! let backups = Arc::new(BackupManager::new(store.clone(), "/tmp/weave-backups").unwrap());
//! let ledger = Arc::new(RunLedger::open_in_memory().unwrap());
//! let service = SyncService::new(
//!     store,
//!     Arc::new(FixedEmbedder::default()),
//!     backups,
//!     ledger,
//!     SyncConfig::default(),
//! );
//! ```

mod client;
pub mod conflict;
pub mod diff;
mod error;
mod ledger;
mod metadata;
pub mod protocol;
mod run;
mod service;

pub use client::PeerClient;
pub use conflict::{ConflictPolicy, ConflictRecord, ConflictResolution, ConflictType};
pub use diff::{compute_plan, SyncPlan};
pub use error::{SyncError, SyncResult};
pub use ledger::RunLedger;
pub use metadata::{content_hash, local_metadata};
pub use protocol::{
    DocumentMetadata, MetadataResponse, PullRequest, PullResponse, PulledDocument, PushDocument,
    PushRequest, SyncDirection, SyncStatus, MAX_BATCH_SIZE,
};
pub use run::{derive_sync_id, SyncRun};
pub use service::{SyncConfig, SyncService};
