//! Collection storage seams and backup/rollback for Weave.
//!
//! The document/vector store itself is an external collaborator — this crate
//! defines the traits the rest of the core talks through:
//!
//! - **`CollectionStore`**: collections and their documents
//! - **`Embedder`**: the local embedding service (pulled content is
//!   re-embedded locally; vectors never cross the wire)
//!
//! plus the parts that are first-party:
//!
//! - **`BackupManager`**: full-collection snapshots taken before risky
//!   mutations, restored verbatim on failure
//! - **`Collections`**: structural operations (rename, publish) that must
//!   appear atomic even though the underlying store has no transactions
//!
//! An in-memory `MemoryCollectionStore` is included for tests and embedded
//! use.

mod backup;
mod document;
mod embed;
mod error;
mod ops;
mod store;

pub use backup::{BackupManager, CollectionBackup};
pub use document::{CollectionInfo, Document};
pub use embed::Embedder;
pub use embed::mock::FixedEmbedder;
pub use error::{StoreError, StoreResult};
pub use ops::Collections;
pub use store::{CollectionStore, MemoryCollectionStore};
