//! Core type definitions for Weave.
//!
//! This crate defines the fundamental types shared by the discovery, sync
//! and storage layers:
//! - Device and collection identifiers (UUID v7)
//! - Document and sync-run identifiers (string-based: document ids originate
//!   in foreign stores, sync ids are content-derived digests)
//! - The device record exchanged in discovery announcements
//!
//! Domain-specific types (documents, sync plans, wire messages) belong in
//! their respective crates, not here.

mod device;
mod ids;

pub use device::{hostname, DeviceKind, DeviceRecord, DeviceStatus};
pub use ids::{CollectionId, DeviceId, DocumentId, SyncId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid device kind: {0}")]
    InvalidDeviceKind(String),
}
