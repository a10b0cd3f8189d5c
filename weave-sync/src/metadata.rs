//! Local metadata assembly and content hashing.

use crate::error::SyncResult;
use crate::protocol::DocumentMetadata;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use weave_store::CollectionStore;
use weave_types::{CollectionId, DocumentId};

/// Hex SHA-256 of a document's content. Hash equality, not timestamps, is
/// what decides whether a document changed at all.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes sync metadata for every document in a local collection.
pub async fn local_metadata(
    store: &Arc<dyn CollectionStore>,
    collection_id: &CollectionId,
) -> SyncResult<HashMap<DocumentId, DocumentMetadata>> {
    let documents = store.list_documents(collection_id).await?;
    Ok(documents
        .into_iter()
        .map(|doc| {
            let meta = DocumentMetadata {
                content_hash: content_hash(&doc.content),
                modified_at: doc.modified_at,
                attributes: doc.metadata,
            };
            (doc.id, meta)
        })
        .collect())
}
