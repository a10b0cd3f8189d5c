//! The collection storage seam.
//!
//! Production deployments put a vector database behind this trait; the sync
//! and backup layers only ever talk through it. `MemoryCollectionStore` is a
//! complete lock-guarded implementation for tests and embedded use.

use crate::document::{CollectionInfo, Document};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use weave_types::{CollectionId, DocumentId};

/// Storage operations for collections and their documents.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Fetches a collection's info, or `None` if it does not exist.
    async fn get_collection(&self, id: &CollectionId) -> StoreResult<Option<CollectionInfo>>;

    /// Creates a collection. Replaces any existing collection with that id.
    async fn create_collection(&self, info: CollectionInfo) -> StoreResult<()>;

    /// Deletes a collection and all of its documents.
    async fn delete_collection(&self, id: &CollectionId) -> StoreResult<()>;

    /// Renames a collection.
    async fn rename_collection(&self, id: &CollectionId, name: &str) -> StoreResult<()>;

    /// Changes a collection's published flag.
    async fn set_published(&self, id: &CollectionId, published: bool) -> StoreResult<()>;

    /// Lists every document in a collection.
    async fn list_documents(&self, id: &CollectionId) -> StoreResult<Vec<Document>>;

    /// Fetches the named documents. Missing ids are silently skipped.
    async fn get_documents(
        &self,
        id: &CollectionId,
        ids: &[DocumentId],
    ) -> StoreResult<Vec<Document>>;

    /// Inserts or replaces documents.
    async fn upsert_documents(&self, id: &CollectionId, docs: Vec<Document>) -> StoreResult<()>;

    /// Deletes the named documents. Missing ids are silently skipped.
    async fn delete_documents(&self, id: &CollectionId, ids: &[DocumentId]) -> StoreResult<()>;
}

#[derive(Debug, Clone)]
struct StoredCollection {
    info: CollectionInfo,
    documents: HashMap<DocumentId, Document>,
}

/// In-memory collection store guarded by a single short-held mutex.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    collections: Mutex<HashMap<CollectionId, StoredCollection>>,
}

impl MemoryCollectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<T>(
        &self,
        id: &CollectionId,
        f: impl FnOnce(&mut StoredCollection) -> T,
    ) -> StoreResult<T> {
        let mut collections = self.collections.lock().unwrap();
        let stored = collections
            .get_mut(id)
            .ok_or(StoreError::CollectionNotFound(*id))?;
        Ok(f(stored))
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn get_collection(&self, id: &CollectionId) -> StoreResult<Option<CollectionInfo>> {
        let collections = self.collections.lock().unwrap();
        Ok(collections.get(id).map(|c| c.info.clone()))
    }

    async fn create_collection(&self, info: CollectionInfo) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();
        collections.insert(
            info.id,
            StoredCollection {
                info,
                documents: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, id: &CollectionId) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();
        collections.remove(id);
        Ok(())
    }

    async fn rename_collection(&self, id: &CollectionId, name: &str) -> StoreResult<()> {
        self.with_collection(id, |c| c.info.name = name.to_string())
    }

    async fn set_published(&self, id: &CollectionId, published: bool) -> StoreResult<()> {
        self.with_collection(id, |c| c.info.published = published)
    }

    async fn list_documents(&self, id: &CollectionId) -> StoreResult<Vec<Document>> {
        self.with_collection(id, |c| {
            let mut docs: Vec<Document> = c.documents.values().cloned().collect();
            docs.sort_by(|a, b| a.id.cmp(&b.id));
            docs
        })
    }

    async fn get_documents(
        &self,
        id: &CollectionId,
        ids: &[DocumentId],
    ) -> StoreResult<Vec<Document>> {
        self.with_collection(id, |c| {
            ids.iter()
                .filter_map(|doc_id| c.documents.get(doc_id).cloned())
                .collect()
        })
    }

    async fn upsert_documents(&self, id: &CollectionId, docs: Vec<Document>) -> StoreResult<()> {
        self.with_collection(id, |c| {
            for doc in docs {
                c.documents.insert(doc.id.clone(), doc);
            }
        })
    }

    async fn delete_documents(&self, id: &CollectionId, ids: &[DocumentId]) -> StoreResult<()> {
        self.with_collection(id, |c| {
            for doc_id in ids {
                c.documents.remove(doc_id);
            }
        })
    }
}
