use serde_json::json;
use weave_store::{CollectionInfo, CollectionStore, Document, MemoryCollectionStore, StoreError};
use weave_types::{CollectionId, DocumentId};

fn doc(id: &str, content: &str) -> Document {
    Document::new(DocumentId::from(id), content, json!({"source": "test"}))
}

async fn store_with_collection() -> (MemoryCollectionStore, CollectionId) {
    let store = MemoryCollectionStore::new();
    let id = CollectionId::new();
    store
        .create_collection(CollectionInfo::new(id, "notes"))
        .await
        .unwrap();
    (store, id)
}

// ── Collections ──────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_collection() {
    let (store, id) = store_with_collection().await;
    let info = store.get_collection(&id).await.unwrap().unwrap();
    assert_eq!(info.name, "notes");
    assert!(!info.published);
}

#[tokio::test]
async fn get_missing_collection_is_none() {
    let store = MemoryCollectionStore::new();
    assert!(store.get_collection(&CollectionId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_collection_removes_documents_too() {
    let (store, id) = store_with_collection().await;
    store.upsert_documents(&id, vec![doc("d1", "hello")]).await.unwrap();
    store.delete_collection(&id).await.unwrap();

    assert!(store.get_collection(&id).await.unwrap().is_none());
    assert!(matches!(
        store.list_documents(&id).await,
        Err(StoreError::CollectionNotFound(_))
    ));
}

#[tokio::test]
async fn rename_collection() {
    let (store, id) = store_with_collection().await;
    store.rename_collection(&id, "renamed").await.unwrap();
    assert_eq!(store.get_collection(&id).await.unwrap().unwrap().name, "renamed");
}

#[tokio::test]
async fn rename_missing_collection_errors() {
    let store = MemoryCollectionStore::new();
    assert!(matches!(
        store.rename_collection(&CollectionId::new(), "x").await,
        Err(StoreError::CollectionNotFound(_))
    ));
}

#[tokio::test]
async fn set_published_flag() {
    let (store, id) = store_with_collection().await;
    store.set_published(&id, true).await.unwrap();
    assert!(store.get_collection(&id).await.unwrap().unwrap().published);
}

// ── Documents ────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_replaces() {
    let (store, id) = store_with_collection().await;
    store.upsert_documents(&id, vec![doc("d1", "v1")]).await.unwrap();
    store.upsert_documents(&id, vec![doc("d1", "v2")]).await.unwrap();

    let docs = store.list_documents(&id).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "v2");
}

#[tokio::test]
async fn list_documents_is_sorted_by_id() {
    let (store, id) = store_with_collection().await;
    store
        .upsert_documents(&id, vec![doc("b", "2"), doc("a", "1"), doc("c", "3")])
        .await
        .unwrap();

    let ids: Vec<String> = store
        .list_documents(&id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id.to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn get_documents_skips_missing_ids() {
    let (store, id) = store_with_collection().await;
    store.upsert_documents(&id, vec![doc("d1", "x")]).await.unwrap();

    let found = store
        .get_documents(&id, &[DocumentId::from("d1"), DocumentId::from("ghost")])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_str(), "d1");
}

#[tokio::test]
async fn delete_documents_removes_named_ids() {
    let (store, id) = store_with_collection().await;
    store
        .upsert_documents(&id, vec![doc("d1", "x"), doc("d2", "y")])
        .await
        .unwrap();
    store
        .delete_documents(&id, &[DocumentId::from("d1"), DocumentId::from("ghost")])
        .await
        .unwrap();

    let docs = store.list_documents(&id).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id.as_str(), "d2");
}

#[tokio::test]
async fn documents_keep_embeddings() {
    let (store, id) = store_with_collection().await;
    let d = doc("d1", "content").with_embedding(vec![0.5, 1.5]);
    store.upsert_documents(&id, vec![d]).await.unwrap();

    let docs = store.list_documents(&id).await.unwrap();
    assert_eq!(docs[0].embedding, Some(vec![0.5, 1.5]));
}
