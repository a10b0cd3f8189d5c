use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use weave_store::{
    BackupManager, CollectionInfo, CollectionStore, Document, FixedEmbedder, MemoryCollectionStore,
};
use weave_sync::{
    content_hash, ConflictPolicy, RunLedger, SyncConfig, SyncDirection, SyncRun, SyncService,
    SyncStatus,
};
use weave_types::{CollectionId, DeviceId, DocumentId, SyncId};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    store: Arc<MemoryCollectionStore>,
    service: SyncService,
    collection: CollectionId,
    local_device: DeviceId,
    remote_device: DeviceId,
    _dir: tempfile::TempDir,
}

async fn fixture(config: SyncConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryCollectionStore::new());
    let backups =
        Arc::new(BackupManager::new(store.clone(), dir.path().join("backups")).unwrap());
    let ledger = Arc::new(RunLedger::open_in_memory().unwrap());
    let service = SyncService::new(
        store.clone(),
        Arc::new(FixedEmbedder::default()),
        backups,
        ledger,
        config,
    );

    let collection = CollectionId::new();
    store
        .create_collection(CollectionInfo::new(collection, "notes"))
        .await
        .unwrap();

    Fixture {
        store,
        service,
        collection,
        local_device: DeviceId::new(),
        remote_device: DeviceId::new(),
        _dir: dir,
    }
}

fn doc(id: &str, content: &str) -> Document {
    Document::new(DocumentId::from(id), content, json!({}))
}

fn address_of(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

async fn wait_terminal(fx: &Fixture, sync_id: &SyncId) -> SyncRun {
    for _ in 0..200 {
        let runs = fx.service.sync_history(Some(fx.collection), None, 20).unwrap();
        if let Some(run) = runs.into_iter().find(|r| &r.sync_id == sync_id) {
            if run.status.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run {sync_id} did not reach a terminal state");
}

fn mount_metadata(collection: &CollectionId, body: serde_json::Value) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/collections/{collection}/sync/metadata")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

// ── Push runs ────────────────────────────────────────────────────

#[tokio::test]
async fn push_run_sends_the_local_document_and_completes() {
    let fx = fixture(SyncConfig::default()).await;
    fx.store
        .upsert_documents(&fx.collection, vec![doc("d1", "hello world")])
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_metadata(&fx.collection, json!({"documents": {}}))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/push", fx.collection)))
        .and(body_partial_json(json!({
            "documents": [{"id": "d1", "content": "hello world",
                           "content_hash": content_hash("hello world")}]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Push,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.documents_synced, 1);
    assert_eq!(run.conflicts_count, 0);
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn push_batch_failure_fails_the_run_but_keeps_partial_progress() {
    let config = SyncConfig {
        batch_size: 1,
        ..SyncConfig::default()
    };
    let fx = fixture(config).await;
    fx.store
        .upsert_documents(&fx.collection, vec![doc("a", "first"), doc("b", "second")])
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_metadata(&fx.collection, json!({"documents": {}}))
        .mount(&server)
        .await;
    // Batches go out in id order: "a" succeeds, "b" is refused.
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/push", fx.collection)))
        .and(body_partial_json(json!({"documents": [{"id": "a"}]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/push", fx.collection)))
        .and(body_partial_json(json!({"documents": [{"id": "b"}]})))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Push,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Failed);
    assert_eq!(run.documents_synced, 1);
    let message = run.error_message.unwrap();
    assert!(message.contains("500"), "unexpected message: {message}");
}

// ── Pull runs ────────────────────────────────────────────────────

#[tokio::test]
async fn pull_run_upserts_and_reembeds_remote_documents() {
    let fx = fixture(SyncConfig::default()).await;

    let server = MockServer::start().await;
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "r1": {"content_hash": "h-r1", "modified_at": "2026-08-01T09:00:00Z",
                   "metadata": {"origin": "remote"}}
        }}),
    )
    .mount(&server)
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .and(body_partial_json(json!({"document_ids": ["r1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "r1", "content": "from afar", "metadata": {"origin": "remote"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Pull,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.documents_synced, 1);

    let docs = fx.store.list_documents(&fx.collection).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id.as_str(), "r1");
    assert_eq!(docs[0].content, "from afar");
    // Embeddings are regenerated locally, never taken off the wire.
    assert!(docs[0].embedding.is_some());
    assert_eq!(docs[0].metadata["origin"], "remote");
}

#[tokio::test]
async fn pull_failure_rolls_the_collection_back() {
    let config = SyncConfig {
        batch_size: 1,
        ..SyncConfig::default()
    };
    let fx = fixture(config).await;
    fx.store
        .upsert_documents(&fx.collection, vec![doc("existing", "untouched")])
        .await
        .unwrap();
    let before = fx.store.list_documents(&fx.collection).await.unwrap();

    let server = MockServer::start().await;
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "r1": {"content_hash": "h1", "modified_at": "2026-08-01T09:00:00Z", "metadata": {}},
            "r2": {"content_hash": "h2", "modified_at": "2026-08-01T09:00:00Z", "metadata": {}}
        }}),
    )
    .mount(&server)
    .await;
    // First batch lands, second batch blows up mid-pull.
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .and(body_partial_json(json!({"document_ids": ["r1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "r1", "content": "partial", "metadata": {}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .and(body_partial_json(json!({"document_ids": ["r2"]})))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend crashed"))
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Pull,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Failed);

    // The half-applied pull was rolled back to the pre-run snapshot.
    let after = fx.store.list_documents(&fx.collection).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn pull_applies_remote_tombstones() {
    let fx = fixture(SyncConfig::default()).await;
    let mut stale = doc("gone", "old content");
    stale.modified_at = chrono::Utc::now() - chrono::Duration::hours(1);
    fx.store
        .upsert_documents(&fx.collection, vec![stale])
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "gone": {"content_hash": "h-old",
                      "modified_at": chrono::Utc::now().to_rfc3339(),
                      "metadata": {"deleted": true}}
        }}),
    )
    .mount(&server)
    .await;
    // The peer no longer returns content for the tombstoned document.
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"documents": []})))
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Pull,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert!(fx.store.list_documents(&fx.collection).await.unwrap().is_empty());
}

// ── Bidirectional & conflicts ────────────────────────────────────

#[tokio::test]
async fn bidirectional_run_pushes_and_pulls() {
    let fx = fixture(SyncConfig::default()).await;
    fx.store
        .upsert_documents(&fx.collection, vec![doc("mine", "local text")])
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "theirs": {"content_hash": "h-t", "modified_at": "2026-08-01T09:00:00Z", "metadata": {}}
        }}),
    )
    .mount(&server)
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/push", fx.collection)))
        .and(body_partial_json(json!({"documents": [{"id": "mine"}]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .and(body_partial_json(json!({"document_ids": ["theirs"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "theirs", "content": "remote text", "metadata": {}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Bidirectional,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.documents_synced, 2);
    assert_eq!(fx.store.list_documents(&fx.collection).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_edits_are_counted_and_resolved_by_policy() {
    let config = SyncConfig {
        conflict_policy: ConflictPolicy::KeepRemote,
        ..SyncConfig::default()
    };
    let fx = fixture(config).await;
    let now = chrono::Utc::now();
    let mut local = doc("d1", "local version");
    local.modified_at = now;
    fx.store.upsert_documents(&fx.collection, vec![local]).await.unwrap();

    let server = MockServer::start().await;
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "d1": {"content_hash": "h-remote",
                    "modified_at": (now + chrono::Duration::seconds(10)).to_rfc3339(),
                    "metadata": {}}
        }}),
    )
    .mount(&server)
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/collections/{}/sync/pull", fx.collection)))
        .and(body_partial_json(json!({"document_ids": ["d1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"id": "d1", "content": "remote version", "metadata": {}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Bidirectional,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.conflicts_count, 1);

    let docs = fx.store.list_documents(&fx.collection).await.unwrap();
    assert_eq!(docs[0].content, "remote version");
}

// ── Contract ─────────────────────────────────────────────────────

#[tokio::test]
async fn initiate_never_fails_synchronously_for_run_level_errors() {
    let fx = fixture(SyncConfig {
        http_timeout_secs: 1,
        ..SyncConfig::default()
    })
    .await;

    // Nothing listens here; the failure must land in history, not here.
    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            "127.0.0.1:1",
            SyncDirection::Push,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Failed);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn rerunning_after_success_is_a_noop() {
    let fx = fixture(SyncConfig::default()).await;
    fx.store
        .upsert_documents(&fx.collection, vec![doc("d1", "stable")])
        .await
        .unwrap();

    let server = MockServer::start().await;
    // The remote already has the identical document: nothing to transfer.
    mount_metadata(
        &fx.collection,
        json!({"documents": {
            "d1": {"content_hash": content_hash("stable"),
                    "modified_at": "2020-01-01T00:00:00Z", "metadata": {}}
        }}),
    )
    .mount(&server)
    .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Bidirectional,
            None,
        )
        .unwrap();

    let run = wait_terminal(&fx, &sync_id).await;
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.documents_synced, 0);
    assert_eq!(run.conflicts_count, 0);
}

#[tokio::test]
async fn history_reports_runs_for_the_collection() {
    let fx = fixture(SyncConfig::default()).await;
    let server = MockServer::start().await;
    mount_metadata(&fx.collection, json!({"documents": {}}))
        .mount(&server)
        .await;

    let sync_id = fx
        .service
        .initiate_sync(
            fx.collection,
            fx.local_device,
            fx.remote_device,
            &address_of(&server),
            SyncDirection::Push,
            None,
        )
        .unwrap();
    wait_terminal(&fx, &sync_id).await;

    let by_device = fx
        .service
        .sync_history(None, Some(fx.remote_device), 10)
        .unwrap();
    assert_eq!(by_device.len(), 1);
    assert_eq!(by_device[0].sync_id, sync_id);

    let other = fx.service.sync_history(Some(CollectionId::new()), None, 10).unwrap();
    assert!(other.is_empty());
}
