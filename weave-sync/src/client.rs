//! HTTP client for a peer's sync endpoints.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    MetadataResponse, PullRequest, PulledDocument, PushDocument, PushRequest,
};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use weave_types::{CollectionId, DocumentId};

/// Client for one peer's collection sync API.
pub struct PeerClient {
    base_url: String,
    client: Client,
}

impl PeerClient {
    /// Creates a client for the given base URL with a request-level timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Creates a client for a `host:port` address as resolved by discovery.
    pub fn for_address(address: &str, timeout: Duration) -> SyncResult<Self> {
        Self::new(format!("http://{address}"), timeout)
    }

    /// Fetches the peer's sync metadata for a collection, optionally
    /// filtered. The filter travels as a URL-encoded JSON query parameter.
    pub async fn fetch_metadata(
        &self,
        collection_id: &CollectionId,
        filter: Option<&Value>,
    ) -> SyncResult<MetadataResponse> {
        let mut url = format!(
            "{}/collections/{}/sync/metadata",
            self.base_url, collection_id
        );
        if let Some(filter) = filter {
            url.push_str("?filter=");
            url.push_str(&urlencoding::encode(&filter.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        check_status(response)
            .await?
            .json::<MetadataResponse>()
            .await
            .map_err(|e| SyncError::Protocol(e.to_string()))
    }

    /// Pushes a batch of documents to the peer.
    pub async fn push_documents(
        &self,
        collection_id: &CollectionId,
        documents: &[PushDocument],
    ) -> SyncResult<()> {
        let url = format!("{}/collections/{}/sync/push", self.base_url, collection_id);
        let response = self
            .client
            .post(&url)
            .json(&PushRequest {
                documents: documents.to_vec(),
            })
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    /// Fetches a batch of full documents from the peer.
    pub async fn pull_documents(
        &self,
        collection_id: &CollectionId,
        document_ids: &[DocumentId],
    ) -> SyncResult<Vec<PulledDocument>> {
        let url = format!("{}/collections/{}/sync/pull", self.base_url, collection_id);
        let response = self
            .client
            .post(&url)
            .json(&PullRequest {
                document_ids: document_ids.to_vec(),
            })
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let body = check_status(response)
            .await?
            .json::<crate::protocol::PullResponse>()
            .await
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        Ok(body.documents)
    }
}

async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    let message: String = message.chars().take(512).collect();
    Err(SyncError::Api {
        status: status.as_u16(),
        message,
    })
}
