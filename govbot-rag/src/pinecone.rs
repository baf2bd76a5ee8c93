//! Pinecone vector index backend.
//!
//! Talks to the Pinecone REST API with `reqwest`. The controller endpoint
//! lists indexes and resolves each index's data-plane host; queries go to
//! that host directly. Resolved hosts are memoized for the life of the client.
//!
//! This module is only available when the `pinecone` feature is enabled.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::document::Match;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`VectorIndex`] backed by [Pinecone](https://www.pinecone.io/).
///
/// # Example
///
/// ```rust,ignore
/// use govbot_rag::pinecone::PineconeIndex;
///
/// let index = PineconeIndex::new(api_key, "us-west1-gcp")?;
/// let matches = index.query("chat-app", &embedding, 3, "").await?;
/// ```
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    controller_url: String,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeIndex {
    /// Create a client for the given API key and environment.
    pub fn new(api_key: impl Into<String>, environment: &str) -> Result<Self> {
        if environment.trim().is_empty() {
            return Err(RagError::Config("Pinecone environment must not be empty".into()));
        }
        Self::with_controller_url(api_key, format!("https://controller.{environment}.pinecone.io"))
    }

    /// Create a client that talks to an explicit controller endpoint.
    pub fn with_controller_url(
        api_key: impl Into<String>,
        controller_url: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("Pinecone API key must not be empty".into()));
        }

        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_key,
            controller_url: controller_url.into().trim_end_matches('/').to_string(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn error(message: String) -> RagError {
        RagError::Retrieval { backend: "Pinecone".into(), message }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response =
            self.client.get(url).header("Api-Key", &self.api_key).send().await.map_err(|e| {
                error!(backend = "Pinecone", error = %e, url, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;
        decode(response).await
    }

    /// Resolve the data-plane host serving `index`.
    async fn host(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }

        let url = format!("{}/databases/{index}", self.controller_url);
        let description: IndexDescription = self.get_json(&url).await?;
        let host = description
            .status
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Self::error(format!("index '{index}' has no host yet")))?;
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{host}")
        };

        debug!(backend = "Pinecone", index, %host, "resolved index host");
        self.hosts.write().await.insert(index.to_string(), host.clone());
        Ok(host)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
}

async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(backend = "Pinecone", %status, "API error");
        return Err(PineconeIndex::error(format!("API returned {status}: {body}")));
    }

    response.json().await.map_err(|e| {
        error!(backend = "Pinecone", error = %e, "failed to parse response");
        PineconeIndex::error(format!("failed to parse response: {e}"))
    })
}

// ── Pinecone API request/response types ────────────────────────────

#[derive(Deserialize)]
struct IndexDescription {
    status: IndexStatus,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    host: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn backend(&self) -> &str {
        "Pinecone"
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}/databases", self.controller_url);
        self.get_json(&url).await
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<Match>> {
        let host = self.host(index).await?;
        let body = QueryRequest { vector, top_k, namespace, include_metadata: true };

        let response = self
            .client
            .post(format!("{host}/query"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = "Pinecone", error = %e, index, "query failed");
                Self::error(format!("query failed: {e}"))
            })?;

        let result: QueryResponse = decode(response).await?;
        debug!(backend = "Pinecone", index, namespace, match_count = result.matches.len(), "query completed");
        Ok(result.matches)
    }
}
