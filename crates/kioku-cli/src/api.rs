//! Kioku API Client

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Profile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure talking to the API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Could not reach Kioku API: {0}")]
    Unreachable(String),

    #[error("API error ({status}): {body}")]
    Status { status: StatusCode, body: String },
}

impl ApiError {
    /// The backend is down rather than the request being bad
    pub fn is_infrastructure(&self) -> bool {
        match self {
            ApiError::Unreachable(_) => true,
            ApiError::Status { status, .. } => matches!(
                *status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            ),
        }
    }
}

/// True when `err` is an [`ApiError`] caused by an unavailable backend
pub fn is_infrastructure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_infrastructure)
}

// ============================================
// API Request Types
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryRequest {
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub source: String,
    pub source_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One conversation batch; also the line format of `memory ingest` files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemoriesRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub source: String,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infer: Option<bool>,
    /// Remaining fields (title, tags, timestamp...) pass through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AddMemoriesRequest {
    /// Fill scope keys the batch does not set itself
    pub fn apply_scope(&mut self, profile: &Profile) {
        if self.owner_id.is_none() {
            self.owner_id = Some(profile.owner_id);
        }
        if self.agent_id.is_none() {
            self.agent_id = profile.agent_id.clone();
        }
        if self.run_id.is_none() {
            self.run_id = profile.run_id.clone();
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMemoriesRequest {
    pub query: String,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskMemoriesRequest {
    pub question: String,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankRequest>,
}

// ============================================
// API Response Types
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub id: i64,
    pub owner_id: i64,
    pub agent_id: Option<String>,
    pub source: String,
    pub source_id: String,
    pub content: String,
    pub title: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub importance: f32,
    pub content_hash: String,
    pub embedding_ref: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResultResponse {
    pub vector_id: String,
    pub success: bool,
    pub is_duplicate: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryResponse {
    pub memory: MemoryResponse,
    pub is_duplicate: bool,
    pub embedding_results: Vec<EmbeddingResultResponse>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMemoryResponse {
    pub deleted: bool,
    pub memory: MemoryResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMemoriesResponse {
    pub memories: Vec<MemoryResponse>,
    pub results: Vec<EmbeddingResultResponse>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHitResponse {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub rerank_score: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchMemoriesResponse {
    pub memories: Vec<SearchHitResponse>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub memories: Vec<SearchHitResponse>,
    pub count: usize,
    pub model: String,
    pub rerank_model: Option<String>,
}

/// API Client for Kioku
pub struct KiokuClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl KiokuClient {
    /// Create a new API client; every request is bounded by a 30 s timeout
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body }.into());
        }

        resp.json().await.context("Failed to parse response")
    }

    /// Test connection with health check
    pub async fn health(&self) -> Result<bool> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.status().is_success())
    }

    pub async fn create_memory(&self, request: &CreateMemoryRequest) -> Result<CreateMemoryResponse> {
        self.send(self.client.post(self.url("/api/memory")).json(request))
            .await
    }

    pub async fn get_memory(&self, id: i64) -> Result<MemoryResponse> {
        self.send(self.client.get(self.url(&format!("/api/memory/{id}"))))
            .await
    }

    pub async fn delete_memory(&self, id: i64) -> Result<DeleteMemoryResponse> {
        self.send(self.client.delete(self.url(&format!("/api/memory/{id}"))))
            .await
    }

    pub async fn list_memories(&self, owner_id: i64) -> Result<Vec<MemoryResponse>> {
        self.send(
            self.client
                .get(self.url(&format!("/api/memory/owner/{owner_id}"))),
        )
        .await
    }

    pub async fn add_memories(&self, request: &AddMemoriesRequest) -> Result<AddMemoriesResponse> {
        self.send(self.client.post(self.url("/api/memories")).json(request))
            .await
    }

    pub async fn search_memories(
        &self,
        request: &SearchMemoriesRequest,
    ) -> Result<SearchMemoriesResponse> {
        self.send(
            self.client
                .post(self.url("/api/memories/search"))
                .json(request),
        )
        .await
    }

    pub async fn ask(&self, request: &AskMemoriesRequest) -> Result<AskResponse> {
        self.send(self.client.post(self.url("/api/memories/ask")).json(request))
            .await
    }
}
