//! Memories Routes - Batch ingestion, search and question answering

use axum::{extract::State, routing::post, Json, Router};

use super::error::{api_error, unavailable, ApiError};
use crate::models::{
    AddMemoriesRequest, AddMemoriesResponse, AskMemoriesRequest, AskResponse,
    SearchMemoriesRequest, SearchMemoriesResponse,
};
use crate::AppState;

/// Ingest a conversation; system and blank messages are skipped
#[utoipa::path(
    post,
    path = "/api/memories",
    request_body = AddMemoriesRequest,
    responses(
        (status = 200, description = "Messages stored", body = AddMemoriesResponse),
        (status = 400, description = "Invalid input (e.g. missing ownerId)"),
        (status = 503, description = "Memory engine unavailable")
    ),
    tag = "Memory"
)]
pub async fn add_memories(
    State(state): State<AppState>,
    Json(payload): Json<AddMemoriesRequest>,
) -> Result<Json<AddMemoriesResponse>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let outcome = engine
        .add_memories(payload.into())
        .await
        .map_err(api_error)?;

    tracing::info!("💾 Stored {} memories from batch", outcome.memories.len());

    Ok(Json(outcome.into()))
}

/// Scoped similarity search, optionally reranked
#[utoipa::path(
    post,
    path = "/api/memories/search",
    request_body = SearchMemoriesRequest,
    responses(
        (status = 200, description = "Matching memories, best first", body = SearchMemoriesResponse),
        (status = 400, description = "Empty query, missing scope or bad limit/threshold"),
        (status = 503, description = "Retrieval unavailable")
    ),
    tag = "Retrieval"
)]
pub async fn search_memories(
    State(state): State<AppState>,
    Json(payload): Json<SearchMemoriesRequest>,
) -> Result<Json<SearchMemoriesResponse>, ApiError> {
    let retrieval = state
        .retrieval
        .as_ref()
        .ok_or_else(|| unavailable("Retrieval pipeline"))?;

    let (request, rerank) = payload.into_parts();
    let hits = retrieval.search(&request).await.map_err(api_error)?;
    let hits = retrieval.rerank(&request.query, hits, &rerank).await;

    Ok(Json(hits.into()))
}

/// Answer a question from the caller's memories
#[utoipa::path(
    post,
    path = "/api/memories/ask",
    request_body = AskMemoriesRequest,
    responses(
        (status = 200, description = "Answer with supporting memories", body = AskResponse),
        (status = 400, description = "Empty question or missing scope"),
        (status = 503, description = "Retrieval unavailable")
    ),
    tag = "Retrieval"
)]
pub async fn ask_memories(
    State(state): State<AppState>,
    Json(payload): Json<AskMemoriesRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let retrieval = state
        .retrieval
        .as_ref()
        .ok_or_else(|| unavailable("Retrieval pipeline"))?;

    let answer = retrieval.ask(&payload.into()).await.map_err(api_error)?;

    Ok(Json(answer.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/memories", post(add_memories))
        .route("/api/memories/search", post(search_memories))
        .route("/api/memories/ask", post(ask_memories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_missing_pipeline_is_unavailable() {
        let request: AskMemoriesRequest = serde_json::from_value(serde_json::json!({
            "question": "What do I owe Acme?",
            "ownerId": 1
        }))
        .unwrap();

        let err = ask_memories(State(AppState::unconfigured()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.1, "Retrieval pipeline not available");
    }
}
