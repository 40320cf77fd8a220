//! Memory Routes - Single memory lifecycle
//!
//! Handlers delegate to MemoryEngine; dedup, fact extraction and vector
//! bookkeeping happen there.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use super::error::{api_error, unavailable, ApiError};
use crate::models::{
    CreateMemoryRequest, CreateMemoryResponse, DeleteMemoryResponse, MemoryResponse,
    UpdateMemoryRequest, UpdateMemoryResponse,
};
use crate::AppState;

/// Create a memory (deduplicated by content hash within its scope)
#[utoipa::path(
    post,
    path = "/api/memory",
    request_body = CreateMemoryRequest,
    responses(
        (status = 200, description = "Memory created, or the existing duplicate", body = CreateMemoryResponse),
        (status = 400, description = "Invalid input"),
        (status = 429, description = "Embedding provider rate limited"),
        (status = 503, description = "Memory engine or backing store unavailable")
    ),
    tag = "Memory"
)]
pub async fn create_memory(
    State(state): State<AppState>,
    Json(payload): Json<CreateMemoryRequest>,
) -> Result<Json<CreateMemoryResponse>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let outcome = engine.create(payload.into()).await.map_err(api_error)?;

    Ok(Json(outcome.into()))
}

/// Get a memory by id
#[utoipa::path(
    get,
    path = "/api/memory/{id}",
    params(
        ("id" = i64, Path, description = "Memory ID")
    ),
    responses(
        (status = 200, description = "Memory found", body = MemoryResponse),
        (status = 404, description = "Memory not found"),
        (status = 503, description = "Memory engine unavailable")
    ),
    tag = "Memory"
)]
pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MemoryResponse>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let memory = engine.get(id).await.map_err(api_error)?;

    Ok(Json(memory.into()))
}

/// Update a memory; changed content is re-hashed and re-embedded
#[utoipa::path(
    put,
    path = "/api/memory/{id}",
    params(
        ("id" = i64, Path, description = "Memory ID")
    ),
    request_body = UpdateMemoryRequest,
    responses(
        (status = 200, description = "Memory updated", body = UpdateMemoryResponse),
        (status = 404, description = "Memory not found"),
        (status = 409, description = "Same content already stored in this scope"),
        (status = 503, description = "Memory engine unavailable")
    ),
    tag = "Memory"
)]
pub async fn update_memory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMemoryRequest>,
) -> Result<Json<UpdateMemoryResponse>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let outcome = engine.update(id, payload.into()).await.map_err(api_error)?;

    Ok(Json(outcome.into()))
}

/// Delete a memory and its vectors
#[utoipa::path(
    delete,
    path = "/api/memory/{id}",
    params(
        ("id" = i64, Path, description = "Memory ID")
    ),
    responses(
        (status = 200, description = "Memory deleted", body = DeleteMemoryResponse),
        (status = 404, description = "Memory not found"),
        (status = 503, description = "Memory engine unavailable")
    ),
    tag = "Memory"
)]
pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteMemoryResponse>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let memory = engine.delete(id).await.map_err(api_error)?;

    Ok(Json(DeleteMemoryResponse {
        deleted: true,
        memory: memory.into(),
    }))
}

/// List an owner's memories, newest first
#[utoipa::path(
    get,
    path = "/api/memory/owner/{owner_id}",
    params(
        ("owner_id" = i64, Path, description = "Owner ID")
    ),
    responses(
        (status = 200, description = "Memories of the owner", body = Vec<MemoryResponse>),
        (status = 400, description = "Invalid owner id"),
        (status = 503, description = "Memory engine unavailable")
    ),
    tag = "Memory"
)]
pub async fn list_owner_memories(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> Result<Json<Vec<MemoryResponse>>, ApiError> {
    let engine = state
        .memory_engine
        .as_ref()
        .ok_or_else(|| unavailable("Memory engine"))?;

    let memories = engine.list_by_owner(owner_id).await.map_err(api_error)?;

    Ok(Json(memories.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/memory", post(create_memory))
        .route(
            "/api/memory/:id",
            get(get_memory).put(update_memory).delete(delete_memory),
        )
        .route("/api/memory/owner/:owner_id", get(list_owner_memories))
}
