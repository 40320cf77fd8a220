//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa.

use utoipa::OpenApi;

use crate::models::{
    AddMemoriesRequest,
    AddMemoriesResponse,
    AskMemoriesRequest,
    AskResponse,
    // Memory models
    CreateMemoryRequest,
    CreateMemoryResponse,
    DeleteMemoryResponse,
    EmbeddingResultResponse,
    MemoryResponse,
    MessageRequest,
    // Retrieval models
    RerankRequest,
    Role,
    SearchHitResponse,
    SearchMemoriesRequest,
    SearchMemoriesResponse,
    UpdateMemoryRequest,
    UpdateMemoryResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Memory endpoints
        super::memory::create_memory,
        super::memory::get_memory,
        super::memory::update_memory,
        super::memory::delete_memory,
        super::memory::list_owner_memories,
        super::memories::add_memories,
        // Retrieval endpoints
        super::memories::search_memories,
        super::memories::ask_memories,
    ),
    info(
        title = "Kioku API",
        version = "0.2.0",
        description = "記憶 (Kioku) - Content-addressed memory and retrieval API\n\nDeduplicates by content hash, embeds extracted facts, and answers questions from scoped memories.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Memory", description = "Memory (記憶) - Ingestion and lifecycle"),
        (name = "Retrieval", description = "Retrieval - Similarity search, rerank and answers"),
    ),
    components(
        schemas(
            // Memory
            Role,
            MemoryResponse,
            EmbeddingResultResponse,
            CreateMemoryRequest,
            CreateMemoryResponse,
            UpdateMemoryRequest,
            UpdateMemoryResponse,
            DeleteMemoryResponse,
            MessageRequest,
            AddMemoriesRequest,
            AddMemoriesResponse,
            // Retrieval
            RerankRequest,
            SearchMemoriesRequest,
            SearchHitResponse,
            SearchMemoriesResponse,
            AskMemoriesRequest,
            AskResponse,
        )
    ),
)]
pub struct ApiDoc;
