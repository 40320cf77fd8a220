use axum::{routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod adapters;
mod config;
mod models;
mod routes;

use adapters::{OpenAiCompletion, OpenAiEmbedding, PgMemoryRepository, QdrantVectorIndex};
use config::ServerSettings;
use kioku::{
    CompletionProvider, EmbeddingEngine, LlmFactExtractor, MemoryEngine, MemoryRepository,
    RetrievalPipeline, VectorIndex,
};

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub memory_engine: Option<Arc<MemoryEngine>>,
    pub retrieval: Option<Arc<RetrievalPipeline>>,
}

#[cfg(test)]
impl AppState {
    /// No Qdrant or OpenAI configured
    pub fn unconfigured() -> Self {
        Self {
            memory_engine: None,
            retrieval: None,
        }
    }
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
}

async fn health_check() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Kioku API is running - every memory stored once".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Wire adapters into engines. Without Qdrant and OpenAI the API still
/// serves /health and answers memory routes with 503.
async fn build_state(pool: PgPool, settings: &ServerSettings) -> AppState {
    let engine_config = &settings.engine;
    let timeouts = engine_config.timeouts.clone();

    let index: Option<Arc<dyn VectorIndex>> = match settings.qdrant_url.as_deref() {
        Some(url) => match QdrantVectorIndex::new(
            url,
            settings.qdrant_api_key.clone(),
            settings.qdrant_collection.clone(),
            engine_config.embedding.dimension,
            timeouts.index(),
        )
        .await
        {
            Ok(index) => Some(Arc::new(index)),
            Err(e) => {
                tracing::warn!("⚠️  Failed to connect to Qdrant: {}", e);
                None
            }
        },
        None => {
            tracing::warn!("⚠️  No QDRANT_URL set - vector index disabled");
            None
        }
    };

    let Some(api_key) = settings.openai_api_key.clone() else {
        tracing::warn!("⚠️  No OPENAI_API_KEY set - embedding and completion disabled");
        return AppState {
            memory_engine: None,
            retrieval: None,
        };
    };
    let Some(index) = index else {
        return AppState {
            memory_engine: None,
            retrieval: None,
        };
    };

    let providers = OpenAiEmbedding::new(
        api_key.clone(),
        settings.embedding_model.clone(),
        timeouts.provider(),
    )
    .and_then(|embedder| {
        let completion =
            OpenAiCompletion::new(api_key, engine_config.answer.model.clone(), timeouts.provider())?;
        Ok((embedder, completion))
    });
    let (embedder, completion) = match providers {
        Ok(providers) => providers,
        Err(e) => {
            tracing::warn!("⚠️  Failed to initialize OpenAI providers: {}", e);
            return AppState {
                memory_engine: None,
                retrieval: None,
            };
        }
    };
    let embedder = Arc::new(embedder);
    let completion: Arc<dyn CompletionProvider> = Arc::new(completion);
    tracing::info!("🧬 OpenAI providers initialized ({})", settings.embedding_model);

    let repository: Arc<dyn MemoryRepository> = Arc::new(PgMemoryRepository::new(pool));

    let embeddings = Arc::new(EmbeddingEngine::new(
        embedder,
        index,
        repository.clone(),
        engine_config.embedding.clone(),
        timeouts.clone(),
    ));
    let extractor = Arc::new(LlmFactExtractor::new(
        completion.clone(),
        engine_config.facts.clone(),
    ));

    let memory_engine = MemoryEngine::new(
        repository,
        embeddings.clone(),
        extractor,
        engine_config.memory.clone(),
        timeouts.clone(),
    );
    let retrieval = RetrievalPipeline::new(
        embeddings,
        completion,
        engine_config.rerank.clone(),
        engine_config.answer.clone(),
        timeouts,
    );

    tracing::info!(
        "🧠 Memory engine ready (rerank {})",
        if engine_config.rerank.enabled { "on" } else { "off" }
    );

    AppState {
        memory_engine: Some(Arc::new(memory_engine)),
        retrieval: Some(Arc::new(retrieval)),
    }
}

fn app(state: AppState) -> Router {
    // OpenAPI documentation
    let openapi = routes::swagger::ApiDoc::openapi();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(routes::memory::router())
        .merge(routes::memories::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    tracing::info!("🧠 Kioku API initializing...");

    // Local runs may keep secrets in .env instead of Secrets.toml
    dotenvy::dotenv().ok();
    let settings = ServerSettings::from_lookup(|key| {
        secrets.get(key).or_else(|| std::env::var(key).ok())
    });

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("✅ Database migrations completed");

    let state = build_state(pool, &settings).await;
    let router = app(state);

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!("✅ Kioku API ready");

    Ok(router.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_without_backends() {
        let response = app(AppState::unconfigured())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_memory_routes_unavailable_without_backends() {
        let response = app(AppState::unconfigured())
            .oneshot(Request::get("/api/memory/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
