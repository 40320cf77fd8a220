//! Embedding Engine - Hashing, dedup, embedding generation and storage
//!
//! The only writer of the vector index. Identical content (per owner)
//! never triggers a second embedding-provider call: when the content hash
//! already belongs to an embedded memory, its stored vector is reused.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;

use crate::config::{EmbeddingConfig, TimeoutConfig};
use crate::domain::errors::DomainError;
use crate::domain::services::timeout::bounded;
use crate::domain::{ContentHash, ScoredVector, Scope, VectorId, VectorPayload, VectorRecord};
use crate::ports::{DedupKey, EmbeddingProvider, MemoryRepository, VectorFilter, VectorIndex};

/// Largest page a similarity search may return
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Outcome of `generate_and_store`; failures are reported in-band
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResult {
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub vector_id: String,
    pub hash: String,
    pub success: bool,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_memory_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmbeddingResult {
    fn stored(embedding: Vec<f32>, vector_id: &VectorId, hash: &ContentHash) -> Self {
        Self {
            embedding,
            vector_id: vector_id.to_string(),
            hash: hash.to_string(),
            success: true,
            is_duplicate: false,
            existing_memory_id: None,
            error: None,
        }
    }

    fn reused(embedding: Vec<f32>, vector_id: VectorId, hash: &ContentHash, memory_id: i64) -> Self {
        Self {
            embedding,
            vector_id: vector_id.to_string(),
            hash: hash.to_string(),
            success: true,
            is_duplicate: true,
            existing_memory_id: Some(memory_id),
            error: None,
        }
    }

    /// A memory-level duplicate: nothing was embedded at all
    pub fn duplicate_of(memory_id: i64, hash: &ContentHash) -> Self {
        Self::reused(Vec::new(), VectorId::for_memory(memory_id), hash, memory_id)
    }

    pub(crate) fn failed(vector_id: &VectorId, error: &DomainError) -> Self {
        Self {
            embedding: Vec::new(),
            vector_id: vector_id.to_string(),
            hash: String::new(),
            success: false,
            is_duplicate: false,
            existing_memory_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// Options for `search_similar`
#[derive(Debug, Clone, Default)]
pub struct SimilarityQuery {
    pub scope: Scope,
    /// 1..=100, default from config
    pub limit: Option<usize>,
    /// 0.0..=1.0, default from config
    pub score_threshold: Option<f32>,
    /// Extra conditions AND-ed with the scope filter
    pub filter: Option<VectorFilter>,
}

/// Embedding engine
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    memories: Arc<dyn MemoryRepository>,
    config: EmbeddingConfig,
    timeouts: TimeoutConfig,
}

impl EmbeddingEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        memories: Arc<dyn MemoryRepository>,
        config: EmbeddingConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            provider,
            index,
            memories,
            config,
            timeouts,
        }
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    fn validate_text(&self, text: &str) -> Result<(), DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::Validation("Text cannot be empty".to_string()));
        }
        let len = text.chars().count();
        if len > self.config.max_text_chars {
            return Err(DomainError::Validation(format!(
                "Text exceeds maximum length of {} characters ({len})",
                self.config.max_text_chars
            )));
        }
        Ok(())
    }

    fn validate_vector(&self, embedding: &[f32]) -> Result<(), DomainError> {
        if embedding.is_empty() {
            return Err(DomainError::Validation(
                "Embedding must not be empty".to_string(),
            ));
        }
        if embedding.len() != self.config.dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Embed one text via the provider
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.validate_text(text)?;

        let embedding = bounded(
            "embedding provider call",
            self.timeouts.provider(),
            self.provider.embed(text.trim(), self.config.dimension),
        )
        .await?;

        if embedding.len() != self.config.dimension {
            return Err(DomainError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    /// Embed many texts concurrently; each item succeeds or fails on its own
    pub async fn generate_embeddings_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Result<Vec<f32>, DomainError>>, DomainError> {
        if texts.is_empty() {
            return Err(DomainError::Validation(
                "Batch must contain at least one text".to_string(),
            ));
        }
        if texts.len() > self.config.max_batch {
            return Err(DomainError::Validation(format!(
                "Batch size cannot exceed {} texts",
                self.config.max_batch
            )));
        }

        let results = join_all(texts.iter().map(|text| self.generate_embedding(text))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!("🧬 Embedding batch: {}/{} items failed", failed, texts.len());
        }

        Ok(results)
    }

    /// Upsert a vector, stamping `created_at` into its payload
    pub async fn store_embedding(
        &self,
        vector_id: &VectorId,
        embedding: Vec<f32>,
        mut payload: VectorPayload,
    ) -> Result<bool, DomainError> {
        if vector_id.is_empty() {
            return Err(DomainError::Validation(
                "Vector ID must not be empty".to_string(),
            ));
        }
        self.validate_vector(&embedding)?;

        payload.created_at = Some(Utc::now());
        let record = VectorRecord {
            id: vector_id.clone(),
            embedding,
            payload,
        };

        bounded(
            "vector index upsert",
            self.timeouts.index(),
            self.index.upsert(record),
        )
        .await?;

        tracing::debug!("💾 Stored vector {}", vector_id);
        Ok(true)
    }

    /// Hash, dedup, embed, store. Never returns `Err`: failures come back
    /// as `success: false` so batch callers can move on.
    pub async fn generate_and_store(
        &self,
        text: &str,
        vector_id: &VectorId,
        payload: VectorPayload,
        owner_id: Option<i64>,
        skip_dedup: bool,
    ) -> EmbeddingResult {
        match self
            .try_generate_and_store(text, vector_id, payload, owner_id, skip_dedup)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("⚠️  Embedding {} failed: {}", vector_id, e);
                EmbeddingResult::failed(vector_id, &e)
            }
        }
    }

    async fn try_generate_and_store(
        &self,
        text: &str,
        vector_id: &VectorId,
        mut payload: VectorPayload,
        owner_id: Option<i64>,
        skip_dedup: bool,
    ) -> Result<EmbeddingResult, DomainError> {
        let hash = ContentHash::compute(text)?;

        if !skip_dedup {
            if let Some((memory_id, existing_id, embedding)) =
                self.find_reusable(&hash, owner_id).await
            {
                tracing::debug!(
                    "♻️  Reusing vector {} of memory {} for {}",
                    existing_id,
                    memory_id,
                    vector_id
                );
                return Ok(EmbeddingResult::reused(embedding, existing_id, &hash, memory_id));
            }
        }

        let embedding = self.generate_embedding(text).await?;

        payload.content_hash = Some(hash.to_string());
        self.store_embedding(vector_id, embedding.clone(), payload)
            .await?;

        Ok(EmbeddingResult::stored(embedding, vector_id, &hash))
    }

    /// Stored vector of an already-embedded memory with the same content.
    ///
    /// Lookup failures degrade to "no match".
    async fn find_reusable(
        &self,
        hash: &ContentHash,
        owner_id: Option<i64>,
    ) -> Option<(i64, VectorId, Vec<f32>)> {
        let key = DedupKey::for_owner(hash.clone(), owner_id);
        let existing = match bounded(
            "memory dedup lookup",
            self.timeouts.store(),
            self.memories.find_by_dedup_key(&key),
        )
        .await
        {
            Ok(found) => found?,
            Err(e) => {
                tracing::warn!("⚠️  Dedup lookup failed, embedding anyway: {}", e);
                return None;
            }
        };

        if !existing.is_embedded() {
            return None;
        }

        let vector_id = VectorId::for_memory(existing.id);
        match bounded(
            "vector index retrieve",
            self.timeouts.index(),
            self.index.retrieve(&vector_id),
        )
        .await
        {
            Ok(Some(vector)) if vector.len() == self.config.dimension => {
                Some((existing.id, vector_id, vector))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("⚠️  Could not retrieve vector {}: {}", vector_id, e);
                None
            }
        }
    }

    /// Scoped nearest-neighbour search, best match first
    pub async fn search_similar(
        &self,
        query_text: &str,
        query: &SimilarityQuery,
    ) -> Result<Vec<ScoredVector>, DomainError> {
        let limit = query.limit.unwrap_or(self.config.default_limit);
        let score_threshold = query
            .score_threshold
            .unwrap_or(self.config.default_score_threshold);

        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(DomainError::Validation(format!(
                "Limit must be between 1 and {MAX_SEARCH_LIMIT}"
            )));
        }
        if !(0.0..=1.0).contains(&score_threshold) {
            return Err(DomainError::Validation(
                "Score threshold must be between 0 and 1".to_string(),
            ));
        }
        query.scope.require()?;

        let query_vector = self.generate_embedding(query_text).await?;

        let scope_filter = VectorFilter::for_scope(&query.scope);
        let filter = match &query.filter {
            Some(extra) => scope_filter.clone().and(extra.clone()),
            None => scope_filter.clone(),
        };

        let mut hits = bounded(
            "vector index search",
            self.timeouts.index(),
            self.index.search(query_vector, limit, score_threshold, &filter),
        )
        .await?;

        // The index is trusted for ordering, not for tenancy.
        let before = hits.len();
        hits.retain(|hit| scope_filter.matches(&hit.payload.to_json()));
        if hits.len() != before {
            tracing::warn!(
                "🚧 Dropped {} out-of-scope hits returned by the vector index",
                before - hits.len()
            );
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);

        Ok(hits)
    }

    pub async fn delete_embedding(&self, vector_id: &VectorId) -> Result<bool, DomainError> {
        if vector_id.is_empty() {
            return Err(DomainError::Validation(
                "Vector ID must not be empty".to_string(),
            ));
        }
        bounded(
            "vector index delete",
            self.timeouts.index(),
            self.index.delete(std::slice::from_ref(vector_id)),
        )
        .await?;
        Ok(true)
    }

    /// Drop every vector that belongs to a memory
    pub async fn delete_memory_embeddings(&self, memory_id: i64) -> Result<(), DomainError> {
        bounded(
            "vector index delete by memory",
            self.timeouts.index(),
            self.index.delete_by_memory(memory_id),
        )
        .await
    }

    pub async fn update_embedding_payload(
        &self,
        vector_id: &VectorId,
        payload: VectorPayload,
    ) -> Result<bool, DomainError> {
        if vector_id.is_empty() {
            return Err(DomainError::Validation(
                "Vector ID must not be empty".to_string(),
            ));
        }
        bounded(
            "vector index set payload",
            self.timeouts.index(),
            self.index.set_payload(std::slice::from_ref(vector_id), payload),
        )
        .await?;
        Ok(true)
    }

    /// Merge payload keys into every vector of a memory
    pub async fn update_memory_payload(
        &self,
        memory_id: i64,
        payload: VectorPayload,
    ) -> Result<(), DomainError> {
        bounded(
            "vector index set payload by memory",
            self.timeouts.index(),
            self.index.set_payload_by_memory(memory_id, payload),
        )
        .await
    }
}
