//! Memory Engine - Memory lifecycle
//!
//! create → (fact-embedded | embed-skipped) → [updated]* → deleted
//!
//! Rows go to the relational store, vectors go through the embedding
//! engine. A memory is deduplicated on (content hash, owner, agent, run)
//! before any fact extraction happens.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::config::{MemoryEngineConfig, TimeoutConfig};
use crate::domain::errors::DomainError;
use crate::domain::services::embedding_engine::{EmbeddingEngine, EmbeddingResult};
use crate::domain::services::timeout::bounded;
use crate::domain::{
    AddMemories, ChatMessage, ContentHash, ExtractedFact, Memory, MemoryPatch, NewMemory,
    VectorId, VectorPayload, MAX_FACTS_PER_MEMORY,
};
use crate::ports::{DedupKey, FactContext, FactExtractor, MemoryRepository};

const NO_FACTS_NOTE: &str = "No facts extracted; embedding skipped";
const NO_STORABLE_MESSAGES_NOTE: &str = "No storable messages";
const RESUMED_NOTE: &str = "Embedding of an unfinished memory resumed";

/// Result of `MemoryEngine::create`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub memory: Memory,
    pub is_duplicate: bool,
    pub embedding_results: Vec<EmbeddingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of `MemoryEngine::update`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub memory: Memory,
    /// Vectors were dropped and rebuilt for new content
    pub reembedded: bool,
    pub embedding_results: Vec<EmbeddingResult>,
}

/// Result of `MemoryEngine::add_memories`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemoriesOutcome {
    pub memories: Vec<Memory>,
    pub results: Vec<EmbeddingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Output of fact embedding for one memory
struct FactEmbedding {
    memory: Memory,
    results: Vec<EmbeddingResult>,
    note: Option<String>,
}

/// Memory engine
pub struct MemoryEngine {
    memories: Arc<dyn MemoryRepository>,
    embeddings: Arc<EmbeddingEngine>,
    extractor: Arc<dyn FactExtractor>,
    config: MemoryEngineConfig,
    timeouts: TimeoutConfig,
}

impl MemoryEngine {
    pub fn new(
        memories: Arc<dyn MemoryRepository>,
        embeddings: Arc<EmbeddingEngine>,
        extractor: Arc<dyn FactExtractor>,
        config: MemoryEngineConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            memories,
            embeddings,
            extractor,
            config,
            timeouts,
        }
    }

    /// Create a memory, extract its facts and embed each one.
    ///
    /// Identical content in the same scope returns the existing memory with
    /// `is_duplicate = true` and does no extraction or embedding.
    pub async fn create(&self, input: NewMemory) -> Result<CreateOutcome, DomainError> {
        input.validate()?;
        let hash = ContentHash::compute(&input.content)?;
        let key = DedupKey::new(hash.clone(), &input.scope());

        let memory = match self.insert_unique(Memory::new(input, hash), &key).await? {
            Inserted::New(memory) => memory,
            Inserted::Existing(existing) if existing.is_embedded() => {
                return Ok(duplicate_outcome(existing))
            }
            Inserted::Existing(unfinished) => return self.resume(unfinished).await,
        };

        tracing::info!(
            "🧠 Created memory {} (owner: {}, source: {})",
            memory.id,
            memory.owner_id,
            memory.source
        );

        let summary_from_facts = memory.summary.trim().is_empty();
        let embedded = match self.embed_facts(&memory, summary_from_facts).await {
            Ok(embedded) => embedded,
            Err(e) => {
                // Do not leave a row that dedup would match but nothing embedded
                if let Err(cleanup) = self.delete_row(memory.id).await {
                    tracing::warn!(
                        "⚠️  Could not roll back memory {}: {}",
                        memory.id,
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        Ok(CreateOutcome {
            memory: embedded.memory,
            is_duplicate: false,
            embedding_results: embedded.results,
            note: embedded.note,
        })
    }

    /// Partial update. New content is re-hashed and, when
    /// `reembed_on_update` is set, its vectors are rebuilt. Owner and
    /// provenance changes are copied onto the existing vectors.
    pub async fn update(&self, id: i64, patch: MemoryPatch) -> Result<UpdateOutcome, DomainError> {
        let before = self.get(id).await?;
        let mut memory = before.clone();

        let summary_from_facts = patch.summary.is_none();
        let content_changed = memory.apply(patch)?;
        let reembed = content_changed && self.config.reembed_on_update;

        // A failing extractor leaves the row and its vectors untouched
        let facts = if reembed {
            Some(self.extract_facts(&memory).await?)
        } else {
            None
        };
        if reembed {
            memory.embedding_ref = None;
        }

        let saved = bounded(
            "memory store update",
            self.timeouts.store(),
            self.memories.update(&memory),
        )
        .await?;

        let Some(facts) = facts else {
            if content_changed {
                tracing::debug!("📝 Memory {} content changed; vectors kept", id);
            }
            if provenance_changed(&before, &saved) {
                if let Err(e) = self
                    .embeddings
                    .update_memory_payload(id, provenance_payload(&saved))
                    .await
                {
                    self.restore_row(&before).await;
                    return Err(e);
                }
                tracing::debug!("🏷️ Memory {}: vector payloads follow the row", id);
            }
            return Ok(UpdateOutcome {
                memory: saved,
                reembedded: false,
                embedding_results: Vec::new(),
            });
        };

        tracing::info!("🔁 Re-embedding memory {} after content change", id);
        self.embeddings.delete_memory_embeddings(id).await?;
        let embedded = self
            .embed_extracted(&saved, facts, summary_from_facts)
            .await?;

        Ok(UpdateOutcome {
            memory: embedded.memory,
            reembedded: true,
            embedding_results: embedded.results,
        })
    }

    /// Delete a memory and every vector that references it
    pub async fn delete(&self, id: i64) -> Result<Memory, DomainError> {
        let memory = self.get(id).await?;

        // Vectors before the row, never orphaned searchable vectors
        self.embeddings.delete_memory_embeddings(id).await?;

        if !self.delete_row(id).await? {
            return Err(DomainError::not_found("Memory", id));
        }

        tracing::info!("🗑️  Deleted memory {} and its vectors", id);
        Ok(memory)
    }

    pub async fn get(&self, id: i64) -> Result<Memory, DomainError> {
        bounded(
            "memory store read",
            self.timeouts.store(),
            self.memories.find_by_id(id),
        )
        .await?
        .ok_or_else(|| DomainError::not_found("Memory", id))
    }

    /// All memories of an owner, newest first
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Memory>, DomainError> {
        if owner_id <= 0 {
            return Err(DomainError::Validation(
                "owner_id must be a positive id".to_string(),
            ));
        }
        bounded(
            "memory store list",
            self.timeouts.store(),
            self.memories.find_by_owner(owner_id),
        )
        .await
    }

    /// Store a batch of role-tagged messages.
    ///
    /// With `infer` each message goes through `create`; without it each
    /// message is embedded as-is under `memory_{id}`.
    pub async fn add_memories(&self, batch: AddMemories) -> Result<AddMemoriesOutcome, DomainError> {
        let owner_id = batch.owner_id.ok_or_else(|| {
            DomainError::Validation("owner_id is required to store memories".to_string())
        })?;

        let messages: Vec<&ChatMessage> =
            batch.messages.iter().filter(|m| m.is_storable()).collect();
        if messages.is_empty() {
            return Ok(AddMemoriesOutcome {
                note: Some(NO_STORABLE_MESSAGES_NOTE.to_string()),
                ..Default::default()
            });
        }

        let mut outcome = AddMemoriesOutcome::default();
        for message in messages {
            let input = message_input(&batch, owner_id, message);
            if batch.infer {
                let created = self.create(input).await?;
                outcome.memories.push(created.memory);
                outcome.results.extend(created.embedding_results);
            } else {
                let (memory, result) = self.store_raw(input, &batch).await?;
                outcome.memories.push(memory);
                outcome.results.push(result);
            }
        }

        tracing::info!(
            "📥 Stored {} messages for owner {} (infer: {})",
            outcome.memories.len(),
            owner_id,
            batch.infer
        );
        Ok(outcome)
    }

    /// Embed one message verbatim, skipping fact extraction
    async fn store_raw(
        &self,
        input: NewMemory,
        batch: &AddMemories,
    ) -> Result<(Memory, EmbeddingResult), DomainError> {
        input.validate()?;
        let hash = ContentHash::compute(&input.content)?;
        let key = DedupKey::new(hash.clone(), &input.scope());

        let memory = match self.insert_unique(Memory::new(input, hash.clone()), &key).await? {
            Inserted::New(memory) => memory,
            Inserted::Existing(existing) if existing.is_embedded() => {
                let result = EmbeddingResult::duplicate_of(existing.id, &hash);
                return Ok((existing, result));
            }
            Inserted::Existing(unfinished) => {
                tracing::info!("🔁 Resuming embedding of memory {}", unfinished.id);
                unfinished
            }
        };

        let mut payload = VectorPayload::scoped(&memory.scope());
        payload.memory_id = Some(memory.id);
        payload.role = memory.role;
        payload.source = Some(memory.source.clone());
        payload.source_id = Some(memory.source_id.clone());
        payload.timestamp = Some(memory.timestamp);
        payload.data = Some(memory.content.clone());
        payload.metadata = batch.metadata.clone();

        let result = self
            .embeddings
            .generate_and_store(
                &memory.content,
                &VectorId::for_memory(memory.id),
                payload,
                Some(memory.owner_id),
                false,
            )
            .await;

        let memory = self.mark_embedded(memory.id, None).await?;
        Ok((memory, result))
    }

    /// Extract facts from a stored memory and embed them concurrently
    async fn embed_facts(
        &self,
        memory: &Memory,
        summary_from_facts: bool,
    ) -> Result<FactEmbedding, DomainError> {
        let facts = self.extract_facts(memory).await?;
        self.embed_extracted(memory, facts, summary_from_facts).await
    }

    async fn extract_facts(&self, memory: &Memory) -> Result<Vec<ExtractedFact>, DomainError> {
        let context = FactContext {
            title: Some(memory.title.clone()).filter(|t| !t.trim().is_empty()),
            source: Some(memory.source.clone()),
            timestamp: Some(memory.timestamp),
        };

        let facts = bounded(
            "fact extraction",
            self.timeouts.provider(),
            self.extractor.extract(&memory.content, &context),
        )
        .await?;
        Ok(accept_facts(memory.id, facts))
    }

    async fn embed_extracted(
        &self,
        memory: &Memory,
        facts: Vec<ExtractedFact>,
        summary_from_facts: bool,
    ) -> Result<FactEmbedding, DomainError> {
        if facts.is_empty() {
            tracing::info!("🫥 Memory {}: no facts extracted, embedding skipped", memory.id);
            let memory = self.mark_embedded(memory.id, None).await?;
            return Ok(FactEmbedding {
                memory,
                results: Vec::new(),
                note: Some(NO_FACTS_NOTE.to_string()),
            });
        }

        let results = join_all(facts.iter().enumerate().map(|(index, fact)| async move {
            let vector_id = VectorId::for_fact(memory.id, index);
            self.embeddings
                .generate_and_store(
                    &fact.fact,
                    &vector_id,
                    fact_payload(memory, index, fact),
                    Some(memory.owner_id),
                    false,
                )
                .await
        }))
        .await;

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            tracing::warn!(
                "⚠️  Memory {}: {}/{} fact embeddings failed",
                memory.id,
                failed,
                results.len()
            );
        } else {
            tracing::debug!("🧬 Memory {}: embedded {} facts", memory.id, results.len());
        }

        let summary = summary_from_facts.then(|| facts[0].fact.as_str());
        let memory = self.mark_embedded(memory.id, summary).await?;

        Ok(FactEmbedding {
            memory,
            results,
            note: None,
        })
    }

    /// Finish a row whose embedding never completed: drop whatever vectors
    /// it has and run fact embedding again.
    async fn resume(&self, unfinished: Memory) -> Result<CreateOutcome, DomainError> {
        tracing::info!("🔁 Resuming embedding of memory {}", unfinished.id);
        self.embeddings.delete_memory_embeddings(unfinished.id).await?;

        let summary_from_facts = unfinished.summary.trim().is_empty();
        let embedded = self.embed_facts(&unfinished, summary_from_facts).await?;

        Ok(CreateOutcome {
            memory: embedded.memory,
            is_duplicate: true,
            embedding_results: embedded.results,
            note: Some(RESUMED_NOTE.to_string()),
        })
    }

    async fn restore_row(&self, previous: &Memory) {
        let restored = bounded(
            "memory store update",
            self.timeouts.store(),
            self.memories.update(previous),
        )
        .await;
        if let Err(e) = restored {
            tracing::warn!("⚠️  Could not restore memory {}: {}", previous.id, e);
        }
    }

    /// Insert unless the dedup key already has a row. A unique-constraint
    /// conflict means a concurrent ingest won; its row is returned instead.
    async fn insert_unique(&self, memory: Memory, key: &DedupKey) -> Result<Inserted, DomainError> {
        if let Some(existing) = self.lookup(key).await {
            tracing::debug!("♻️  Duplicate content, reusing memory {}", existing.id);
            return Ok(Inserted::Existing(existing));
        }

        match bounded(
            "memory store insert",
            self.timeouts.store(),
            self.memories.insert(&memory),
        )
        .await
        {
            Ok(saved) => Ok(Inserted::New(saved)),
            Err(DomainError::Conflict(reason)) => {
                tracing::info!("🔀 Concurrent insert of the same content: {}", reason);
                match self.lookup(key).await {
                    Some(existing) => Ok(Inserted::Existing(existing)),
                    None => Err(DomainError::Conflict(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Dedup lookup; failures count as "no match"
    async fn lookup(&self, key: &DedupKey) -> Option<Memory> {
        match bounded(
            "memory dedup lookup",
            self.timeouts.store(),
            self.memories.find_by_dedup_key(key),
        )
        .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("⚠️  Dedup lookup failed, treating as new: {}", e);
                None
            }
        }
    }

    async fn mark_embedded(&self, id: i64, summary: Option<&str>) -> Result<Memory, DomainError> {
        bounded(
            "memory store mark embedded",
            self.timeouts.store(),
            self.memories.mark_embedded(id, id, summary),
        )
        .await
    }

    async fn delete_row(&self, id: i64) -> Result<bool, DomainError> {
        bounded(
            "memory store delete",
            self.timeouts.store(),
            self.memories.delete(id),
        )
        .await
    }
}

enum Inserted {
    New(Memory),
    Existing(Memory),
}

fn duplicate_outcome(existing: Memory) -> CreateOutcome {
    let result = EmbeddingResult::duplicate_of(existing.id, &existing.content_hash);
    CreateOutcome {
        memory: existing,
        is_duplicate: true,
        embedding_results: vec![result],
        note: None,
    }
}

/// Drop invalid and repeated facts, cap the list
fn accept_facts(memory_id: i64, facts: Vec<ExtractedFact>) -> Vec<ExtractedFact> {
    let mut seen = std::collections::HashSet::new();
    let mut accepted = Vec::with_capacity(facts.len().min(MAX_FACTS_PER_MEMORY));
    for fact in facts {
        if let Some(reason) = fact.rejection() {
            tracing::warn!("🚮 Memory {}: dropped fact ({})", memory_id, reason);
            continue;
        }
        if !seen.insert(crate::domain::normalize_text(&fact.fact)) {
            continue;
        }
        accepted.push(fact);
        if accepted.len() == MAX_FACTS_PER_MEMORY {
            break;
        }
    }
    accepted
}

fn fact_payload(memory: &Memory, index: usize, fact: &ExtractedFact) -> VectorPayload {
    let mut payload = VectorPayload::scoped(&memory.scope());
    payload.memory_id = Some(memory.id);
    payload.role = memory.role;
    payload.source = Some(memory.source.clone());
    payload.source_id = Some(memory.source_id.clone());
    payload.timestamp = Some(memory.timestamp);
    payload.fact_index = Some(index);
    payload.fact = Some(fact.fact.clone());
    payload.importance = Some(fact.importance.unwrap_or(memory.importance));
    payload.confidence = Some(fact.confidence.unwrap_or(memory.confidence));
    if !fact.tags.is_empty() {
        payload.metadata = Some(serde_json::json!({ "tags": fact.tags }));
    }
    payload
}

fn provenance_changed(before: &Memory, after: &Memory) -> bool {
    before.owner_id != after.owner_id
        || before.source != after.source
        || before.source_id != after.source_id
        || before.timestamp != after.timestamp
}

/// Scope and provenance keys, merged into existing vector payloads
fn provenance_payload(memory: &Memory) -> VectorPayload {
    let mut payload = VectorPayload::scoped(&memory.scope());
    payload.source = Some(memory.source.clone());
    payload.source_id = Some(memory.source_id.clone());
    payload.timestamp = Some(memory.timestamp);
    payload
}

/// One message of a batch as a `NewMemory`, batch attributes merged in
fn message_input(batch: &AddMemories, owner_id: i64, message: &ChatMessage) -> NewMemory {
    let mut attribute = match &batch.attribute {
        Some(serde_json::Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
        None => serde_json::Map::new(),
    };
    if let Some(agent_id) = &batch.agent_id {
        attribute.insert("agentId".to_string(), agent_id.clone().into());
    }
    if let Some(run_id) = &batch.run_id {
        attribute.insert("runId".to_string(), run_id.clone().into());
    }
    attribute.insert("role".to_string(), message.role.to_string().into());
    if let Some(metadata) = &batch.metadata {
        attribute.insert("metadata".to_string(), metadata.clone());
    }

    NewMemory {
        owner_id,
        agent_id: batch.agent_id.clone(),
        run_id: batch.run_id.clone(),
        role: Some(message.role),
        source: batch.source.clone(),
        source_id: batch.source_id.clone(),
        timestamp: batch.timestamp,
        content: message.content.clone(),
        content_url: batch.content_url.clone(),
        title: batch.title.clone(),
        origin: batch.origin.clone(),
        tags: batch.tags.clone(),
        category: batch.category.clone(),
        attribute: Some(serde_json::Value::Object(attribute)),
        summary: batch.summary.clone(),
        memory_type: batch.memory_type.clone(),
        importance: batch.importance,
        confidence: batch.confidence,
    }
}
