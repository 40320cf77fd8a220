//! Memory DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kioku::domain::{ChatMessage, MessageRole};
use kioku::{
    AddMemories, AddMemoriesOutcome, CreateOutcome, EmbeddingResult, Memory, MemoryPatch,
    NewMemory, UpdateOutcome,
};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::System => MessageRole::System,
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::System => Role::System,
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

/// Stored memory
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub id: i64,
    pub owner_id: i64,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    pub role: Option<Role>,
    pub source: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub content_url: String,
    pub title: String,
    pub origin: String,
    pub tags: Vec<String>,
    pub category: Vec<String>,
    #[schema(value_type = Object)]
    pub attribute: serde_json::Value,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub importance: f32,
    pub confidence: f32,
    pub content_hash: String,
    pub embedding_ref: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Memory> for MemoryResponse {
    fn from(m: Memory) -> Self {
        Self {
            id: m.id,
            owner_id: m.owner_id,
            agent_id: m.agent_id,
            run_id: m.run_id,
            role: m.role.map(Into::into),
            source: m.source,
            source_id: m.source_id,
            timestamp: m.timestamp,
            content: m.content,
            content_url: m.content_url,
            title: m.title,
            origin: m.origin,
            tags: m.tags,
            category: m.category,
            attribute: m.attribute,
            summary: m.summary,
            memory_type: m.memory_type,
            importance: m.importance,
            confidence: m.confidence,
            content_hash: m.content_hash.to_string(),
            embedding_ref: m.embedding_ref,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Outcome of embedding one text
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResultResponse {
    pub vector_id: String,
    pub hash: String,
    pub success: bool,
    pub is_duplicate: bool,
    pub existing_memory_id: Option<i64>,
    pub error: Option<String>,
}

impl From<EmbeddingResult> for EmbeddingResultResponse {
    fn from(r: EmbeddingResult) -> Self {
        Self {
            vector_id: r.vector_id,
            hash: r.hash,
            success: r.success,
            is_duplicate: r.is_duplicate,
            existing_memory_id: r.existing_memory_id,
            error: r.error,
        }
    }
}

fn results(results: Vec<EmbeddingResult>) -> Vec<EmbeddingResultResponse> {
    results.into_iter().map(Into::into).collect()
}

// ============================================
// Create / Update
// ============================================

/// Create memory request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryRequest {
    pub owner_id: i64,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    pub role: Option<Role>,
    pub source: String,
    pub source_id: String,
    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,
    pub content: String,
    #[serde(default)]
    pub content_url: String,
    pub title: Option<String>,
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub attribute: Option<serde_json::Value>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub importance: Option<f32>,
    pub confidence: Option<f32>,
}

impl From<CreateMemoryRequest> for NewMemory {
    fn from(r: CreateMemoryRequest) -> Self {
        let mut input = NewMemory::new(r.owner_id, r.source, r.source_id, r.content);
        input.agent_id = r.agent_id;
        input.run_id = r.run_id;
        input.role = r.role.map(Into::into);
        if let Some(timestamp) = r.timestamp {
            input.timestamp = timestamp;
        }
        input.content_url = r.content_url;
        input.title = r.title;
        input.origin = r.origin;
        input.tags = r.tags;
        input.category = r.category;
        input.attribute = r.attribute;
        input.summary = r.summary;
        input.memory_type = r.memory_type;
        input.importance = r.importance;
        input.confidence = r.confidence;
        input
    }
}

/// Create memory response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryResponse {
    pub memory: MemoryResponse,
    /// True when identical content already existed in this scope
    pub is_duplicate: bool,
    pub embedding_results: Vec<EmbeddingResultResponse>,
    pub note: Option<String>,
}

impl From<CreateOutcome> for CreateMemoryResponse {
    fn from(o: CreateOutcome) -> Self {
        Self {
            memory: o.memory.into(),
            is_duplicate: o.is_duplicate,
            embedding_results: results(o.embedding_results),
            note: o.note,
        }
    }
}

/// Update memory request; absent fields are left untouched
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemoryRequest {
    pub owner_id: Option<i64>,
    pub source: Option<String>,
    pub source_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub content_url: Option<String>,
    pub title: Option<String>,
    pub origin: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub attribute: Option<serde_json::Value>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub importance: Option<f32>,
    pub confidence: Option<f32>,
}

impl From<UpdateMemoryRequest> for MemoryPatch {
    fn from(r: UpdateMemoryRequest) -> Self {
        Self {
            owner_id: r.owner_id,
            source: r.source,
            source_id: r.source_id,
            timestamp: r.timestamp,
            content: r.content,
            content_url: r.content_url,
            title: r.title,
            origin: r.origin,
            tags: r.tags,
            category: r.category,
            attribute: r.attribute,
            summary: r.summary,
            memory_type: r.memory_type,
            importance: r.importance,
            confidence: r.confidence,
        }
    }
}

/// Update memory response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemoryResponse {
    pub memory: MemoryResponse,
    /// True when changed content was re-embedded
    pub reembedded: bool,
    pub embedding_results: Vec<EmbeddingResultResponse>,
}

impl From<UpdateOutcome> for UpdateMemoryResponse {
    fn from(o: UpdateOutcome) -> Self {
        Self {
            memory: o.memory.into(),
            reembedded: o.reembedded,
            embedding_results: results(o.embedding_results),
        }
    }
}

/// Delete memory response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMemoryResponse {
    pub deleted: bool,
    pub memory: MemoryResponse,
}

// ============================================
// Batch ingestion
// ============================================

/// One message of a conversation batch
#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageRequest {
    pub role: Role,
    pub content: String,
}

/// Add memories request (conversation batch)
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemoriesRequest {
    pub messages: Vec<MessageRequest>,
    pub owner_id: Option<i64>,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    pub source: String,
    pub source_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_url: String,
    pub title: Option<String>,
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub attribute: Option<serde_json::Value>,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub importance: Option<f32>,
    pub confidence: Option<f32>,
    /// Extract facts per message (default) or embed messages verbatim
    pub infer: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl From<AddMemoriesRequest> for AddMemories {
    fn from(r: AddMemoriesRequest) -> Self {
        Self {
            messages: r
                .messages
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role.into(),
                    content: m.content,
                })
                .collect(),
            owner_id: r.owner_id,
            agent_id: r.agent_id,
            run_id: r.run_id,
            source: r.source,
            source_id: r.source_id,
            timestamp: r.timestamp.unwrap_or_else(Utc::now),
            content_url: r.content_url,
            title: r.title,
            origin: r.origin,
            tags: r.tags,
            category: r.category,
            attribute: r.attribute,
            summary: r.summary,
            memory_type: r.memory_type,
            importance: r.importance,
            confidence: r.confidence,
            infer: r.infer.unwrap_or(true),
            metadata: r.metadata,
        }
    }
}

/// Add memories response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemoriesResponse {
    pub memories: Vec<MemoryResponse>,
    pub results: Vec<EmbeddingResultResponse>,
    pub note: Option<String>,
}

impl From<AddMemoriesOutcome> for AddMemoriesResponse {
    fn from(o: AddMemoriesOutcome) -> Self {
        Self {
            memories: o.memories.into_iter().map(Into::into).collect(),
            results: results(o.results),
            note: o.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_into_new_memory() {
        let request: CreateMemoryRequest = serde_json::from_value(serde_json::json!({
            "ownerId": 1,
            "agentId": "mail-bot",
            "role": "assistant",
            "source": "gmail",
            "sourceId": "msg-1",
            "content": "Pay $50 to Acme Corp",
            "type": "email",
            "tags": ["finance"]
        }))
        .unwrap();

        let input = NewMemory::from(request);
        assert_eq!(input.owner_id, 1);
        assert_eq!(input.agent_id.as_deref(), Some("mail-bot"));
        assert_eq!(input.role, Some(MessageRole::Assistant));
        assert_eq!(input.memory_type.as_deref(), Some("email"));
        assert_eq!(input.tags, vec!["finance"]);
    }

    #[test]
    fn test_add_memories_defaults_infer() {
        let request: AddMemoriesRequest = serde_json::from_value(serde_json::json!({
            "messages": [
                { "role": "system", "content": "be helpful" },
                { "role": "user", "content": "I moved to Osaka" }
            ],
            "ownerId": 3,
            "source": "chat",
            "sourceId": "conv-9"
        }))
        .unwrap();

        let batch = AddMemories::from(request);
        assert!(batch.infer);
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.messages[0].role, MessageRole::System);
    }

    #[test]
    fn test_memory_response_uses_wire_names() {
        let input = NewMemory::new(1, "gmail", "msg-1", "hello world");
        let hash = kioku::ContentHash::compute(&input.content).unwrap();
        let body = serde_json::to_value(MemoryResponse::from(Memory::new(input, hash))).unwrap();

        assert_eq!(body["ownerId"], 1);
        assert_eq!(body["type"], "text");
        assert_eq!(body["contentHash"].as_str().map(str::len), Some(64));
    }
}
