//! Vector records and search hits
//!
//! Vectors are owned by the embedding engine; the memory engine never
//! writes them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{MessageRole, Scope, VectorId};

/// Metadata stored next to every vector.
///
/// Carries the scope keys used for filtering plus enough provenance to
/// render a readable snippet without reading the memory row back. Keys that
/// are not modelled here survive in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact: Option<String>,
    /// Raw text for vectors embedded without fact extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VectorPayload {
    /// Payload pre-filled with the scope keys
    pub fn scoped(scope: &Scope) -> Self {
        Self {
            owner_id: scope.owner_id,
            agent_id: scope.agent_id.clone(),
            run_id: scope.run_id.clone(),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    pub fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Self {
        serde_json::from_value(serde_json::Value::Object(map.clone())).unwrap_or_else(|_| Self {
            extra: map,
            ..Default::default()
        })
    }
}

/// One entry in the vector index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: VectorId,
    pub embedding: Vec<f32>,
    pub payload: VectorPayload,
}

/// Raw nearest-neighbour match as returned by the index
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVector {
    pub id: String,
    /// Cosine similarity
    pub score: f32,
    pub payload: VectorPayload,
}

/// Similarity search result with a display snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub payload: VectorPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_keys_are_camel_case() {
        let mut payload = VectorPayload::scoped(&Scope::owner(3).with_agent("mail-bot"));
        payload.memory_id = Some(9);
        payload.fact_index = Some(0);

        let map = payload.to_json();
        assert_eq!(map.get("ownerId"), Some(&serde_json::json!(3)));
        assert_eq!(map.get("agentId"), Some(&serde_json::json!("mail-bot")));
        assert_eq!(map.get("memoryId"), Some(&serde_json::json!(9)));
        assert_eq!(map.get("factIndex"), Some(&serde_json::json!(0)));
        assert!(!map.contains_key("runId"));
    }

    #[test]
    fn test_unknown_keys_survive() {
        let json = serde_json::json!({ "ownerId": 1, "threadId": "t-1" });
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        let payload = VectorPayload::from_json(map);
        assert_eq!(payload.owner_id, Some(1));
        assert_eq!(payload.extra.get("threadId"), Some(&serde_json::json!("t-1")));
    }

    #[test]
    fn test_malformed_payload_is_kept_as_extra() {
        let json = serde_json::json!({ "ownerId": "not-a-number", "text": "hi" });
        let serde_json::Value::Object(map) = json else {
            unreachable!()
        };
        let payload = VectorPayload::from_json(map);
        assert_eq!(payload.owner_id, None);
        assert_eq!(payload.extra.get("text"), Some(&serde_json::json!("hi")));
    }
}
