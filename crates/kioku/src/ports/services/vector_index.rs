//! Vector Index Port
//!
//! Stores, retrieves and searches vectors with payload metadata. One
//! implementation instance is bound to one collection of fixed dimension.

use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::{ScoredVector, Scope, VectorId, VectorPayload, VectorRecord};

/// Exact-match value for a payload field
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    Integer(i64),
    Keyword(String),
    Boolean(bool),
}

impl MatchValue {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match (self, value) {
            (MatchValue::Integer(expected), v) => v.as_i64() == Some(*expected),
            (MatchValue::Keyword(expected), v) => v.as_str() == Some(expected.as_str()),
            (MatchValue::Boolean(expected), v) => v.as_bool() == Some(*expected),
        }
    }
}

/// `payload[key] == value`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub key: String,
    pub value: MatchValue,
}

impl FieldCondition {
    pub fn new(key: impl Into<String>, value: MatchValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Conjunction of exact-match conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
}

impl VectorFilter {
    /// Every scope key that is set becomes a condition
    pub fn for_scope(scope: &Scope) -> Self {
        let mut must = Vec::new();
        if let Some(owner_id) = scope.owner_id {
            must.push(FieldCondition::new("ownerId", MatchValue::Integer(owner_id)));
        }
        if let Some(agent_id) = scope.agent_id.as_deref().filter(|s| !s.is_empty()) {
            must.push(FieldCondition::new(
                "agentId",
                MatchValue::Keyword(agent_id.to_string()),
            ));
        }
        if let Some(run_id) = scope.run_id.as_deref().filter(|s| !s.is_empty()) {
            must.push(FieldCondition::new(
                "runId",
                MatchValue::Keyword(run_id.to_string()),
            ));
        }
        Self { must }
    }

    pub fn for_memory(memory_id: i64) -> Self {
        Self {
            must: vec![FieldCondition::new(
                "memoryId",
                MatchValue::Integer(memory_id),
            )],
        }
    }

    pub fn and(mut self, other: VectorFilter) -> Self {
        self.must.extend(other.must);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// Evaluate against a JSON payload
    pub fn matches(&self, payload: &serde_json::Map<String, serde_json::Value>) -> bool {
        self.must.iter().all(|cond| {
            payload
                .get(&cond.key)
                .is_some_and(|value| cond.value.matches(value))
        })
    }
}

/// Vector index interface
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace one vector
    async fn upsert(&self, record: VectorRecord) -> Result<(), DomainError>;

    /// Fetch a stored vector; `None` when absent or stored without a vector
    async fn retrieve(&self, id: &VectorId) -> Result<Option<Vec<f32>>, DomainError>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: f32,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredVector>, DomainError>;

    async fn delete(&self, ids: &[VectorId]) -> Result<(), DomainError>;

    /// Remove every vector whose payload `memoryId` equals `memory_id`
    async fn delete_by_memory(&self, memory_id: i64) -> Result<(), DomainError>;

    /// Merge `payload` keys into the stored payload of `ids`
    async fn set_payload(&self, ids: &[VectorId], payload: VectorPayload)
        -> Result<(), DomainError>;

    /// Merge `payload` keys into every vector of a memory
    async fn set_payload_by_memory(
        &self,
        memory_id: i64,
        payload: VectorPayload,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_filter() {
        let filter = VectorFilter::for_scope(&Scope::owner(1).with_run(""));
        assert_eq!(filter.must.len(), 1);

        let serde_json::Value::Object(hit) = json!({ "ownerId": 1, "agentId": "a" }) else {
            unreachable!()
        };
        let serde_json::Value::Object(miss) = json!({ "ownerId": 2 }) else {
            unreachable!()
        };
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn test_missing_key_never_matches() {
        let filter = VectorFilter::for_memory(5);
        assert!(!filter.matches(&serde_json::Map::new()));
    }
}
