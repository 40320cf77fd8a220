//! Memory - One ingested, durable item
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::value_objects::{ContentHash, MessageRole, Scope};

/// Default `type` of a memory when the caller does not give one
pub const DEFAULT_MEMORY_TYPE: &str = "text";

/// Memory - A piece of ingested content (email, event, tweet, fact...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Store-assigned id (0 until inserted)
    pub id: i64,
    pub owner_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    /// Source tag, e.g. "gmail"
    pub source: String,
    /// Identifier in the origin system
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub content_url: String,
    pub title: String,
    pub origin: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    /// Freeform attributes
    #[serde(default)]
    pub attribute: serde_json::Value,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    /// Importance score (0.0 - 1.0)
    pub importance: f32,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    pub content_hash: ContentHash,
    /// Points back to `id` once embedding work is done; `None` before that
    #[serde(default)]
    pub embedding_ref: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// Build an unsaved memory from caller input. The store assigns `id`.
    pub fn new(input: NewMemory, content_hash: ContentHash) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            owner_id: input.owner_id,
            agent_id: input.agent_id,
            run_id: input.run_id,
            role: input.role,
            source: input.source,
            source_id: input.source_id,
            timestamp: input.timestamp,
            content: input.content,
            content_url: input.content_url,
            title: input.title.unwrap_or_default(),
            origin: input.origin.unwrap_or_default(),
            tags: normalize_set(input.tags),
            category: normalize_set(input.category),
            attribute: input
                .attribute
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            summary: input.summary.unwrap_or_default(),
            memory_type: input
                .memory_type
                .unwrap_or_else(|| DEFAULT_MEMORY_TYPE.to_string()),
            importance: input.importance.unwrap_or(0.0),
            confidence: input.confidence.unwrap_or(0.0),
            content_hash,
            embedding_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope {
            owner_id: Some(self.owner_id),
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding_ref.is_some()
    }

    /// Apply a partial update in place.
    ///
    /// Returns `true` when the content changed (and the hash was recomputed).
    pub fn apply(&mut self, patch: MemoryPatch) -> Result<bool, DomainError> {
        patch.validate()?;

        let mut content_changed = false;
        if let Some(content) = patch.content {
            let hash = ContentHash::compute(&content)?;
            content_changed = hash != self.content_hash;
            self.content = content;
            self.content_hash = hash;
        }

        if let Some(v) = patch.owner_id {
            self.owner_id = v;
        }
        if let Some(v) = patch.source {
            self.source = v;
        }
        if let Some(v) = patch.source_id {
            self.source_id = v;
        }
        if let Some(v) = patch.timestamp {
            self.timestamp = v;
        }
        if let Some(v) = patch.content_url {
            self.content_url = v;
        }
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.origin {
            self.origin = v;
        }
        if let Some(v) = patch.tags {
            self.tags = normalize_set(v);
        }
        if let Some(v) = patch.category {
            self.category = normalize_set(v);
        }
        if let Some(v) = patch.attribute {
            self.attribute = v;
        }
        if let Some(v) = patch.summary {
            self.summary = v;
        }
        if let Some(v) = patch.memory_type {
            self.memory_type = v;
        }
        if let Some(v) = patch.importance {
            self.importance = v;
        }
        if let Some(v) = patch.confidence {
            self.confidence = v;
        }
        self.updated_at = Utc::now();

        Ok(content_changed)
    }
}

/// Input for creating a memory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemory {
    pub owner_id: i64,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub role: Option<MessageRole>,
    pub source: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub attribute: Option<serde_json::Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl NewMemory {
    /// Minimal input; everything else defaults
    pub fn new(
        owner_id: i64,
        source: impl Into<String>,
        source_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            agent_id: None,
            run_id: None,
            role: None,
            source: source.into(),
            source_id: source_id.into(),
            timestamp: Utc::now(),
            content: content.into(),
            content_url: String::new(),
            title: None,
            origin: None,
            tags: Vec::new(),
            category: Vec::new(),
            attribute: None,
            summary: None,
            memory_type: None,
            importance: None,
            confidence: None,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope {
            owner_id: Some(self.owner_id),
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.content.trim().is_empty() {
            return Err(DomainError::EmptyInput("content must not be empty".to_string()));
        }
        if self.source.trim().is_empty() {
            return Err(DomainError::Validation("source must not be empty".to_string()));
        }
        validate_unit("importance", self.importance)?;
        validate_unit("confidence", self.confidence)?;
        Ok(())
    }
}

/// Partial update of a memory; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPatch {
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub attribute: Option<serde_json::Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl MemoryPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_unit("importance", self.importance)?;
        validate_unit("confidence", self.confidence)?;
        Ok(())
    }
}

fn validate_unit(name: &str, value: Option<f32>) -> Result<(), DomainError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(DomainError::Validation(format!(
            "{name} must be between 0 and 1, got {v}"
        ))),
        _ => Ok(()),
    }
}

/// Tags and categories are unordered sets
fn normalize_set(values: Vec<String>) -> Vec<String> {
    let mut values: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        let input = NewMemory::new(1, "gmail", "msg-1", "Pay $50 to Acme Corp");
        let hash = ContentHash::compute(&input.content).unwrap();
        Memory::new(input, hash)
    }

    #[test]
    fn test_new_applies_defaults() {
        let memory = sample();
        assert_eq!(memory.id, 0);
        assert_eq!(memory.memory_type, DEFAULT_MEMORY_TYPE);
        assert_eq!(memory.importance, 0.0);
        assert!(memory.attribute.is_object());
        assert!(!memory.is_embedded());
    }

    #[test]
    fn test_tags_are_a_set() {
        let mut input = NewMemory::new(1, "gmail", "msg-1", "hi there");
        input.tags = vec!["b".into(), "a".into(), " b ".into(), "".into()];
        let memory = Memory::new(input, ContentHash::compute("hi there").unwrap());
        assert_eq!(memory.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut input = NewMemory::new(1, "gmail", "msg-1", "hello");
        input.importance = Some(1.5);
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        let blank = NewMemory::new(1, "gmail", "msg-1", "   ");
        assert!(matches!(blank.validate(), Err(DomainError::EmptyInput(_))));
    }

    #[test]
    fn test_apply_rehashes_on_content_change() {
        let mut memory = sample();
        let before = memory.content_hash.clone();

        let changed = memory
            .apply(MemoryPatch {
                title: Some("Invoice".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(!changed);
        assert_eq!(memory.content_hash, before);
        assert_eq!(memory.title, "Invoice");

        let changed = memory
            .apply(MemoryPatch {
                content: Some("Pay $75 to Acme Corp".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(changed);
        assert_ne!(memory.content_hash, before);
    }
}
