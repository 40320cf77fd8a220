//! Role-tagged conversation messages for batch ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{MessageRole, Scope};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// System prompts and blank messages are never stored
    pub fn is_storable(&self) -> bool {
        self.role != MessageRole::System && !self.content.trim().is_empty()
    }
}

/// A batch of messages sharing provenance and scope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemories {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    pub source: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
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
    /// Run fact extraction (default) or embed each message as-is
    #[serde(default = "default_infer")]
    pub infer: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_infer() -> bool {
    true
}

impl AddMemories {
    pub fn scope(&self) -> Scope {
        Scope {
            owner_id: self.owner_id,
            agent_id: self.agent_id.clone(),
            run_id: self.run_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_storable() {
        assert!(ChatMessage::user("remember the milk").is_storable());
        assert!(ChatMessage::assistant("noted").is_storable());
        assert!(!ChatMessage::system("you are a helpful assistant").is_storable());
        assert!(!ChatMessage::user("   ").is_storable());
    }

    #[test]
    fn test_infer_defaults_to_true() {
        let json = serde_json::json!({
            "messages": [{ "role": "user", "content": "hi" }],
            "ownerId": 1,
            "source": "chat",
            "sourceId": "c-1",
            "timestamp": "2025-01-01T00:00:00Z"
        });
        let batch: AddMemories = serde_json::from_value(json).unwrap();
        assert!(batch.infer);
        assert_eq!(batch.messages[0].role, MessageRole::User);
    }
}
