//! Engine Configuration
//!
//! Plain structs with defaults; the server fills them from secrets.

use std::time::Duration;

use serde::Deserialize;

/// Embedding generation and similarity search settings
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Vector dimension D of the collection
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Longest text accepted for embedding, in chars
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Largest batch accepted by `generate_embeddings_batch`
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    #[serde(default = "default_score_threshold")]
    pub default_score_threshold: f32,
}

fn default_dimension() -> usize {
    1536
}

fn default_max_text_chars() -> usize {
    32_000
}

fn default_max_batch() -> usize {
    2048
}

fn default_search_limit() -> usize {
    10
}

fn default_score_threshold() -> f32 {
    0.7
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            max_text_chars: default_max_text_chars(),
            max_batch: default_max_batch(),
            default_limit: default_search_limit(),
            default_score_threshold: default_score_threshold(),
        }
    }
}

/// Upper bounds for every outbound call
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Embedding and completion calls
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_ms: u64,
    /// Vector index calls
    #[serde(default = "default_store_timeout_ms")]
    pub index_ms: u64,
    /// Relational store calls
    #[serde(default = "default_store_timeout_ms")]
    pub store_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_store_timeout_ms() -> u64 {
    10_000
}

impl TimeoutConfig {
    pub fn provider(&self) -> Duration {
        Duration::from_millis(self.provider_ms)
    }

    pub fn index(&self) -> Duration {
        Duration::from_millis(self.index_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_ms: default_provider_timeout_ms(),
            index_ms: default_store_timeout_ms(),
            store_ms: default_store_timeout_ms(),
        }
    }
}

/// LLM rerank defaults (overridable per request)
#[derive(Debug, Clone, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Keep at most this many hits; `None` or 0 keeps all
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_llm_model(),
            top_k: None,
        }
    }
}

/// Answer synthesis settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_answer_temperature")]
    pub temperature: f32,
}

fn default_answer_temperature() -> f32 {
    0.2
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_answer_temperature(),
        }
    }
}

/// Fact extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct FactExtractionConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_fact_max_tokens")]
    pub max_tokens: u32,
}

fn default_fact_max_tokens() -> u32 {
    600
}

impl Default for FactExtractionConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_tokens: default_fact_max_tokens(),
        }
    }
}

/// Memory lifecycle settings
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryEngineConfig {
    /// Drop and rebuild fact vectors when `update` changes the content
    #[serde(default = "default_reembed_on_update")]
    pub reembed_on_update: bool,
}

fn default_reembed_on_update() -> bool {
    true
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            reembed_on_update: default_reembed_on_update(),
        }
    }
}

/// Everything the engines need, in one place
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KiokuConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub facts: FactExtractionConfig,
    #[serde(default)]
    pub memory: MemoryEngineConfig,
}
