//! Kioku Domain Library
//!
//! Content-addressed memory store: dedup by content hash, fact-level
//! embeddings, scoped similarity search, LLM rerank and answer synthesis.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure business entities and logic
//!   - `entities/`: Memory, ExtractedFact, vector records and search hits
//!   - `value_objects/`: ContentHash, Scope, VectorId, MessageRole
//!   - `services/`: EmbeddingEngine, MemoryEngine, RetrievalPipeline
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Relational store of memories
//!   - `services/`: Embedding, completion, vector index, fact extraction
//!
//! - **Config** (`config`): Engine settings with defaults
//!
//! # Usage
//!
//! ```rust,ignore
//! use kioku::{EmbeddingEngine, MemoryEngine, RetrievalPipeline};
//! use kioku::ports::{EmbeddingProvider, VectorIndex, MemoryRepository};
//! ```

pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::KiokuConfig;
pub use domain::services::{
    AddMemoriesOutcome, Answer, AskRequest, CreateOutcome, EmbeddingEngine, EmbeddingResult,
    LlmFactExtractor, MemoryEngine, RerankOptions, RetrievalPipeline, SearchRequest,
    UpdateOutcome,
};
pub use domain::{
    AddMemories, ContentHash, DomainError, Memory, MemoryPatch, NewMemory, Scope, SearchHit,
};
pub use ports::{
    CompletionProvider, EmbeddingProvider, FactExtractor, MemoryRepository, VectorIndex,
};
