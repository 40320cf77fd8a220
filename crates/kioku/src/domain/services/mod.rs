//! Domain Services
//!
//! Engines that orchestrate the ports:
//! - EmbeddingEngine: hashing, dedup, embedding generation and storage
//! - MemoryEngine: memory lifecycle with fact extraction
//! - RetrievalPipeline: search, rerank, answer synthesis
//! - LlmFactExtractor: FactExtractor over a CompletionProvider

mod embedding_engine;
mod fact_extraction;
mod memory_engine;
mod retrieval;
pub mod rerank_score;
pub mod snippet;
mod timeout;

pub use embedding_engine::*;
pub use fact_extraction::*;
pub use memory_engine::*;
pub use retrieval::*;
