//! Infrastructure Adapters
//!
//! Concrete implementations of the kioku ports:
//! - postgres: MemoryRepository over sqlx
//! - qdrant: VectorIndex over qdrant-client
//! - openai: EmbeddingProvider and CompletionProvider over reqwest

pub mod openai;
pub mod postgres;
pub mod qdrant;

pub use openai::{OpenAiCompletion, OpenAiEmbedding};
pub use postgres::PgMemoryRepository;
pub use qdrant::QdrantVectorIndex;
