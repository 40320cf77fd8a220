//! Embedding Provider Port
//!
//! Abstract interface for text embedding generation.

use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// Service interface for turning text into a fixed-length vector
///
/// Implementations report provider backpressure as
/// `DomainError::RateLimited` / `DomainError::QuotaExceeded`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector of `dimension` floats
    async fn embed(&self, text: &str, dimension: usize) -> Result<Vec<f32>, DomainError>;

    /// Model identifier (e.g. "text-embedding-3-small")
    fn model_name(&self) -> &str;
}
