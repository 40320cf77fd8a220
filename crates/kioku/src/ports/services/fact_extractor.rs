//! Fact Extractor Port
//!
//! Turns a block of raw content into a bounded list of atomic facts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainError;
use crate::domain::ExtractedFact;

/// Provenance shown to the extractor next to the content
#[derive(Debug, Clone, Default)]
pub struct FactContext {
    pub title: Option<String>,
    pub source: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// At most 32 facts; an empty list means "nothing worth embedding"
    async fn extract(
        &self,
        content: &str,
        context: &FactContext,
    ) -> Result<Vec<ExtractedFact>, DomainError>;
}
