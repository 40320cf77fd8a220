//! Domain Errors
//!
//! Error types for domain operations.

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("At least one of owner_id, agent_id or run_id is required for scoped search")]
    ScopeRequired,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Timed out after {after_ms}ms: {operation}")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Infrastructure unavailable: {0}")]
    Infrastructure(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl DomainError {
    pub fn not_found<T: AsRef<str>>(entity_type: T, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
        }
    }

    /// Bad caller input (maps to a 4xx at the HTTP layer)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::EmptyInput(_) | Self::EmptyQuery | Self::ScopeRequired
        )
    }

    /// Provider backpressure; callers should retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::QuotaExceeded(_) | Self::Timeout { .. }
        )
    }

    /// The backing index/store is down rather than the item being bad
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure(_) | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(DomainError::ScopeRequired.is_validation());
        assert!(DomainError::EmptyQuery.is_validation());
        assert!(!DomainError::ScopeRequired.is_retryable());

        let timeout = DomainError::Timeout {
            operation: "embed".to_string(),
            after_ms: 100,
        };
        assert!(timeout.is_retryable());
        assert!(timeout.is_infrastructure());

        assert!(DomainError::RateLimited("429".into()).is_retryable());
        assert!(!DomainError::RateLimited("429".into()).is_infrastructure());
    }

    #[test]
    fn test_not_found_message() {
        let err = DomainError::not_found("Memory", 42);
        assert_eq!(err.to_string(), "Entity not found: Memory with id 42");
    }
}
