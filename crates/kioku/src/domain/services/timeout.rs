//! Bounded outbound calls

use std::future::Future;
use std::time::Duration;

use crate::domain::errors::DomainError;

/// Run `fut` with an upper bound; elapsed time becomes `DomainError::Timeout`
pub(crate) async fn bounded<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("⏱️  {} timed out after {:?}", operation, limit);
            Err(DomainError::Timeout {
                operation: operation.to_string(),
                after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}
