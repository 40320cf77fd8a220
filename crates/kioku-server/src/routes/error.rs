//! Domain error → HTTP status

use axum::http::StatusCode;

use kioku::DomainError;

pub type ApiError = (StatusCode, String);

pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        _ if e.is_validation() => StatusCode::BAD_REQUEST,
        DomainError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::RateLimited(_) | DomainError::QuotaExceeded(_) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        DomainError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn api_error(e: DomainError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() {
        tracing::error!("❌ {}", e);
    } else {
        tracing::debug!("↩️  {} {}", status, e);
    }
    (status, e.to_string())
}

pub fn unavailable(service: &str) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{service} not available"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&DomainError::EmptyQuery), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&DomainError::ScopeRequired), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&DomainError::DimensionMismatch {
                expected: 1536,
                actual: 3
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DomainError::not_found("Memory", 1)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DomainError::Conflict("dup".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DomainError::QuotaExceeded("quota".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&DomainError::Timeout {
                operation: "embed".into(),
                after_ms: 10
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&DomainError::Infrastructure("qdrant down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&DomainError::ExternalService("bad reply".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_keeps_message() {
        let (status, message) = api_error(DomainError::EmptyQuery);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Query must not be empty");
    }
}
