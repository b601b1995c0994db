//! Error types for the docsage domain.
//!
//! One `thiserror` enum per kind of external collaborator. Configuration and
//! telemetry errors live in their own crates.

use thiserror::Error;

/// A failed call to an external service (generation or web search).
///
/// Callers inside the control loop recover from every variant; none of them
/// is allowed to surface as an empty success.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service returned an empty response")]
    EmptyResponse,

    #[error("No results for query: {0}")]
    NoResults(String),
}

impl ServiceError {
    /// Whether the failure is a quota or rate condition rather than a hard fault.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
            || matches!(self, Self::ApiError { status_code: 429, .. })
    }
}

/// A failed call to a document-fetching backend.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Local index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Local index is malformed: {0}")]
    InvalidIndex(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_displays_correctly() {
        let err = ServiceError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn quota_errors_are_classified() {
        assert!(ServiceError::RateLimited { retry_after_secs: 5 }.is_quota());
        assert!(
            ServiceError::ApiError {
                status_code: 429,
                message: String::new()
            }
            .is_quota()
        );
        assert!(!ServiceError::Network("reset".into()).is_quota());
    }

    #[test]
    fn retrieval_error_wraps_service_error() {
        let err: RetrievalError = ServiceError::NoResults("checkpointing".into()).into();
        assert!(err.to_string().contains("checkpointing"));
        assert!(matches!(err, RetrievalError::Service(_)));
    }
}
