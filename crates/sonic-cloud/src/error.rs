//! Cloud client errors

use thiserror::Error;

/// Failure categories reported by a [`CloudApi`](crate::CloudApi) implementor
///
/// Implementors map their transport-level failures into these four
/// categories; the integration never inspects anything finer-grained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("too many requests")]
    TooManyRequests,

    #[error("request failed: {0}")]
    Request(String),
}

/// Result type for cloud operations
pub type CloudResult<T> = Result<T, CloudError>;
