//! Error types reported by the external platform

/// Failures surfaced by a [`crate::WorkflowPlatform`] implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by platform: {0}")]
    Rejected(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Platform internal error: {0}")]
    Internal(String),
}

/// Result type alias for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;
