//! Session errors

use caseflow_types::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not initialized")]
    NotInitialized,

    #[error("Session already initialized")]
    AlreadyInitialized,

    #[error("Failed to acquire a platform handle after {attempts} attempts")]
    AcquisitionFailed { attempts: u32 },

    #[error("Operation '{operation}' failed: {source}")]
    OperationFailed {
        operation: String,
        #[source]
        source: PlatformError,
    },
}

impl SessionError {
    pub fn operation(operation: impl Into<String>, source: PlatformError) -> Self {
        SessionError::OperationFailed {
            operation: operation.into(),
            source,
        }
    }

    /// The platform failure behind an operation error, if any
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            SessionError::OperationFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
