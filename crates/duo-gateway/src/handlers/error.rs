//! Handler error types

use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Invalid payload received
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Connection is not bound to a session
    #[error("Connection not bound to a session")]
    NotBound,

    /// Service error
    #[error("Service error: {0}")]
    Service(#[from] duo_service::ServiceError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Error code reported in the acknowledgment
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::NotBound => "NOT_BOUND",
            Self::Service(e) => e.error_code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
