//! Application error types
//!
//! Unified error handling for process-level failures. Client-visible
//! failures never surface as protocol-level disconnects; they degrade
//! to error acknowledgments with logged detail.

use duo_core::DomainError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // State store errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Domain(e) if e.is_not_found() => 404,
            Self::Cache(_) | Self::Internal(_) | Self::Config(_) | Self::Domain(_) => 500,
        }
    }

    /// Get the error code for API responses
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Domain(e) if e.is_not_found() => "NOT_FOUND",
            Self::Cache(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) | Self::Domain(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Validation("bad".into()).status_code(), 400);
        assert_eq!(AppError::NotFound("room".into()).status_code(), 404);
        assert_eq!(AppError::Cache("down".into()).status_code(), 500);
    }

    #[test]
    fn test_domain_not_found_maps_to_404() {
        let err = AppError::Domain(DomainError::RoomNotFound("r1".into()));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
