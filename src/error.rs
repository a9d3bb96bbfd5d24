//! Error types for dslsmith
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for dslsmith operations
///
/// Agent-level failures never surface through this type: the generator and
/// validator fold their errors into an `AgentResponse`. These variants cover
/// configuration, collaborators (provider, library, session store), and the
/// request-level aborts of the orchestration loop.
#[derive(Error, Debug)]
pub enum DslsmithError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, authentication, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Example or grammar lookup errors
    #[error("Library error: {0}")]
    Library(String),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(String),

    /// Referenced session does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Code did not pass validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request was cancelled before completion
    #[error("Request cancelled")]
    Cancelled,

    /// Request exceeded its wall-clock budget
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for dslsmith operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = DslsmithError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_provider_error_display() {
        let error = DslsmithError::Provider("API timeout".to_string());
        assert_eq!(error.to_string(), "Provider error: API timeout");
    }

    #[test]
    fn test_session_not_found_display() {
        let error = DslsmithError::SessionNotFound("s1".to_string());
        assert_eq!(error.to_string(), "Session not found: s1");
    }

    #[test]
    fn test_timeout_display() {
        let error = DslsmithError::Timeout(30);
        assert_eq!(error.to_string(), "Request timed out after 30 seconds");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: DslsmithError = io_error.into();
        assert!(error.to_string().contains("IO error"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = DslsmithError::Cancelled.into();
        assert!(matches!(
            err.downcast_ref::<DslsmithError>(),
            Some(DslsmithError::Cancelled)
        ));
    }
}
