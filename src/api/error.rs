//! Error types for API access

use thiserror::Error;

/// Errors raised by [`ApiClient`](super::ApiClient)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Login rejected, or a request still unauthorized after one re-login
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-success status other than 401
    #[error("Request to {endpoint} failed with status {status}: {body}")]
    Request {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// Network-level failure that persisted through every retry
    #[error("Request to {endpoint} failed after {attempts} attempts: {message}")]
    Transient {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// Network-level failure that is not worth retrying (bad URL, TLS setup, ...)
    #[error("Could not send request to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The server handed out a cursor that was already followed
    #[error("Pagination loop at {endpoint}: {message}")]
    Pagination { endpoint: String, message: String },

    /// The response body is not what the protocol promises
    #[error("Invalid response from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    #[error("Cancelled after {pages} pages")]
    Cancelled { pages: usize },

    #[error("Deadline exceeded after {pages} pages")]
    DeadlineExceeded { pages: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Authentication(_) => Some(401),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Authentication(msg) => format!(
                "Authentication failed: {msg}\n\n\
                Hints:\n\
                - Check the username and password of the active profile\n\
                - Run 'docschema configure' to store new credentials"
            ),
            ApiError::Transient {
                endpoint, attempts, ..
            } => format!(
                "Could not reach {endpoint} ({attempts} attempts).\n\n\
                Hints:\n\
                - Check your network connection\n\
                - Verify the API URL of the active profile"
            ),
            ApiError::Request {
                status: 404,
                endpoint,
                ..
            } => format!("Not found: {endpoint}"),
            _ => self.to_string(),
        }
    }
}
