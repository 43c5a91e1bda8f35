//! Error types for the GitHub API client.

use thiserror::Error;

/// Errors reported by the GitHub REST API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// HTTP-level error with status code.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Bad or missing credentials (401/403).
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Primary or secondary rate limit hit.
    #[error("rate limited{}", .retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    RateLimit { retry_after: Option<u64> },

    /// Resource not found.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Request rejected by the API (400/422).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Transport failure before a response was received.
    #[error("network error: {message}")]
    Network { message: String },
}

impl ApiError {
    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimit { .. } | ApiError::Network { .. } => true,
            ApiError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiError::Network { .. } => 3,
            ApiError::RateLimit { .. } => 4,
            _ => 2,
        }
    }
}

/// Top-level error for client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(api) => api.is_retryable(),
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            Error::Decode(_) => false,
        }
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Api(api) => api.exit_code(),
            Error::Http(_) => 3,
            Error::Decode(_) => 2,
        }
    }

    /// Returns the underlying API error, if any.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
