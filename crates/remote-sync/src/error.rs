//! Error types for the remote sync crate.

use thiserror::Error;

/// Result type alias for remote sync operations.
pub type Result<T> = std::result::Result<T, RemoteSyncError>;

/// Errors that can occur while talking to the sync gateway.
#[derive(Debug, Error)]
pub enum RemoteSyncError {
    /// HTTP client error (connection refused, timeout, TLS...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the gateway
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Endpoint missing or not an absolute http(s) URL. Raised before any network call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Push attempted too soon after the previous successful one
    #[error("Rate limited: retry in {retry_in_ms}ms")]
    RateLimited { retry_in_ms: i64 },

    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(#[from] linkhub_core::Error),
}

impl RemoteSyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
