//! Error types for prism-ai

use thiserror::Error;

/// Result type alias using prism-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No valid session, or the backend rejected the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),
}

impl Error {
    /// Classify a non-success HTTP status.
    ///
    /// `401` becomes [`Error::Auth`] and `404` becomes [`Error::NotFound`] so
    /// callers can tell them apart from generic transport failures.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth(if message.is_empty() {
                "User not authenticated".to_string()
            } else {
                message
            }),
            404 => Self::NotFound(message),
            _ => Self::Status { status, message },
        }
    }

    /// Check if this error means the user has no valid session
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
