//! Error types for prism-chat

use prism_ai::FailureKind;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using prism-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by chat session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client layer
    #[error(transparent)]
    Ai(#[from] prism_ai::Error),

    /// No valid session; the user has to sign in again
    #[error("Authentication required: {0}")]
    Auth(String),

    /// The response stream failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The finished turn could not be saved; messages stay visible and unsynced
    #[error("Failed to save messages: {0}")]
    Persistence(String),

    /// Rejected before any mutation or network call
    #[error("{0}")]
    Validation(String),

    /// A response is already streaming for this conversation
    #[error("A response is already streaming")]
    Busy,

    /// The message store failed during a mutation
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Map a terminal stream failure to an error
    pub fn from_stream(kind: FailureKind, message: impl Into<String>) -> Self {
        match kind {
            FailureKind::Auth => Error::Auth(message.into()),
            FailureKind::Transport => Error::Transport(message.into()),
        }
    }

    /// Check if this error means the user has no valid session
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Auth(_) => true,
            Error::Ai(e) => e.is_auth(),
            Error::Store(StoreError::Remote(e)) => e.is_auth(),
            _ => false,
        }
    }

    /// Short heading for the notification raised by this error
    pub fn title(&self) -> &'static str {
        if self.is_auth() {
            return "Sign in required";
        }
        match self {
            Error::Ai(_) | Error::Transport(_) => "Response failed",
            Error::Persistence(_) => "Not saved",
            Error::Validation(_) => "Invalid input",
            Error::Busy => "Busy",
            Error::Store(_) => "Storage error",
            Error::Auth(_) => "Sign in required",
        }
    }
}
