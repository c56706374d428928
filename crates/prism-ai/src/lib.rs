//! prism-ai: wire types and streaming client for the prism chat backend
//!
//! This crate defines chats, messages and their parts, the model catalog, and
//! the HTTP client that streams responses from the backend.

pub mod client;
mod decode;
pub mod error;
pub mod models;
pub mod stream;
pub mod types;

pub use client::{ChatApi, ChatRequest, DeletedMessages};
pub use error::{Error, Result};
pub use models::ModelInfo;
pub use stream::{ChatEventStream, FailureKind, PartsBuilder, StreamEvent};
pub use types::*;
