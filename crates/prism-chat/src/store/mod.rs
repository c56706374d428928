//! Message store abstraction
//!
//! The store is the durable record of chats and their ordered messages. The
//! session writes to it after every finished turn and truncates it before
//! every regeneration.

mod memory;
mod mirror;

pub use memory::{MemoryStore, StoreOp};
pub use mirror::MirroredStore;

use async_trait::async_trait;
use prism_ai::{Chat, ChatId, DeletedMessages, Message};
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`MessageStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    /// The id cannot name a chat in this store
    #[error("Invalid chat id: {0}")]
    InvalidChatId(ChatId),

    /// Suffix deletion on a chat that has no messages at all
    #[error("No messages found for chat {0}")]
    NoMessages(ChatId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A backend call made on the store's behalf failed
    #[error(transparent)]
    Remote(#[from] prism_ai::Error),

    #[error("{0}")]
    Other(String),
}

/// Durable storage for chats and messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new chat record, keeping its id
    async fn create_chat(&self, chat: Chat) -> StoreResult<Chat>;

    async fn get_chat(&self, chat_id: &ChatId) -> StoreResult<Option<Chat>>;

    /// All chats of `owner_id`, newest first
    async fn list_chats(&self, owner_id: &str) -> StoreResult<Vec<Chat>>;

    async fn rename_chat(&self, chat_id: &ChatId, title: &str) -> StoreResult<()>;

    /// Delete a chat and all of its messages
    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()>;

    /// Messages of a chat, oldest first
    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>>;

    /// Insert `message` into its chat, or replace the stored message with the
    /// same id. Repeating the call is harmless.
    async fn append_message(&self, message: &Message) -> StoreResult<()>;

    /// Delete every message at position `index` or later.
    ///
    /// Fails with [`StoreError::NoMessages`] when the chat has no messages.
    async fn delete_messages_from_index(
        &self,
        chat_id: &ChatId,
        index: usize,
    ) -> StoreResult<DeletedMessages>;
}
