//! Local store that mirrors suffix deletions to the backend

use async_trait::async_trait;
use prism_ai::{ChatApi, Chat, ChatId, DeletedMessages, Message};
use std::sync::Arc;

use super::{MessageStore, StoreError, StoreResult};

/// Wraps a local store and forwards `delete_messages_from_index` to the
/// backend's delete-messages endpoint first.
///
/// The backend may keep its own copy of each chat; truncating it keeps later
/// requests from seeing stale history. A backend that holds no messages for
/// the chat answers `404`, which counts as nothing to delete there.
pub struct MirroredStore {
    local: Arc<dyn MessageStore>,
    api: ChatApi,
}

impl MirroredStore {
    pub fn new(local: Arc<dyn MessageStore>, api: ChatApi) -> Self {
        Self { local, api }
    }
}

/// A remote delete that found nothing is not a failure.
fn tolerate_missing(result: prism_ai::Result<DeletedMessages>) -> StoreResult<DeletedMessages> {
    match result {
        Ok(deleted) => Ok(deleted),
        Err(prism_ai::Error::NotFound(message)) => {
            tracing::debug!("Backend has no messages to delete: {}", message);
            Ok(DeletedMessages::default())
        }
        Err(e) => Err(StoreError::Remote(e)),
    }
}

#[async_trait]
impl MessageStore for MirroredStore {
    async fn create_chat(&self, chat: Chat) -> StoreResult<Chat> {
        self.local.create_chat(chat).await
    }

    async fn get_chat(&self, chat_id: &ChatId) -> StoreResult<Option<Chat>> {
        self.local.get_chat(chat_id).await
    }

    async fn list_chats(&self, owner_id: &str) -> StoreResult<Vec<Chat>> {
        self.local.list_chats(owner_id).await
    }

    async fn rename_chat(&self, chat_id: &ChatId, title: &str) -> StoreResult<()> {
        self.local.rename_chat(chat_id, title).await
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()> {
        self.local.delete_chat(chat_id).await
    }

    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        self.local.load_messages(chat_id).await
    }

    async fn append_message(&self, message: &Message) -> StoreResult<()> {
        self.local.append_message(message).await
    }

    async fn delete_messages_from_index(
        &self,
        chat_id: &ChatId,
        index: usize,
    ) -> StoreResult<DeletedMessages> {
        let remote = tolerate_missing(self.api.delete_messages(chat_id, index).await)?;
        tracing::debug!(
            "Backend deleted {} messages of chat {} from index {}",
            remote.deleted_count,
            chat_id,
            index
        );
        self.local.delete_messages_from_index(chat_id, index).await
    }
}
