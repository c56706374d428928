//! Edit, retry, delete and branch.
//!
//! Each mutation cuts the local message list back to a prefix, mirrors the cut
//! in the store, and optionally regenerates. A store failure puts the local
//! list back as it was.

use prism_ai::{Chat, ChatId, DeletedMessages, Message, MessageId, UNTITLED_CHAT};

use crate::{
    error::{Error, Result},
    events::ChatEvent,
    session::ChatSession,
    store::StoreError,
};

impl ChatSession {
    /// Rewrite a user message and regenerate the reply to it.
    ///
    /// Everything after the message is dropped. The store is truncated first;
    /// if that fails nothing changes locally.
    pub async fn edit(&mut self, message_id: &MessageId, text: &str) -> Result<()> {
        self.recover_abandoned_turn();
        self.ensure_idle()?;

        let index = self.index_of(message_id).map_err(|e| self.report(e))?;
        let target = &self.conversation.messages[index];
        if !target.is_user() {
            return Err(self.report(Error::validation("Only user messages can be edited")));
        }
        let text = text.trim();
        if text.is_empty() && target.attachments.is_empty() {
            return Err(self.report(Error::validation("Message is empty")));
        }
        let chat_id = self.require_chat()?;

        self.truncate_store(&chat_id, self.stored_index(index)).await?;

        let message = &mut self.conversation.messages[index];
        message.set_text(text);
        let edited = message.clone();
        self.conversation.truncate(index + 1);
        tracing::info!("Edited message {} in chat {}", message_id, chat_id);
        self.emit(ChatEvent::MessageEdited { message: edited });
        self.emit(ChatEvent::Truncated { len: index + 1 });

        self.run_turn().await
    }

    /// Regenerate an assistant reply.
    ///
    /// An assistant target is replaced. A user target regenerates the first
    /// assistant reply after it; with none, this does nothing.
    pub async fn retry(&mut self, message_id: &MessageId) -> Result<()> {
        self.recover_abandoned_turn();
        self.ensure_idle()?;

        let index = self.index_of(message_id).map_err(|e| self.report(e))?;
        let messages = &self.conversation.messages;
        let keep = if messages[index].is_assistant() {
            if index == 0 || !messages[index - 1].is_user() {
                return Err(self.report(Error::validation(
                    "There is no user message to regenerate from",
                )));
            }
            index
        } else {
            match messages[index + 1..].iter().position(Message::is_assistant) {
                Some(offset) => index + 1 + offset,
                None => {
                    tracing::debug!("Nothing to retry after message {}", message_id);
                    return Ok(());
                }
            }
        };
        let chat_id = self.require_chat()?;

        self.truncate_with_rollback(&chat_id, keep).await?;
        tracing::info!("Retrying from index {} in chat {}", keep, chat_id);
        self.run_turn().await
    }

    /// Delete a message and everything after it.
    ///
    /// Regenerates when a user message is left at the tail and
    /// `regenerate_after_delete` is on.
    pub async fn delete(&mut self, message_id: &MessageId) -> Result<()> {
        self.recover_abandoned_turn();
        self.ensure_idle()?;

        let index = self.index_of(message_id).map_err(|e| self.report(e))?;
        let chat_id = self.require_chat()?;

        self.truncate_with_rollback(&chat_id, index).await?;
        tracing::info!("Deleted messages from index {} in chat {}", index, chat_id);

        let tail_is_user = self.conversation.messages.last().is_some_and(Message::is_user);
        if tail_is_user && self.config.regenerate_after_delete {
            return self.run_turn().await;
        }
        Ok(())
    }

    /// Copy the conversation up to and including a message into a new chat.
    ///
    /// The source chat is left untouched. Returns the new chat's id; the
    /// active conversation does not change.
    pub async fn branch(&mut self, message_id: &MessageId) -> Result<ChatId> {
        let index = self.index_of(message_id).map_err(|e| self.report(e))?;
        let source_id = self.require_chat()?;

        let source_title = self.source_title(&source_id).await;
        let mut chat = Chat::new(
            self.config.owner_id.clone(),
            Some(format!("{} (branch)", source_title)),
        );
        chat.branched_from = Some(source_id.clone());

        let chat = self
            .store
            .create_chat(chat)
            .await
            .map_err(|e| self.report(e.into()))?;

        let copies: Vec<Message> = self.conversation.messages[..=index]
            .iter()
            .map(|m| m.copy_into(chat.id.clone()))
            .collect();
        for copy in &copies {
            if let Err(e) = self.store.append_message(copy).await {
                if let Err(cleanup) = self.store.delete_chat(&chat.id).await {
                    tracing::warn!("Failed to remove partial branch {}: {}", chat.id, cleanup);
                }
                return Err(self.report(e.into()));
            }
        }

        tracing::info!(
            "Branched chat {} into {} with {} messages",
            source_id,
            chat.id,
            copies.len()
        );
        {
            let mut state = self.app_state.write();
            state.upsert_chat(chat.clone());
            state.mark_titled(&chat.id);
        }
        let id = chat.id.clone();
        self.emit(ChatEvent::ChatCreated { chat });
        Ok(id)
    }

    fn require_chat(&self) -> Result<ChatId> {
        self.conversation
            .chat_id
            .clone()
            .ok_or_else(|| self.report(Error::validation("No active chat")))
    }

    async fn source_title(&self, chat_id: &ChatId) -> String {
        let listed = self
            .app_state
            .read()
            .chat(chat_id)
            .map(|c| c.display_title().to_string());
        if let Some(title) = listed {
            return title;
        }
        match self.store.get_chat(chat_id).await {
            Ok(Some(chat)) => chat.display_title().to_string(),
            Ok(None) => UNTITLED_CHAT.to_string(),
            Err(e) => {
                tracing::warn!("Failed to look up chat {}: {}", chat_id, e);
                UNTITLED_CHAT.to_string()
            }
        }
    }

    /// Position in the store of the local message at `index`.
    ///
    /// Unsynced messages were never written, so they do not count.
    fn stored_index(&self, index: usize) -> usize {
        self.conversation.messages[..index]
            .iter()
            .filter(|m| self.conversation.is_synced(&m.id))
            .count()
    }

    /// Delete stored messages from `index` on. A chat with no stored messages
    /// has nothing to delete.
    async fn truncate_store(&self, chat_id: &ChatId, index: usize) -> Result<DeletedMessages> {
        match self.store.delete_messages_from_index(chat_id, index).await {
            Ok(deleted) => {
                tracing::debug!(
                    "Store deleted {} messages from index {}",
                    deleted.deleted_count,
                    index
                );
                Ok(deleted)
            }
            Err(StoreError::NoMessages(_)) => Ok(DeletedMessages::default()),
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Cut the local list to `keep` messages, then the store; undo the local
    /// cut if the store fails.
    async fn truncate_with_rollback(&mut self, chat_id: &ChatId, keep: usize) -> Result<()> {
        let snapshot = self.conversation.messages.clone();
        let unsynced = self.conversation.unsynced.clone();
        let stored = self.stored_index(keep);

        self.conversation.truncate(keep);
        self.emit(ChatEvent::Truncated { len: keep });

        if let Err(e) = self.truncate_store(chat_id, stored).await {
            tracing::warn!("Restoring {} messages after failed truncation", snapshot.len());
            self.conversation.messages = snapshot.clone();
            self.conversation.unsynced = unsynced;
            self.emit(ChatEvent::Restored { messages: snapshot });
            return Err(e);
        }
        Ok(())
    }
}
