//! In-process message store

use async_trait::async_trait;
use parking_lot::Mutex;
use prism_ai::{Chat, ChatId, DeletedMessages, Message};
use std::collections::HashMap;

use super::{MessageStore, StoreError, StoreResult};

/// Store operations, used to inject failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateChat,
    GetChat,
    ListChats,
    RenameChat,
    DeleteChat,
    LoadMessages,
    AppendMessage,
    DeleteMessages,
}

#[derive(Default)]
struct Inner {
    chats: Vec<Chat>,
    messages: HashMap<ChatId, Vec<Message>>,
    /// Per operation: calls to let through, then calls to fail
    failures: HashMap<StoreOp, (usize, usize)>,
    calls: HashMap<StoreOp, usize>,
}

impl Inner {
    /// Count the call and consume a pending failure for it
    fn enter(&mut self, op: StoreOp) -> StoreResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if let Some((skip, fail)) = self.failures.get_mut(&op) {
            if *skip > 0 {
                *skip -= 1;
            } else if *fail > 0 {
                *fail -= 1;
                return Err(StoreError::Other(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }

    fn has_chat(&self, chat_id: &ChatId) -> bool {
        self.chats.iter().any(|c| &c.id == chat_id)
    }
}

/// A [`MessageStore`] that keeps everything in memory.
///
/// Useful as a scratch store and in tests; failures can be injected per
/// operation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `op` fail
    pub fn fail_next(&self, op: StoreOp, count: usize) {
        self.fail_after(op, 0, count);
    }

    /// Let `skip` calls of `op` succeed, then fail the following `count`
    pub fn fail_after(&self, op: StoreOp, skip: usize, count: usize) {
        self.inner.lock().failures.insert(op, (skip, count));
    }

    /// How many times `op` has been called
    pub fn calls(&self, op: StoreOp) -> usize {
        self.inner.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of a chat's stored messages
    pub fn messages(&self, chat_id: &ChatId) -> Vec<Message> {
        self.inner
            .lock()
            .messages
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<Chat> {
        self.inner
            .lock()
            .chats
            .iter()
            .find(|c| &c.id == chat_id)
            .cloned()
    }

    pub fn chat_count(&self) -> usize {
        self.inner.lock().chats.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_chat(&self, chat: Chat) -> StoreResult<Chat> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::CreateChat)?;
        inner.chats.retain(|c| c.id != chat.id);
        inner.chats.push(chat.clone());
        inner.messages.entry(chat.id.clone()).or_default();
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &ChatId) -> StoreResult<Option<Chat>> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::GetChat)?;
        Ok(inner.chats.iter().find(|c| &c.id == chat_id).cloned())
    }

    async fn list_chats(&self, owner_id: &str) -> StoreResult<Vec<Chat>> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::ListChats)?;
        // Later insertions win ties on created_at.
        let mut chats: Vec<Chat> = inner
            .chats
            .iter()
            .rev()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn rename_chat(&self, chat_id: &ChatId, title: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::RenameChat)?;
        let chat = inner
            .chats
            .iter_mut()
            .find(|c| &c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.clone()))?;
        chat.title = Some(title.to_string());
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::DeleteChat)?;
        if !inner.has_chat(chat_id) {
            return Err(StoreError::ChatNotFound(chat_id.clone()));
        }
        inner.chats.retain(|c| &c.id != chat_id);
        inner.messages.remove(chat_id);
        Ok(())
    }

    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::LoadMessages)?;
        if !inner.has_chat(chat_id) {
            return Err(StoreError::ChatNotFound(chat_id.clone()));
        }
        Ok(inner.messages.get(chat_id).cloned().unwrap_or_default())
    }

    async fn append_message(&self, message: &Message) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::AppendMessage)?;
        if !inner.has_chat(&message.chat_id) {
            return Err(StoreError::ChatNotFound(message.chat_id.clone()));
        }
        let messages = inner.messages.entry(message.chat_id.clone()).or_default();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => messages.push(message.clone()),
        }
        Ok(())
    }

    async fn delete_messages_from_index(
        &self,
        chat_id: &ChatId,
        index: usize,
    ) -> StoreResult<DeletedMessages> {
        let mut inner = self.inner.lock();
        inner.enter(StoreOp::DeleteMessages)?;
        let messages = inner
            .messages
            .get_mut(chat_id)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| StoreError::NoMessages(chat_id.clone()))?;
        if index >= messages.len() {
            return Ok(DeletedMessages::default());
        }
        let deleted_ids: Vec<_> = messages.drain(index..).map(|m| m.id).collect();
        Ok(DeletedMessages {
            deleted_count: deleted_ids.len(),
            deleted_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(store: &MemoryStore, count: usize) -> Chat {
        let chat = store.create_chat(Chat::new("u1", None)).await.unwrap();
        for i in 0..count {
            let message = if i % 2 == 0 {
                Message::user(chat.id.clone(), format!("q{}", i), vec![])
            } else {
                Message::assistant(chat.id.clone())
            };
            store.append_message(&message).await.unwrap();
        }
        chat
    }

    #[tokio::test]
    async fn test_append_is_upsert() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 0).await;
        let mut message = Message::user(chat.id.clone(), "first", vec![]);
        store.append_message(&message).await.unwrap();
        message.set_text("second");
        store.append_message(&message).await.unwrap();

        let stored = store.load_messages(&chat.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text(), "second");
    }

    #[tokio::test]
    async fn test_delete_from_index() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 5).await;
        let ids: Vec<_> = store.messages(&chat.id).iter().map(|m| m.id.clone()).collect();

        let deleted = store.delete_messages_from_index(&chat.id, 2).await.unwrap();
        assert_eq!(deleted.deleted_count, 3);
        assert_eq!(deleted.deleted_ids, ids[2..].to_vec());
        assert_eq!(store.messages(&chat.id).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_past_end_is_empty() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 2).await;
        let deleted = store.delete_messages_from_index(&chat.id, 7).await.unwrap();
        assert_eq!(deleted, DeletedMessages::default());
    }

    #[tokio::test]
    async fn test_delete_on_empty_chat_is_no_messages() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 0).await;
        let err = store.delete_messages_from_index(&chat.id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::NoMessages(_)));
    }

    #[tokio::test]
    async fn test_delete_chat_cascades() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 3).await;
        store.delete_chat(&chat.id).await.unwrap();
        assert!(store.get_chat(&chat.id).await.unwrap().is_none());
        assert!(store.messages(&chat.id).is_empty());
        assert!(matches!(
            store.load_messages(&chat.id).await,
            Err(StoreError::ChatNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_per_owner() {
        let store = MemoryStore::new();
        let mut old = Chat::new("u1", Some("old".into()));
        old.created_at -= chrono::Duration::minutes(5);
        store.create_chat(old).await.unwrap();
        store.create_chat(Chat::new("u1", Some("new".into()))).await.unwrap();
        store.create_chat(Chat::new("u2", Some("other".into()))).await.unwrap();

        let chats = store.list_chats("u1").await.unwrap();
        let titles: Vec<_> = chats.iter().map(|c| c.display_title()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let store = MemoryStore::new();
        let chat = seeded(&store, 0).await;
        store.fail_next(StoreOp::RenameChat, 1);
        assert!(store.rename_chat(&chat.id, "x").await.is_err());
        store.rename_chat(&chat.id, "x").await.unwrap();
        assert_eq!(store.calls(StoreOp::RenameChat), 2);
        assert_eq!(store.chat(&chat.id).unwrap().title.as_deref(), Some("x"));
    }
}
