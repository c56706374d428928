//! Process-wide application state: the chat list and the active chat.

use parking_lot::RwLock;
use prism_ai::{Chat, ChatId};
use std::collections::HashSet;
use std::sync::Arc;

/// Shared application state. The session writes, presenters read.
pub type SharedAppState = Arc<RwLock<AppState>>;

#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Newest first
    chats: Vec<Chat>,
    current_chat_id: Option<ChatId>,
    /// Chats the title side effect has already run for
    titled: HashSet<ChatId>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedAppState {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }

    pub fn current_chat_id(&self) -> Option<&ChatId> {
        self.current_chat_id.as_ref()
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.current_chat_id.as_ref().and_then(|id| self.chat(id))
    }

    pub fn set_current(&mut self, chat_id: Option<ChatId>) {
        self.current_chat_id = chat_id;
    }

    /// Replace the chat list, keeping it newest first
    pub fn set_chats(&mut self, mut chats: Vec<Chat>) {
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.chats = chats;
    }

    /// Insert a chat at the front, or update it in place if already listed
    pub fn upsert_chat(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.insert(0, chat),
        }
    }

    pub fn remove_chat(&mut self, chat_id: &ChatId) {
        self.chats.retain(|c| &c.id != chat_id);
        self.titled.remove(chat_id);
        if self.current_chat_id.as_ref() == Some(chat_id) {
            self.current_chat_id = None;
        }
    }

    /// Set a chat's title. Returns `false` if the chat is not listed.
    pub fn set_title(&mut self, chat_id: &ChatId, title: &str) -> bool {
        match self.chats.iter_mut().find(|c| &c.id == chat_id) {
            Some(chat) => {
                chat.title = Some(title.to_string());
                true
            }
            None => false,
        }
    }

    /// Record that a chat has been titled. Returns `true` the first time.
    pub fn mark_titled(&mut self, chat_id: &ChatId) -> bool {
        self.titled.insert(chat_id.clone())
    }

    pub fn is_titled(&self, chat_id: &ChatId) -> bool {
        self.titled.contains(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_inserts_at_front() {
        let mut state = AppState::new();
        let a = Chat::new("u", Some("a".into()));
        let b = Chat::new("u", Some("b".into()));
        state.upsert_chat(a.clone());
        state.upsert_chat(b.clone());
        assert_eq!(state.chats()[0].id, b.id);

        let mut renamed = a.clone();
        renamed.title = Some("a2".into());
        state.upsert_chat(renamed);
        assert_eq!(state.chats().len(), 2);
        assert_eq!(state.chat(&a.id).unwrap().display_title(), "a2");
    }

    #[test]
    fn test_remove_current_clears_selection() {
        let mut state = AppState::new();
        let chat = Chat::new("u", None);
        state.upsert_chat(chat.clone());
        state.set_current(Some(chat.id.clone()));
        assert!(state.mark_titled(&chat.id));
        assert!(!state.mark_titled(&chat.id));

        state.remove_chat(&chat.id);
        assert!(state.current_chat_id().is_none());
        assert!(!state.is_titled(&chat.id));
    }

    #[test]
    fn test_set_title_unknown_chat() {
        let mut state = AppState::new();
        assert!(!state.set_title(&ChatId::from("missing"), "t"));
    }
}
