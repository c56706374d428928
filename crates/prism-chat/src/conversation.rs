//! Conversation state: messages, streaming status, and sync bookkeeping.

use prism_ai::{Attachment, ChatId, Message, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Where the conversation is in its turn cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Idle,
    Streaming,
    /// Reported once when a turn fails, immediately followed by `Idle`
    Error,
}

/// Input held while the chat it belongs to is being created
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// The active chat's messages and streaming state.
#[derive(Debug, Default)]
pub struct Conversation {
    /// Absent until the first submit creates the chat
    pub chat_id: Option<ChatId>,
    /// Committed messages, oldest first
    pub messages: Vec<Message>,
    pub status: ChatStatus,
    /// Assistant message being streamed
    pub pending: Option<Message>,
    /// Messages shown locally but missing from the store
    pub unsynced: HashSet<MessageId>,
    /// Submission waiting for chat creation
    pub pending_input: Option<PendingInput>,
}

impl Conversation {
    /// A conversation loaded from the store
    pub fn hydrated(chat_id: ChatId, messages: Vec<Message>) -> Self {
        Self {
            chat_id: Some(chat_id),
            messages,
            ..Default::default()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == ChatStatus::Streaming
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    /// Committed messages followed by the in-progress one, if any
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().chain(self.pending.iter())
    }

    /// Unsynced ids in message order
    pub fn unsynced_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| self.unsynced.contains(&m.id))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn is_synced(&self, id: &MessageId) -> bool {
        !self.unsynced.contains(id)
    }

    /// Keep only the first `len` messages; forget sync state of the rest
    pub(crate) fn truncate(&mut self, len: usize) {
        for message in self.messages.iter().skip(len) {
            self.unsynced.remove(&message.id);
        }
        self.messages.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_drops_sync_state() {
        let chat = ChatId::from("c1");
        let mut conversation = Conversation::hydrated(
            chat.clone(),
            vec![
                Message::user(chat.clone(), "a", vec![]),
                Message::assistant(chat.clone()),
            ],
        );
        let first = conversation.messages[0].id.clone();
        let second = conversation.messages[1].id.clone();
        conversation.unsynced.insert(first.clone());
        conversation.unsynced.insert(second.clone());

        conversation.truncate(1);
        assert_eq!(conversation.messages.len(), 1);
        assert!(!conversation.is_synced(&first));
        assert!(conversation.is_synced(&second));
        assert_eq!(conversation.unsynced_ids(), vec![first]);
    }

    #[test]
    fn test_visible_messages_include_pending() {
        let chat = ChatId::from("c1");
        let mut conversation =
            Conversation::hydrated(chat.clone(), vec![Message::user(chat.clone(), "a", vec![])]);
        conversation.pending = Some(Message::assistant(chat));
        assert_eq!(conversation.visible_messages().count(), 2);
    }
}
