//! Chat session event types

use prism_ai::{Attachment, Chat, ChatId, Message, MessageId, Part};
use serde::{Deserialize, Serialize};

use crate::conversation::ChatStatus;

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A dismissible toast for the presenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl From<&crate::Error> for Notification {
    fn from(error: &crate::Error) -> Self {
        Notification::error(error.title(), error.to_string())
    }
}

/// Events emitted by a [`ChatSession`](crate::ChatSession)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Conversation status changed. `Error` is always followed by `Idle`.
    StatusChanged { status: ChatStatus },

    /// A different chat (or a fresh, not yet created one) is now shown
    ChatOpened {
        chat_id: Option<ChatId>,
        messages: Vec<Message>,
    },

    /// A chat record was created (first submit or branch)
    ChatCreated { chat: Chat },

    /// A chat was deleted
    ChatDeleted { chat_id: ChatId },

    /// A message was appended to the local list
    MessageAppended { message: Message },

    /// A user message was rewritten in place
    MessageEdited { message: Message },

    /// The in-progress assistant message changed
    StreamUpdate {
        message_id: MessageId,
        parts: Vec<Part>,
    },

    /// The assistant response finished and joined the message list
    TurnFinished { message: Message },

    /// The in-progress assistant message was dropped (error or abort)
    TurnDiscarded { message_id: MessageId },

    /// The message list was cut back to `len` messages
    Truncated { len: usize },

    /// The message list was put back after a failed mutation
    Restored { messages: Vec<Message> },

    /// A chat got a new title
    TitleUpdated { chat_id: ChatId, title: String },

    /// Messages that could not be saved
    SyncChanged { unsynced: Vec<MessageId> },

    /// Submitted input handed back after a failure
    InputRestored {
        text: String,
        attachments: Vec<Attachment>,
    },

    /// Something the user should see
    Notice(Notification),
}

impl ChatEvent {
    /// Check if this event ends a turn
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatEvent::TurnFinished { .. } | ChatEvent::TurnDiscarded { .. }
        )
    }
}
