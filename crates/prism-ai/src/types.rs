//! Core types for chats, messages and their parts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Title shown for chats that have not been named yet.
pub const UNTITLED_CHAT: &str = "Untitled Chat";

macro_rules! define_id {
    ($name:ident) => {
        /// Opaque identifier. Client-generated ids are UUID v4 strings, but any
        /// string the backend hands back is accepted.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ChatId);
define_id!(MessageId);
define_id!(AttachmentId);

/// A chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    /// Source chat when this chat was created by branching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branched_from: Option<ChatId>,
}

impl Chat {
    /// Create a new chat record with a fresh id
    pub fn new(owner_id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: ChatId::generate(),
            title,
            created_at: Utc::now(),
            owner_id: owner_id.into(),
            branched_from: None,
        }
    }

    /// Title for display, falling back to a placeholder
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED_CHAT)
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Discriminant of a [`Part`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Reasoning,
}

/// A typed fragment of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Final answer text
    Text { text: String },
    /// Model "thinking", rendered apart from the answer
    Reasoning { reasoning: String },
}

impl Part {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create reasoning content
    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        Self::Reasoning {
            reasoning: reasoning.into(),
        }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            Self::Text { .. } => PartKind::Text,
            Self::Reasoning { .. } => PartKind::Reasoning,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get reasoning if this is reasoning content
    pub fn as_reasoning(&self) -> Option<&str> {
        match self {
            Self::Reasoning { reasoning } => Some(reasoning),
            _ => None,
        }
    }

    pub(crate) fn push_str(&mut self, delta: &str) {
        match self {
            Self::Text { text } => text.push_str(delta),
            Self::Reasoning { reasoning } => reasoning.push_str(delta),
        }
    }
}

/// Upload lifecycle of an attachment. Client-local, never serialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadState {
    Pending,
    Uploading { progress: f32 },
    Committed,
    Failed,
}

impl UploadState {
    fn committed() -> Self {
        Self::Committed
    }
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub mime_type: String,
    /// Anything that made it onto the wire or into a store was committed.
    #[serde(skip, default = "UploadState::committed")]
    pub upload_state: UploadState,
}

impl Attachment {
    /// A draft attachment that still has to be uploaded
    pub fn pending(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::generate(),
            url: String::new(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            upload_state: UploadState::Pending,
        }
    }

    /// An attachment already stored at `url`
    pub fn committed(
        name: impl Into<String>,
        url: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: AttachmentId::generate(),
            url: url.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            upload_state: UploadState::Committed,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.upload_state == UploadState::Committed
    }

    /// Images get an inline preview, everything else a file card
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Client-generated; doubles as the persistence key
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: Role,
    #[serde(default, deserialize_with = "lenient_parts")]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Resolved model id, assistant messages only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Deprecated flat content, only read when `parts` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    /// Create a user message. Empty text yields no parts.
    pub fn user(chat_id: ChatId, text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        let text = text.into();
        let parts = if text.is_empty() {
            vec![]
        } else {
            vec![Part::text(text)]
        };
        Self {
            id: MessageId::generate(),
            chat_id,
            role: Role::User,
            parts,
            attachments,
            model_used: None,
            created_at: Utc::now(),
            content: None,
        }
    }

    /// Create an empty assistant message
    pub fn assistant(chat_id: ChatId) -> Self {
        Self {
            id: MessageId::generate(),
            chat_id,
            role: Role::Assistant,
            parts: vec![],
            attachments: vec![],
            model_used: None,
            created_at: Utc::now(),
            content: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Get combined text content, falling back to the deprecated flat field
    pub fn text(&self) -> String {
        if self.parts.is_empty() {
            return self.content.clone().unwrap_or_default();
        }
        self.parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Get combined reasoning content
    pub fn reasoning(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.as_reasoning())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Replace the text of this message, keeping attachments
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.parts = if text.is_empty() {
            vec![]
        } else {
            vec![Part::text(text)]
        };
        self.content = None;
    }

    /// Copy this message into another chat under a fresh id
    pub fn copy_into(&self, chat_id: ChatId) -> Self {
        Self {
            id: MessageId::generate(),
            chat_id,
            ..self.clone()
        }
    }
}

/// Keep the parts we understand and drop the rest.
///
/// Backends built on other SDKs emit part types such as `step-start` or
/// `tool-invocation`; those have no meaning here.
fn lenient_parts<'de, D>(deserializer: D) -> std::result::Result<Vec<Part>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Part>(value) {
            Ok(part) => Some(part),
            Err(e) => {
                tracing::debug!("Dropping unsupported message part: {}", e);
                None
            }
        })
        .collect())
}

/// Reasoning/thinking level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    Off,
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningLevel {
    /// Parse a user-supplied level name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" | "0" => Some(Self::Off),
            "low" | "1" => Some(Self::Low),
            "medium" | "med" | "2" => Some(Self::Medium),
            "high" | "3" => Some(Self::High),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Generation parameters sent with every streaming request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Model identifier (e.g., "anthropic/claude-sonnet-4")
    pub model: String,
    pub reasoning: ReasoningLevel,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: crate::models::default_model().id.to_string(),
            reasoning: ReasoningLevel::default(),
        }
    }
}
