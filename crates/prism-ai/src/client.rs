//! HTTP client for the chat backend

use crate::decode::{Frame, decode_frames};
use crate::error::{Error, Result};
use crate::models::supports_reasoning;
use crate::stream::ChatEventStream;
use crate::types::{Attachment, ChatId, GenerationConfig, Message, MessageId, Part, ReasoningLevel, Role};
use futures::StreamExt;
use reqwest::RequestBuilder;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Result of a suffix deletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMessages {
    #[serde(alias = "deleted")]
    pub deleted_count: usize,
    #[serde(alias = "messageIds")]
    pub deleted_ids: Vec<MessageId>,
}

/// Attachment as the chat endpoint expects it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    pub name: String,
    pub url: String,
    pub content_type: String,
}

impl From<&Attachment> for WireAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            name: attachment.name.clone(),
            url: attachment.url.clone(),
            content_type: attachment.mime_type.clone(),
        }
    }
}

/// A history entry in a chat request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<WireAttachment>,
    /// Flattened text for backends that ignore parts
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let parts = if message.parts.is_empty() {
            message
                .content
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| vec![Part::text(c.clone())])
                .unwrap_or_default()
        } else {
            message.parts.clone()
        };
        Self {
            id: message.id.clone(),
            role: message.role,
            parts,
            attachments: message.attachments.iter().map(WireAttachment::from).collect(),
            content: message.text(),
        }
    }
}

/// Body of a streaming chat request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ChatId>,
    pub messages: Vec<WireMessage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningLevel>,
}

impl ChatRequest {
    /// Build a request carrying the full history.
    ///
    /// The reasoning level is omitted when it is `Off` or the model does not
    /// take one.
    pub fn new(chat_id: Option<ChatId>, messages: &[Message], config: &GenerationConfig) -> Self {
        let reasoning = match config.reasoning {
            ReasoningLevel::Off => None,
            level if supports_reasoning(&config.model) => Some(level),
            _ => None,
        };
        Self {
            id: chat_id,
            messages: messages.iter().map(WireMessage::from).collect(),
            model: config.model.clone(),
            reasoning,
        }
    }
}

#[derive(Serialize)]
struct TitleRequest<'a> {
    message: &'a str,
    id: &'a ChatId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessagesRequest<'a> {
    chat_id: &'a ChatId,
    from_index: usize,
}

/// Client for the chat, title and delete-messages endpoints
#[derive(Debug, Clone)]
pub struct ChatApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ChatApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Start a streaming chat request.
    ///
    /// Connection and status failures arrive as the stream's terminal error
    /// event; only a request that cannot be built fails here.
    pub fn stream_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream> {
        tracing::debug!(
            "POST {}/api/chat model={} messages={}",
            self.base_url,
            request.model,
            request.messages.len()
        );

        let builder = self.post("/api/chat").json(request);
        let mut event_source = EventSource::new(builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
        event_source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let frames = event_source.map(|event| match event {
            Ok(Event::Open) => Frame::Open,
            Ok(Event::Message(message)) => Frame::Data(message.data),
            Err(reqwest_eventsource::Error::StreamEnded) => Frame::Closed,
            Err(reqwest_eventsource::Error::InvalidStatusCode(status, _)) => Frame::Failed(
                Error::from_status(status.as_u16(), status.canonical_reason().unwrap_or_default()),
            ),
            Err(reqwest_eventsource::Error::Transport(e)) => Frame::Failed(Error::Http(e)),
            Err(e) => Frame::Failed(Error::Sse(e.to_string())),
        });

        Ok(Box::pin(decode_frames(frames, cancel, request.model.clone())))
    }

    /// Ask the backend for a short title for `message`
    pub async fn generate_title(&self, message: &str, chat_id: &ChatId) -> Result<String> {
        let response = self
            .post("/api/title")
            .json(&TitleRequest {
                message,
                id: chat_id,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), error_message(&body)));
        }
        Ok(body)
    }

    /// Delete every message of `chat_id` from `from_index` on
    pub async fn delete_messages(
        &self,
        chat_id: &ChatId,
        from_index: usize,
    ) -> Result<DeletedMessages> {
        let response = self
            .post("/api/deletemessages")
            .json(&DeleteMessagesRequest {
                chat_id,
                from_index,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), error_message(&body)));
        }
        parse_deleted(&body)
    }
}

/// A 200 with a plain-text body means nothing was past the index.
fn parse_deleted(body: &str) -> Result<DeletedMessages> {
    let trimmed = body.trim();
    if !trimmed.starts_with('{') {
        return Ok(DeletedMessages::default());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Pull a message out of an error body, which may be JSON or plain text
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "message")]
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}
