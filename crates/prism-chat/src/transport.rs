//! Transport abstraction for streaming responses

use async_trait::async_trait;
use prism_ai::{ChatApi, ChatEventStream, ChatId, ChatRequest, GenerationConfig, Message, Result};
use tokio_util::sync::CancellationToken;

/// Opens one streaming response for a conversation
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the full history and stream the reply.
    ///
    /// The stream ends after exactly one terminal event and emits
    /// [`StreamEvent::Abort`](prism_ai::StreamEvent::Abort) once `cancel` fires.
    async fn stream(
        &self,
        chat_id: &ChatId,
        messages: Vec<Message>,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream>;
}

#[async_trait]
impl ChatTransport for ChatApi {
    async fn stream(
        &self,
        chat_id: &ChatId,
        messages: Vec<Message>,
        config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream> {
        let request = ChatRequest::new(Some(chat_id.clone()), &messages, config);
        self.stream_chat(&request, cancel)
    }
}
