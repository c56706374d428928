//! Automatic chat titles

use async_trait::async_trait;
use prism_ai::{Chat, ChatApi, ChatId, Result};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::app_state::SharedAppState;
use crate::events::{ChatEvent, Notification};
use crate::store::MessageStore;

/// Longest title kept
pub const MAX_TITLE_CHARS: usize = 80;

/// Produces a short title for a chat's first message
#[async_trait]
pub trait TitleService: Send + Sync {
    async fn generate_title(&self, message: &str, chat_id: &ChatId) -> Result<String>;
}

#[async_trait]
impl TitleService for ChatApi {
    async fn generate_title(&self, message: &str, chat_id: &ChatId) -> Result<String> {
        ChatApi::generate_title(self, message, chat_id).await
    }
}

/// Clean up a generated title.
///
/// Keeps the first non-empty line, strips wrapping quotes and a `Title:`
/// prefix, and cuts to [`MAX_TITLE_CHARS`]. Returns `None` if nothing is left.
pub fn normalize_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Title:")
        .or_else(|| line.strip_prefix("title:"))
        .unwrap_or(line)
        .trim();
    let line = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*' | '“' | '”'))
        .trim();
    if line.is_empty() {
        return None;
    }
    let title: String = line.chars().take(MAX_TITLE_CHARS).collect();
    Some(title.trim_end().to_string())
}

/// Everything the background title task needs
pub(crate) struct TitleJob {
    pub chat_id: ChatId,
    pub message: String,
    pub service: Arc<dyn TitleService>,
    pub store: Arc<dyn MessageStore>,
    pub app_state: SharedAppState,
    pub events: broadcast::Sender<ChatEvent>,
}

impl TitleJob {
    /// Generate and apply the title. Failures become a warning notification.
    pub(crate) async fn run(self) {
        let generated = match self.service.generate_title(&self.message, &self.chat_id).await {
            Ok(raw) => normalize_title(&raw),
            Err(e) => {
                self.warn(e.to_string());
                return;
            }
        };

        let Some(title) = generated else {
            self.warn("The title service returned an empty title".to_string());
            return;
        };

        // A manual rename made while the title was generating wins
        if self.app_state.read().chat(&self.chat_id).is_some_and(Chat::has_title) {
            tracing::debug!("Chat {} was renamed meanwhile; dropping generated title", self.chat_id);
            return;
        }

        if let Err(e) = self.store.rename_chat(&self.chat_id, &title).await {
            self.warn(e.to_string());
            return;
        }

        self.app_state.write().set_title(&self.chat_id, &title);
        tracing::info!("Titled chat {}: {}", self.chat_id, title);
        let _ = self.events.send(ChatEvent::TitleUpdated {
            chat_id: self.chat_id,
            title,
        });
    }

    fn warn(&self, description: String) {
        tracing::warn!("Failed to title chat {}: {}", self.chat_id, description);
        let _ = self.events.send(ChatEvent::Notice(Notification::warning(
            "Could not generate a title",
            description,
        )));
    }
}
