//! Chat session state machine and turn execution

use futures::StreamExt;
use prism_ai::{
    Attachment, Chat, ChatId, FailureKind, GenerationConfig, Message, MessageId, PartsBuilder,
    ReasoningLevel, StreamEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::{
    app_state::{AppState, SharedAppState},
    conversation::{ChatStatus, Conversation, PendingInput},
    error::{Error, Result},
    events::{ChatEvent, Notification},
    handle::ChatHandle,
    store::{MessageStore, StoreError},
    title::{TitleJob, TitleService},
    transport::ChatTransport,
};

/// Session configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model and reasoning level sent with each request
    pub generation: GenerationConfig,
    /// Owner recorded on created chats
    pub owner_id: String,
    /// Regenerate when a delete leaves a user message at the tail
    pub regenerate_after_delete: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            owner_id: "local".to_string(),
            regenerate_after_delete: true,
        }
    }
}

/// How a stream ended
enum TurnOutcome {
    Finished { model: String },
    Failed { kind: FailureKind, message: String },
    Aborted,
}

/// Drives one conversation: optimistic updates, streaming, persistence.
///
/// Operations take `&mut self`, so at most one of them runs at a time. Use a
/// [`ChatHandle`] to stop a running stream from elsewhere.
pub struct ChatSession {
    pub(crate) config: ChatConfig,
    pub(crate) conversation: Conversation,
    pub(crate) store: Arc<dyn MessageStore>,
    transport: Arc<dyn ChatTransport>,
    titles: Arc<dyn TitleService>,
    pub(crate) app_state: SharedAppState,
    pub(crate) event_tx: broadcast::Sender<ChatEvent>,
    pub(crate) handle: ChatHandle,
    background: JoinSet<()>,
}

impl ChatSession {
    /// Create a new session showing an empty, not yet created chat
    pub fn new(
        config: ChatConfig,
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn ChatTransport>,
        titles: Arc<dyn TitleService>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            conversation: Conversation::default(),
            store,
            transport,
            titles,
            app_state: AppState::shared(),
            event_tx,
            handle: ChatHandle::new(),
            background: JoinSet::new(),
        }
    }

    /// Share an existing application state
    pub fn with_app_state(mut self, app_state: SharedAppState) -> Self {
        self.app_state = app_state;
        self
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for stopping the stream from outside
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    pub fn app_state(&self) -> SharedAppState {
        Arc::clone(&self.app_state)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Committed messages of the active chat
    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn chat_id(&self) -> Option<&ChatId> {
        self.conversation.chat_id.as_ref()
    }

    pub fn status(&self) -> ChatStatus {
        self.conversation.status
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.generation.model = model.into();
    }

    pub fn set_reasoning(&mut self, level: ReasoningLevel) {
        self.config.generation.reasoning = level;
    }

    pub fn set_regenerate_after_delete(&mut self, enabled: bool) {
        self.config.regenerate_after_delete = enabled;
    }

    /// Stop the current stream, if any. Idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Wait for background work (title generation) to finish
    pub async fn settle(&mut self) {
        while let Some(result) = self.background.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Background task failed: {}", e);
            }
        }
    }

    // ---- Navigation ----

    /// Refresh the chat list from the store
    pub async fn load_chats(&mut self) -> Result<Vec<Chat>> {
        let chats = self
            .store
            .list_chats(&self.config.owner_id)
            .await
            .map_err(|e| self.report(Error::Store(e)))?;
        self.app_state.write().set_chats(chats.clone());
        Ok(chats)
    }

    /// Show an empty conversation; the chat is created on first submit
    pub fn new_chat(&mut self) {
        self.cancel();
        self.recover_abandoned_turn();
        self.conversation = Conversation::default();
        self.app_state.write().set_current(None);
        self.emit(ChatEvent::ChatOpened {
            chat_id: None,
            messages: vec![],
        });
    }

    /// Switch to a stored chat. Any running stream is stopped first.
    pub async fn open_chat(&mut self, chat_id: &ChatId) -> Result<()> {
        self.cancel();
        self.recover_abandoned_turn();

        let chat = match self.store.get_chat(chat_id).await {
            Ok(Some(chat)) => chat,
            Ok(None) => return Err(self.report(StoreError::ChatNotFound(chat_id.clone()).into())),
            Err(e) => return Err(self.report(e.into())),
        };
        let messages = self
            .store
            .load_messages(chat_id)
            .await
            .map_err(|e| self.report(e.into()))?;

        tracing::info!("Opened chat {} ({} messages)", chat_id, messages.len());
        self.conversation = Conversation::hydrated(chat.id.clone(), messages.clone());
        {
            let mut state = self.app_state.write();
            state.upsert_chat(chat);
            state.set_current(Some(chat_id.clone()));
        }
        self.emit(ChatEvent::ChatOpened {
            chat_id: Some(chat_id.clone()),
            messages,
        });
        Ok(())
    }

    /// Rename a chat by hand. No automatic title is requested for it afterwards.
    pub async fn rename_chat(&mut self, chat_id: &ChatId, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(self.report(Error::validation("Title cannot be empty")));
        }
        self.store
            .rename_chat(chat_id, title)
            .await
            .map_err(|e| self.report(e.into()))?;
        {
            let mut state = self.app_state.write();
            state.set_title(chat_id, title);
            state.mark_titled(chat_id);
        }
        self.emit(ChatEvent::TitleUpdated {
            chat_id: chat_id.clone(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Delete a chat and its messages. Deleting the active chat shows a new one.
    pub async fn delete_chat(&mut self, chat_id: &ChatId) -> Result<()> {
        let is_current = self.conversation.chat_id.as_ref() == Some(chat_id);
        if is_current {
            self.cancel();
            self.recover_abandoned_turn();
        }
        self.store
            .delete_chat(chat_id)
            .await
            .map_err(|e| self.report(e.into()))?;
        tracing::info!("Deleted chat {}", chat_id);
        self.app_state.write().remove_chat(chat_id);
        self.emit(ChatEvent::ChatDeleted {
            chat_id: chat_id.clone(),
        });
        if is_current {
            self.new_chat();
        }
        Ok(())
    }

    // ---- Turns ----

    /// Send a message and stream the reply.
    ///
    /// Creates the chat first if needed. Returns once the turn has finished,
    /// failed, or been cancelled; cancellation is not an error.
    pub async fn submit(&mut self, text: &str, attachments: Vec<Attachment>) -> Result<()> {
        self.recover_abandoned_turn();
        self.ensure_idle()?;

        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return Err(self.report(Error::validation("Message is empty")));
        }
        if let Some(a) = attachments.iter().find(|a| !a.is_committed()) {
            return Err(self.report(Error::validation(format!(
                "{} has not finished uploading",
                a.name
            ))));
        }

        let chat_id = match self.conversation.chat_id.clone() {
            Some(id) => id,
            None => {
                self.conversation.pending_input = Some(PendingInput {
                    text: text.to_string(),
                    attachments: attachments.clone(),
                });
                match self.create_chat().await {
                    Ok(chat) => {
                        self.conversation.pending_input = None;
                        chat.id
                    }
                    Err(e) => {
                        if let Some(input) = self.conversation.pending_input.take() {
                            self.emit(ChatEvent::InputRestored {
                                text: input.text,
                                attachments: input.attachments,
                            });
                        }
                        return Err(e);
                    }
                }
            }
        };

        let user = Message::user(chat_id, text, attachments.clone());
        self.conversation.messages.push(user.clone());
        self.emit(ChatEvent::MessageAppended { message: user });
        self.maybe_generate_title();

        let result = self.run_turn().await;
        if let Err(e) = &result {
            if !matches!(e, Error::Persistence(_)) {
                self.emit(ChatEvent::InputRestored {
                    text: text.to_string(),
                    attachments,
                });
            }
        }
        result
    }

    /// Write unsynced messages to the store again, oldest first.
    ///
    /// Stops at the first failure. Returns how many messages were written.
    pub async fn resync(&mut self) -> Result<usize> {
        let pending: Vec<Message> = self
            .conversation
            .messages
            .iter()
            .filter(|m| self.conversation.unsynced.contains(&m.id))
            .cloned()
            .collect();

        let mut written = 0;
        for message in pending {
            if let Err(e) = self.store.append_message(&message).await {
                self.emit_sync_state();
                return Err(self.report(Error::Persistence(e.to_string())));
            }
            self.conversation.unsynced.remove(&message.id);
            written += 1;
        }
        if written > 0 {
            tracing::info!("Resynced {} messages", written);
            self.emit_sync_state();
        }
        Ok(written)
    }

    /// Stream an assistant reply to the current message list
    pub(crate) async fn run_turn(&mut self) -> Result<()> {
        let Some(chat_id) = self.conversation.chat_id.clone() else {
            return Err(Error::validation("No active chat"));
        };

        let (cancel, _running) = self.handle.begin_turn();
        let assistant = Message::assistant(chat_id.clone());
        let assistant_id = assistant.id.clone();
        self.conversation.pending = Some(assistant);
        self.set_status(ChatStatus::Streaming);

        tracing::debug!(
            "Starting turn in chat {} with {} messages",
            chat_id,
            self.conversation.messages.len()
        );

        let history = self.conversation.messages.clone();
        let opened = self
            .transport
            .stream(&chat_id, history, &self.config.generation, cancel.clone())
            .await;

        let mut builder = PartsBuilder::new();
        let outcome = match opened {
            Err(e) => TurnOutcome::Failed {
                kind: if e.is_auth() {
                    FailureKind::Auth
                } else {
                    FailureKind::Transport
                },
                message: e.to_string(),
            },
            Ok(mut stream) => loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(StreamEvent::Abort),
                    event = stream.next() => event,
                };
                match next {
                    Some(StreamEvent::Finish { model }) => break TurnOutcome::Finished { model },
                    Some(StreamEvent::Error { kind, message }) => {
                        break TurnOutcome::Failed { kind, message };
                    }
                    Some(StreamEvent::Abort) => break TurnOutcome::Aborted,
                    Some(event) => {
                        if builder.process_event(&event) {
                            if let Some(pending) = self.conversation.pending.as_mut() {
                                pending.parts = builder.parts().to_vec();
                            }
                            self.emit(ChatEvent::StreamUpdate {
                                message_id: assistant_id.clone(),
                                parts: builder.parts().to_vec(),
                            });
                        }
                    }
                    None => {
                        break TurnOutcome::Failed {
                            kind: FailureKind::Transport,
                            message: "stream ended without a finish event".to_string(),
                        };
                    }
                }
            },
        };

        match outcome {
            TurnOutcome::Finished { model } => self.finish_turn(builder, model).await,
            TurnOutcome::Failed { kind, message } => {
                tracing::warn!("Turn failed in chat {}: {}", chat_id, message);
                self.discard_turn();
                self.set_status(ChatStatus::Error);
                self.set_status(ChatStatus::Idle);
                Err(self.report(Error::from_stream(kind, message)))
            }
            TurnOutcome::Aborted => {
                tracing::debug!("Turn aborted in chat {}", chat_id);
                self.discard_turn();
                self.set_status(ChatStatus::Idle);
                Ok(())
            }
        }
    }

    /// Seal the reply, go idle, then persist.
    ///
    /// Writes run oldest first: anything left unsynced by earlier turns, the
    /// user message being answered, then the reply. The first failed write
    /// leaves it and everything after it unsynced.
    async fn finish_turn(&mut self, builder: PartsBuilder, model: String) -> Result<()> {
        let Some(mut assistant) = self.conversation.pending.take() else {
            return Err(Error::Transport("finished turn has no reply".to_string()));
        };
        assistant.parts = builder.finish();
        assistant.model_used = Some(model);
        self.conversation.messages.push(assistant.clone());
        self.set_status(ChatStatus::Idle);
        self.emit(ChatEvent::TurnFinished { message: assistant });

        let had_unsynced = !self.conversation.unsynced.is_empty();
        let writes = self.conversation.messages[self.first_write_index()..].to_vec();
        for (i, message) in writes.iter().enumerate() {
            if let Err(e) = self.store.append_message(message).await {
                for unwritten in &writes[i..] {
                    self.conversation.unsynced.insert(unwritten.id.clone());
                }
                self.emit_sync_state();
                return Err(self.report(Error::Persistence(e.to_string())));
            }
            self.conversation.unsynced.remove(&message.id);
        }
        if had_unsynced {
            self.emit_sync_state();
        }
        Ok(())
    }

    /// Where a finished turn starts writing: the earliest unsynced message or
    /// the user message the reply answers, whichever comes first
    fn first_write_index(&self) -> usize {
        let messages = &self.conversation.messages;
        let reply = messages.len().saturating_sub(1);
        let unsynced = messages[..reply]
            .iter()
            .position(|m| self.conversation.unsynced.contains(&m.id));
        let answered = messages[..reply].iter().rposition(Message::is_user);
        unsynced.into_iter().chain(answered).min().unwrap_or(reply)
    }

    /// Drop the in-progress reply; the user message it answered stays, unsynced
    fn discard_turn(&mut self) {
        if let Some(pending) = self.conversation.pending.take() {
            self.emit(ChatEvent::TurnDiscarded {
                message_id: pending.id,
            });
        }
        if let Some(user) = self.conversation.messages.last().filter(|m| m.is_user()) {
            self.conversation.unsynced.insert(user.id.clone());
        }
    }

    /// Finish a turn whose future was dropped mid-stream
    pub(crate) fn recover_abandoned_turn(&mut self) {
        if self.conversation.is_streaming() && !self.handle.is_running() {
            tracing::debug!("Recovering abandoned turn");
            self.discard_turn();
            self.set_status(ChatStatus::Idle);
        }
    }

    pub(crate) fn ensure_idle(&self) -> Result<()> {
        if self.conversation.is_streaming() {
            return Err(self.report(Error::Busy));
        }
        Ok(())
    }

    async fn create_chat(&mut self) -> Result<Chat> {
        let chat = Chat::new(self.config.owner_id.clone(), None);
        let chat = self
            .store
            .create_chat(chat)
            .await
            .map_err(|e| self.report(e.into()))?;
        tracing::info!("Created chat {}", chat.id);
        self.conversation.chat_id = Some(chat.id.clone());
        {
            let mut state = self.app_state.write();
            state.upsert_chat(chat.clone());
            state.set_current(Some(chat.id.clone()));
        }
        self.emit(ChatEvent::ChatCreated { chat: chat.clone() });
        Ok(chat)
    }

    /// Title the chat in the background after its first user message
    fn maybe_generate_title(&mut self) {
        let [first] = self.conversation.messages.as_slice() else {
            return;
        };
        if !first.is_user() {
            return;
        }
        let chat_id = first.chat_id.clone();
        let message = first.text();
        if message.trim().is_empty() {
            tracing::debug!("First message has no text; skipping title");
            return;
        }

        {
            let mut state = self.app_state.write();
            if state.chat(&chat_id).is_some_and(Chat::has_title) || !state.mark_titled(&chat_id) {
                return;
            }
        }

        let job = TitleJob {
            chat_id,
            message,
            service: Arc::clone(&self.titles),
            store: Arc::clone(&self.store),
            app_state: Arc::clone(&self.app_state),
            events: self.event_tx.clone(),
        };
        self.background.spawn(job.run());
    }

    // ---- Events ----

    pub(crate) fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn set_status(&mut self, status: ChatStatus) {
        self.conversation.status = status;
        self.emit(ChatEvent::StatusChanged { status });
    }

    pub(crate) fn emit_sync_state(&self) {
        self.emit(ChatEvent::SyncChanged {
            unsynced: self.conversation.unsynced_ids(),
        });
    }

    /// Broadcast an error as a notification and hand it back
    pub(crate) fn report(&self, error: Error) -> Error {
        self.emit(ChatEvent::Notice(Notification::from(&error)));
        error
    }

    pub(crate) fn index_of(&self, id: &MessageId) -> Result<usize> {
        self.conversation
            .position(id)
            .ok_or_else(|| Error::validation(format!("Message {} not found", id)))
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOp;
    use crate::testing::{Harness, Script, TEST_MODEL, failure, reply};
    use prism_ai::Part;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_creates_chat_and_persists_turn() {
        let mut h = Harness::new();
        h.transport.push(reply("Hi there"));

        h.session.submit("  hello  ", vec![]).await.unwrap();

        let chat_id = h.chat_id();
        assert_eq!(h.store.calls(StoreOp::CreateChat), 1);
        assert_eq!(h.texts(), vec!["hello", "Hi there"]);
        assert_eq!(h.session.status(), ChatStatus::Idle);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 1);
        assert_eq!(requests[0][0].text(), "hello");

        let stored = h.store.messages(&chat_id);
        assert_eq!(stored, h.session.messages());
        assert_eq!(stored[1].model_used.as_deref(), Some(TEST_MODEL));
        assert!(h.session.conversation().unsynced.is_empty());

        let state = h.session.app_state();
        assert_eq!(state.read().current_chat_id(), Some(&chat_id));

        let events = h.drain();
        assert!(matches!(events[0], ChatEvent::ChatCreated { .. }));
        assert!(events.iter().any(|e| matches!(e, ChatEvent::TurnFinished { .. })));
    }

    #[tokio::test]
    async fn test_first_message_is_titled_once() {
        let mut h = Harness::new();
        h.titles.push(Ok("\"Greeting the model\"".into()));

        h.session.submit("hello", vec![]).await.unwrap();
        h.session.settle().await;
        h.session.submit("and again", vec![]).await.unwrap();
        h.session.settle().await;

        let chat_id = h.chat_id();
        assert_eq!(h.titles.calls(), vec![("hello".to_string(), chat_id.clone())]);
        assert_eq!(
            h.store.chat(&chat_id).unwrap().title.as_deref(),
            Some("Greeting the model")
        );
        let state = h.session.app_state();
        assert_eq!(
            state.read().chat(&chat_id).unwrap().display_title(),
            "Greeting the model"
        );
        assert!(h.drain().iter().any(|e| matches!(
            e,
            ChatEvent::TitleUpdated { title, .. } if title == "Greeting the model"
        )));
    }

    #[tokio::test]
    async fn test_manual_rename_beats_pending_title() {
        let mut h = Harness::new();
        let release = h.titles.hold();
        h.titles.push(Ok("Generated".into()));

        h.session.submit("hello", vec![]).await.unwrap();
        let chat_id = h.chat_id();
        h.session.rename_chat(&chat_id, "Mine").await.unwrap();
        release.send(()).unwrap();
        h.session.settle().await;

        assert_eq!(h.titles.calls().len(), 1);
        assert_eq!(h.store.chat(&chat_id).unwrap().title.as_deref(), Some("Mine"));
        let state = h.session.app_state();
        assert_eq!(state.read().chat(&chat_id).unwrap().display_title(), "Mine");
        assert!(!h.drain().iter().any(|e| matches!(
            e,
            ChatEvent::TitleUpdated { title, .. } if title == "Generated"
        )));
    }

    #[tokio::test]
    async fn test_title_failure_is_a_warning_only() {
        let mut h = Harness::new();
        h.titles.push(Err(prism_ai::Error::from_status(500, "boom")));

        h.session.submit("hello", vec![]).await.unwrap();
        h.session.settle().await;

        let chat_id = h.chat_id();
        assert_eq!(h.session.messages().len(), 2);
        assert!(h.store.chat(&chat_id).unwrap().title.is_none());
        assert!(h.drain().iter().any(|e| matches!(
            e,
            ChatEvent::Notice(n) if n.level == crate::NotificationLevel::Warning
        )));
    }

    #[tokio::test]
    async fn test_attachment_only_submit() {
        let mut h = Harness::new();
        let attachments = vec![
            Attachment::committed("diagram.png", "https://files/diagram.png", 512, "image/png"),
            Attachment::committed("notes.pdf", "https://files/notes.pdf", 2048, "application/pdf"),
        ];

        h.session.submit("", attachments.clone()).await.unwrap();
        h.session.settle().await;

        let user = &h.session.messages()[0];
        assert!(user.parts.is_empty());
        assert_eq!(user.attachments, attachments);
        assert_eq!(h.transport.requests()[0][0].attachments.len(), 2);
        assert!(h.titles.calls().is_empty());

        let stored = h.store.messages(&h.chat_id());
        assert_eq!(stored.len(), 2);
        assert!(stored[0].parts.is_empty());
        assert_eq!(stored[0].attachments.len(), 2);
        assert_eq!(stored[0].attachments[1].mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_empty_submit_is_rejected_without_side_effects() {
        let mut h = Harness::new();

        let err = h.session.submit("   ", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(h.store.calls(StoreOp::CreateChat), 0);
        assert_eq!(h.transport.request_count(), 0);
        assert!(h.session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_uncommitted_attachment_is_rejected() {
        let mut h = Harness::new();
        let attachment = Attachment::pending("big.pdf", 10, "application/pdf");

        let err = h.session.submit("see file", vec![attachment]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_reasoning_then_text() {
        let mut h = Harness::new();
        h.transport.push(Script::Events(vec![
            StreamEvent::ReasoningDelta("Let me think".into()),
            StreamEvent::TextDelta("The answer".into()),
            StreamEvent::TextDelta(" is 4".into()),
            StreamEvent::Finish {
                model: "resolved/model".into(),
            },
        ]));

        h.session.submit("2+2?", vec![]).await.unwrap();

        let assistant = &h.session.messages()[1];
        assert_eq!(
            assistant.parts,
            vec![Part::reasoning("Let me think"), Part::text("The answer is 4")]
        );
        assert_eq!(assistant.model_used.as_deref(), Some("resolved/model"));

        let updates: Vec<_> = h
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::StreamUpdate { parts, .. } => Some(parts),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], vec![Part::reasoning("Let me think")]);
    }

    #[tokio::test]
    async fn test_stream_error_discards_reply_and_keeps_user_message() {
        let mut h = Harness::new();
        h.transport.push(failure("upstream exploded"));

        let err = h.session.submit("hello", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m == "upstream exploded"));

        assert_eq!(h.texts(), vec!["hello"]);
        assert!(h.session.conversation().pending.is_none());
        assert_eq!(h.session.status(), ChatStatus::Idle);
        let user_id = h.session.messages()[0].id.clone();
        assert!(!h.session.conversation().is_synced(&user_id));

        let events = h.drain();
        let statuses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::StatusChanged { status } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![ChatStatus::Streaming, ChatStatus::Error, ChatStatus::Idle]
        );
        assert!(events.iter().any(|e| matches!(e, ChatEvent::TurnDiscarded { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ChatEvent::InputRestored { text, .. } if text == "hello"
        )));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let mut h = Harness::new();
        h.transport
            .push(Script::FailToOpen(prism_ai::Error::from_status(401, "")));

        let err = h.session.submit("hello", vec![]).await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(h.session.status(), ChatStatus::Idle);
        assert!(h.drain().iter().any(|e| matches!(
            e,
            ChatEvent::Notice(n) if n.title == "Sign in required"
        )));
    }

    #[tokio::test]
    async fn test_chat_creation_failure_restores_input() {
        let mut h = Harness::new();
        h.store.fail_next(StoreOp::CreateChat, 1);
        let attachment = Attachment::committed("a.txt", "u", 1, "text/plain");

        let err = h.session.submit("hello", vec![attachment]).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(h.session.chat_id().is_none());
        assert!(h.session.messages().is_empty());
        assert!(h.session.conversation().pending_input.is_none());
        assert_eq!(h.transport.request_count(), 0);
        assert!(h.drain().iter().any(|e| matches!(
            e,
            ChatEvent::InputRestored { text, attachments } if text == "hello" && attachments.len() == 1
        )));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_is_silent() {
        let mut h = Harness::new();
        h.transport
            .push(Script::Hang(vec![StreamEvent::TextDelta("part".into())]));

        let handle = h.session.handle();
        let mut rx = h.session.subscribe();
        let canceller = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if matches!(event, ChatEvent::StreamUpdate { .. }) {
                    handle.cancel();
                    handle.cancel();
                    break;
                }
            }
        });

        h.session.submit("hello", vec![]).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(h.texts(), vec!["hello"]);
        assert_eq!(h.session.status(), ChatStatus::Idle);
        assert!(!h.session.handle().is_running());
        assert!(!h.drain().iter().any(|e| matches!(e, ChatEvent::Notice(_))));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_does_not_poison_next_turn() {
        let mut h = Harness::new();
        h.session.cancel();
        h.session.cancel();

        h.session.submit("hello", vec![]).await.unwrap();
        h.session.cancel();
        h.session.cancel();
        h.session.submit("again", vec![]).await.unwrap();

        assert_eq!(h.session.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_user_write_failure_skips_assistant_write() {
        let mut h = Harness::new();
        h.session.submit("first", vec![]).await.unwrap();
        let chat_id = h.chat_id();
        let writes_before = h.store.calls(StoreOp::AppendMessage);

        h.store.fail_next(StoreOp::AppendMessage, 1);
        let err = h.session.submit("second", vec![]).await.unwrap_err();

        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(h.session.status(), ChatStatus::Idle);
        assert_eq!(h.session.messages().len(), 4);
        assert_eq!(h.store.calls(StoreOp::AppendMessage), writes_before + 1);
        assert_eq!(h.session.conversation().unsynced_ids().len(), 2);
        assert_eq!(h.store.messages(&chat_id).len(), 2);

        let written = h.session.resync().await.unwrap();
        assert_eq!(written, 2);
        assert!(h.session.conversation().unsynced.is_empty());
        assert_eq!(h.store.messages(&chat_id), h.session.messages());
    }

    #[tokio::test]
    async fn test_assistant_write_failure_marks_only_reply() {
        let mut h = Harness::new();
        h.store.fail_after(StoreOp::AppendMessage, 1, 1);

        let err = h.session.submit("hello", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));

        let messages = h.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            h.session.conversation().unsynced_ids(),
            vec![messages[1].id.clone()]
        );
        assert_eq!(h.store.messages(&h.chat_id()).len(), 1);
        assert!(h.drain().iter().any(|e| matches!(e, ChatEvent::SyncChanged { unsynced } if unsynced.len() == 1)));
    }

    #[tokio::test]
    async fn test_busy_while_streaming() {
        let mut h = Harness::new();
        h.session.submit("hello", vec![]).await.unwrap();

        let (_token, _guard) = h.session.handle.begin_turn();
        h.session.conversation.status = ChatStatus::Streaming;

        let err = h.session.submit("again", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_one_stream_at_a_time() {
        let mut h = Harness::new();
        for i in 0..3 {
            h.session.submit(&format!("message {}", i), vec![]).await.unwrap();
        }
        assert_eq!(h.transport.request_count(), 3);
        assert_eq!(h.transport.max_active(), 1);
    }

    #[tokio::test]
    async fn test_dropped_turn_is_recovered() {
        let mut h = Harness::new();
        h.transport
            .push(Script::Hang(vec![StreamEvent::TextDelta("never finished".into())]));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), h.session.submit("hello", vec![]))
                .await
                .is_err();
        assert!(timed_out);
        assert_eq!(h.session.status(), ChatStatus::Streaming);
        assert!(!h.session.handle().is_running());

        h.transport.push(reply("second try"));
        h.session.submit("hello again", vec![]).await.unwrap();

        assert_eq!(h.texts(), vec!["hello", "hello again", "second try"]);
        assert_eq!(h.session.status(), ChatStatus::Idle);
    }

    #[tokio::test]
    async fn test_open_chat_hydrates_and_sets_current() {
        let mut h = Harness::new();
        let ids = h.open_seeded(Some("Stored"), 4).await;

        assert_eq!(h.session.messages().len(), 4);
        assert_eq!(h.session.messages()[3].id, ids[3]);
        let state = h.session.app_state();
        assert_eq!(state.read().current_chat().unwrap().display_title(), "Stored");
    }

    #[tokio::test]
    async fn test_open_missing_chat() {
        let mut h = Harness::new();
        let err = h.session.open_chat(&ChatId::from("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::ChatNotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_and_delete_chat() {
        let mut h = Harness::new();
        h.open_seeded(None, 2).await;
        let chat_id = h.chat_id();

        h.session.rename_chat(&chat_id, "  Renamed  ").await.unwrap();
        assert_eq!(h.store.chat(&chat_id).unwrap().title.as_deref(), Some("Renamed"));
        assert!(h.session.app_state().read().is_titled(&chat_id));

        assert!(matches!(
            h.session.rename_chat(&chat_id, " ").await,
            Err(Error::Validation(_))
        ));

        h.session.delete_chat(&chat_id).await.unwrap();
        assert!(h.session.chat_id().is_none());
        assert!(h.session.messages().is_empty());
        assert_eq!(h.store.chat_count(), 0);
        assert!(h.session.app_state().read().chats().is_empty());
    }

    #[tokio::test]
    async fn test_load_chats_updates_app_state() {
        let mut h = Harness::new();
        h.session.submit("one", vec![]).await.unwrap();
        h.session.new_chat();
        h.session.submit("two", vec![]).await.unwrap();

        let chats = h.session.load_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(h.session.app_state().read().chats().len(), 2);
    }
}
