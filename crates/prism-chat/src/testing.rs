//! Scripted collaborators shared by the session tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use prism_ai::{
    Chat, ChatEventStream, ChatId, FailureKind, GenerationConfig, Message, MessageId, Part,
    StreamEvent,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    ChatConfig, ChatEvent, ChatSession, MemoryStore, MessageStore, TitleService,
    transport::ChatTransport,
};

pub(crate) const TEST_MODEL: &str = "test/model";

/// What the transport does for one request
pub(crate) enum Script {
    /// Yield these events, then end
    Events(Vec<StreamEvent>),
    /// Yield these events, then wait for cancellation
    Hang(Vec<StreamEvent>),
    /// Fail before any stream exists
    FailToOpen(prism_ai::Error),
}

pub(crate) fn reply(text: &str) -> Script {
    Script::Events(vec![
        StreamEvent::TextDelta(text.to_string()),
        StreamEvent::Finish {
            model: TEST_MODEL.to_string(),
        },
    ])
}

pub(crate) fn failure(message: &str) -> Script {
    Script::Events(vec![
        StreamEvent::TextDelta("partial".to_string()),
        StreamEvent::Error {
            kind: FailureKind::Transport,
            message: message.to_string(),
        },
    ])
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transport that plays back queued scripts and records every request
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Vec<Message>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    /// Histories sent so far, one per request
    pub(crate) fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn stream(
        &self,
        _chat_id: &ChatId,
        messages: Vec<Message>,
        _config: &GenerationConfig,
        cancel: CancellationToken,
    ) -> prism_ai::Result<ChatEventStream> {
        self.requests.lock().push(messages);
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| reply("ok"));

        let (events, hang) = match script {
            Script::Events(events) => (events, false),
            Script::Hang(events) => (events, true),
            Script::FailToOpen(e) => return Err(e),
        };

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for event in events {
                yield event;
            }
            if hang {
                cancel.cancelled().await;
                yield StreamEvent::Abort;
            }
        }))
    }
}

/// Title service returning queued results
#[derive(Default)]
pub(crate) struct ScriptedTitles {
    results: Mutex<VecDeque<prism_ai::Result<String>>>,
    calls: Mutex<Vec<(String, ChatId)>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedTitles {
    pub(crate) fn push(&self, result: prism_ai::Result<String>) {
        self.results.lock().push_back(result);
    }

    pub(crate) fn calls(&self) -> Vec<(String, ChatId)> {
        self.calls.lock().clone()
    }

    /// Hold the next title until the returned sender fires or is dropped
    pub(crate) fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }
}

#[async_trait]
impl TitleService for ScriptedTitles {
    async fn generate_title(&self, message: &str, chat_id: &ChatId) -> prism_ai::Result<String> {
        self.calls.lock().push((message.to_string(), chat_id.clone()));
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("Generated Title".to_string()))
    }
}

pub(crate) struct Harness {
    pub session: ChatSession,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub titles: Arc<ScriptedTitles>,
    pub events: broadcast::Receiver<ChatEvent>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::default());
        let titles = Arc::new(ScriptedTitles::default());
        let session = ChatSession::new(
            ChatConfig::default(),
            store.clone(),
            transport.clone(),
            titles.clone(),
        );
        let events = session.subscribe();
        Self {
            session,
            store,
            transport,
            titles,
            events,
        }
    }

    /// Store a chat with `count` alternating user/assistant messages and open it
    pub(crate) async fn open_seeded(&mut self, title: Option<&str>, count: usize) -> Vec<MessageId> {
        let chat = self
            .store
            .create_chat(Chat::new("local", title.map(str::to_string)))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let message = if i % 2 == 0 {
                Message::user(chat.id.clone(), format!("question {}", i), vec![])
            } else {
                let mut m = Message::assistant(chat.id.clone());
                m.parts = vec![Part::text(format!("answer {}", i))];
                m.model_used = Some(TEST_MODEL.to_string());
                m
            };
            ids.push(message.id.clone());
            self.store.append_message(&message).await.unwrap();
        }
        self.session.open_chat(&chat.id).await.unwrap();
        self.drain();
        ids
    }

    pub(crate) fn chat_id(&self) -> ChatId {
        self.session.chat_id().cloned().unwrap()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.session.messages().iter().map(|m| m.text()).collect()
    }

    /// Events received since the last drain
    pub(crate) fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
