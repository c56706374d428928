//! Line-mode rendering of session events

use prism_ai::{Message, MessageId, Part};
use prism_chat::{ChatEvent, Notification, NotificationLevel};
use std::io::{self, Write};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::utils::truncate_chars;

/// Prints events as they arrive.
///
/// Streaming updates carry the full parts of the pending message; only the
/// part of each that has not been printed yet is written.
pub struct Renderer<O: Write, E: Write> {
    out: O,
    err: E,
    streaming: Option<MessageId>,
    /// Chars already printed, per part
    printed: Vec<usize>,
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            streaming: None,
            printed: Vec::new(),
        }
    }

    pub fn render(&mut self, event: &ChatEvent) -> io::Result<()> {
        match event {
            ChatEvent::StreamUpdate { message_id, parts } => {
                if self.streaming.as_ref() != Some(message_id) {
                    self.streaming = Some(message_id.clone());
                    self.printed.clear();
                }
                self.render_parts(parts)?;
            }
            ChatEvent::TurnFinished { message } => {
                // A reply that arrived in one piece has not been printed yet
                if self.streaming.as_ref() != Some(&message.id) {
                    self.printed.clear();
                    self.render_parts(&message.parts)?;
                }
                self.end_stream();
                writeln!(self.out)?;
            }
            ChatEvent::TurnDiscarded { .. } => {
                if self.streaming.is_some() {
                    writeln!(self.out, "\n[reply discarded]")?;
                }
                self.end_stream();
            }
            ChatEvent::ChatOpened {
                chat_id: Some(_),
                messages,
            } => {
                for message in messages {
                    self.render_message(message)?;
                }
            }
            ChatEvent::ChatCreated { chat } if chat.branched_from.is_some() => {
                writeln!(
                    self.out,
                    "[created '{}'; use /chats to open it]",
                    chat.display_title()
                )?;
            }
            ChatEvent::MessageEdited { message } => {
                writeln!(self.out, "[edited] {}", truncate_chars(&message.text(), 60))?;
            }
            ChatEvent::Restored { messages } => {
                writeln!(self.out, "[restored {} messages]", messages.len())?;
            }
            ChatEvent::TitleUpdated { title, .. } => {
                writeln!(self.out, "[title: {}]", title)?;
            }
            ChatEvent::SyncChanged { unsynced } if !unsynced.is_empty() => {
                writeln!(
                    self.err,
                    "[{} message(s) not saved; use /resync to try again]",
                    unsynced.len()
                )?;
            }
            ChatEvent::Notice(notice) => self.render_notice(notice)?,
            _ => {}
        }
        self.out.flush()?;
        self.err.flush()
    }

    fn render_parts(&mut self, parts: &[Part]) -> io::Result<()> {
        for (i, part) in parts.iter().enumerate() {
            if i >= self.printed.len() {
                self.printed.push(0);
                match part {
                    Part::Reasoning { .. } => write!(self.out, "[thinking] ")?,
                    Part::Text { .. } if i > 0 => write!(self.out, "\n\n")?,
                    Part::Text { .. } => {}
                }
            }
            let body = match part {
                Part::Text { text } => text,
                Part::Reasoning { reasoning } => reasoning,
            };
            let new: String = body.chars().skip(self.printed[i]).collect();
            if !new.is_empty() {
                write!(self.out, "{}", new)?;
                self.printed[i] += new.chars().count();
            }
        }
        Ok(())
    }

    fn render_message(&mut self, message: &Message) -> io::Result<()> {
        let role = if message.is_user() { "you" } else { "assistant" };
        writeln!(self.out, "{}: {}", role, message.text())?;
        for attachment in &message.attachments {
            writeln!(self.out, "  [{}: {}]", attachment.name, attachment.url)?;
        }
        Ok(())
    }

    fn render_notice(&mut self, notice: &Notification) -> io::Result<()> {
        if self.streaming.is_some() {
            writeln!(self.out)?;
        }
        let prefix = match notice.level {
            NotificationLevel::Info => "",
            NotificationLevel::Warning => "Warning: ",
            NotificationLevel::Error => "Error: ",
        };
        writeln!(self.err, "{}{}: {}", prefix, notice.title, notice.description)
    }

    fn end_stream(&mut self) {
        self.streaming = None;
        self.printed.clear();
    }
}

/// Handle to a renderer running in its own task
pub struct RenderTask {
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RenderTask {
    /// Render events from `events` to stdout and stderr until the session goes away
    pub fn spawn(mut events: broadcast::Receiver<ChatEvent>) -> Self {
        let (flush_tx, mut flush_rx) = mpsc::channel::<oneshot::Sender<()>>(4);
        let task = tokio::spawn(async move {
            let mut renderer = Renderer::new(io::stdout(), io::stderr());
            loop {
                tokio::select! {
                    biased;
                    event = events.recv() => match event {
                        Ok(event) => {
                            if let Err(e) = renderer.render(&event) {
                                tracing::debug!("Render failed: {}", e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Renderer skipped {} events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    Some(ack) = flush_rx.recv() => {
                        while let Ok(event) = events.try_recv() {
                            if let Err(e) = renderer.render(&event) {
                                tracing::debug!("Render failed: {}", e);
                            }
                        }
                        let _ = ack.send(());
                    }
                }
            }
        });
        Self { flush_tx, task }
    }

    /// Wait until every event sent so far has been printed
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.flush_tx.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn abort(self) {
        self.task.abort();
    }
}
