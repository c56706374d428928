//! Streaming event types and utilities

use crate::types::{Part, PartKind};
use std::pin::Pin;
use tokio_stream::Stream;

/// Why a stream failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No valid session; the presenter should prompt for sign-in
    Auth,
    /// Network failure, non-2xx status, or a broken stream
    Transport,
}

/// Events emitted while a response streams in
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Answer text delta
    TextDelta(String),
    /// Reasoning text delta
    ReasoningDelta(String),
    /// Response completed; carries the model the backend resolved to
    Finish { model: String },
    /// Response failed
    Error { kind: FailureKind, message: String },
    /// Response was cancelled by the caller
    Abort,
}

impl StreamEvent {
    /// Check if this is a terminal event (Finish, Error or Abort)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Finish { .. } | StreamEvent::Error { .. } | StreamEvent::Abort
        )
    }

    /// Build the terminal event for a transport error
    pub fn failure(error: &crate::Error) -> Self {
        let kind = if error.is_auth() {
            FailureKind::Auth
        } else {
            FailureKind::Transport
        };
        StreamEvent::Error {
            kind,
            message: error.to_string(),
        }
    }
}

/// A stream of response events. Ends after the first terminal event.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Accumulates streamed deltas into an ordered list of parts.
///
/// Only the last part is ever open. A delta of a different kind seals it and
/// opens a new part, so earlier parts never change once sealed.
#[derive(Debug, Default, Clone)]
pub struct PartsBuilder {
    parts: Vec<Part>,
    open: bool,
}

impl PartsBuilder {
    /// Create a new parts builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append answer text
    pub fn push_text(&mut self, delta: &str) {
        self.push(PartKind::Text, delta);
    }

    /// Append reasoning text
    pub fn push_reasoning(&mut self, delta: &str) {
        self.push(PartKind::Reasoning, delta);
    }

    /// Process a streaming event. Returns `true` if the parts changed.
    pub fn process_event(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::TextDelta(delta) if !delta.is_empty() => {
                self.push_text(delta);
                true
            }
            StreamEvent::ReasoningDelta(delta) if !delta.is_empty() => {
                self.push_reasoning(delta);
                true
            }
            StreamEvent::Finish { .. } => {
                self.seal();
                false
            }
            _ => false,
        }
    }

    /// Seal the open part; the next delta always opens a new one
    pub fn seal(&mut self) {
        self.open = false;
    }

    /// Get the current partial state
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of parts that can no longer change
    pub fn sealed_len(&self) -> usize {
        if self.open {
            self.parts.len() - 1
        } else {
            self.parts.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Seal everything and hand back the parts
    pub fn finish(mut self) -> Vec<Part> {
        self.seal();
        self.parts
    }

    fn push(&mut self, kind: PartKind, delta: &str) {
        if delta.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(last) if self.open && last.kind() == kind => last.push_str(delta),
            _ => {
                self.parts.push(match kind {
                    PartKind::Text => Part::text(delta),
                    PartKind::Reasoning => Part::reasoning(delta),
                });
                self.open = true;
            }
        }
    }
}
