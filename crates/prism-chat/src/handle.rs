//! Stopping a session's stream from outside the session.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// Cloneable access to the running turn of a [`ChatSession`].
///
/// The session holds `&mut self` while a turn streams, so a presenter (a
/// ctrl-c handler, a stop button) uses this instead.
///
/// [`ChatSession`]: crate::ChatSession
#[derive(Clone, Default)]
pub struct ChatHandle {
    turn: Arc<Mutex<CancellationToken>>,
    streaming: Arc<AtomicBool>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stop the current stream. Does nothing when no turn is running.
    pub fn cancel(&self) {
        self.turn.lock().cancel();
    }

    /// Whether a turn is driving a stream right now
    pub fn is_running(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Start a turn with a fresh token.
    ///
    /// A cancel issued before this call does not reach the new turn. The guard
    /// clears the running flag on drop, also when the turn's future is dropped.
    pub(crate) fn begin_turn(&self) -> (CancellationToken, TurnGuard) {
        let token = CancellationToken::new();
        *self.turn.lock() = token.clone();
        self.streaming.store(true, Ordering::Release);
        let guard = TurnGuard {
            streaming: Arc::clone(&self.streaming),
        };
        (token, guard)
    }
}

pub(crate) struct TurnGuard {
    streaming: Arc<AtomicBool>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::Release);
    }
}
