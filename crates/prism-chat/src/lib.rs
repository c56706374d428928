//! prism-chat: client-side streaming chat state machine
//!
//! This crate keeps an optimistic local message list in step with a streamed
//! model response and a durable message store, and implements the edit,
//! retry, delete and branch mutations on top of it.

pub mod app_state;
pub mod conversation;
pub mod draft;
pub mod error;
pub mod events;
pub mod handle;
mod mutations;
pub mod session;
pub mod store;
pub mod title;
pub mod transport;

#[cfg(test)]
mod testing;

pub use app_state::{AppState, SharedAppState};
pub use conversation::{ChatStatus, Conversation};
pub use draft::Draft;
pub use error::{Error, Result};
pub use events::{ChatEvent, Notification, NotificationLevel};
pub use handle::ChatHandle;
pub use session::{ChatConfig, ChatSession};
pub use store::{MemoryStore, MessageStore, MirroredStore, StoreError};
pub use title::{TitleService, normalize_title};
pub use transport::ChatTransport;
