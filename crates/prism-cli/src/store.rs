//! JSONL file store for chats and messages
//!
//! Each chat lives in `<dir>/<chat-id>.jsonl`. The first line holds the chat
//! record; every later line is a change (message upsert, rename, truncation)
//! and the current state is rebuilt by replaying them in order.

use async_trait::async_trait;
use parking_lot::Mutex;
use prism_ai::{Chat, ChatId, DeletedMessages, Message};
use prism_chat::store::{MessageStore, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One line of a chat file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatEntry {
    /// Chat record, always the first line
    Metadata { chat: Chat },
    /// Insert or replace a message by id
    Message { message: Message, timestamp: i64 },
    Rename { title: String, timestamp: i64 },
    /// Drop every message from `from_index` on
    Truncate { from_index: usize, timestamp: i64 },
}

/// A chat file replayed into its current state
struct ChatLog {
    chat: Chat,
    messages: Vec<Message>,
}

impl ChatLog {
    fn apply(&mut self, entry: ChatEntry) {
        match entry {
            ChatEntry::Metadata { chat } => self.chat = chat,
            ChatEntry::Message { message, .. } => {
                match self.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => *existing = message,
                    None => self.messages.push(message),
                }
            }
            ChatEntry::Rename { title, .. } => self.chat.title = Some(title),
            ChatEntry::Truncate { from_index, .. } => self.messages.truncate(from_index),
        }
    }
}

/// A [`MessageStore`] backed by one append-only JSONL file per chat
pub struct JsonlStore {
    dir: PathBuf,
    /// Serializes writers so appended lines never interleave
    lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Default location under the user's local data directory
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prism")
            .join("chats")
    }

    /// File for a chat. Ids come from the command line too, so anything that
    /// could leave the store directory is refused.
    fn chat_path(&self, chat_id: &ChatId) -> StoreResult<PathBuf> {
        let id = chat_id.as_str();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidChatId(chat_id.clone()));
        }
        Ok(self.dir.join(format!("{}.jsonl", id)))
    }

    fn read_log(path: &Path) -> StoreResult<Option<ChatLog>> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        let mut log: Option<ChatLog> = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = match serde_json::from_str::<ChatEntry>(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable line in {}: {}", path.display(), e);
                    continue;
                }
            };
            match log.as_mut() {
                Some(log) => log.apply(entry),
                None => match entry {
                    ChatEntry::Metadata { chat } => {
                        log = Some(ChatLog {
                            chat,
                            messages: Vec::new(),
                        });
                    }
                    _ => {
                        return Err(StoreError::Other(format!(
                            "{} does not start with a chat record",
                            path.display()
                        )));
                    }
                },
            }
        }
        Ok(log)
    }

    fn load(&self, chat_id: &ChatId) -> StoreResult<ChatLog> {
        Self::read_log(&self.chat_path(chat_id)?)?
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.clone()))
    }

    fn append(&self, chat_id: &ChatId, entry: &ChatEntry) -> StoreResult<()> {
        let path = self.chat_path(chat_id)?;
        if !path.exists() {
            return Err(StoreError::ChatNotFound(chat_id.clone()));
        }
        let file = File::options().append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        writer.flush()?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl MessageStore for JsonlStore {
    async fn create_chat(&self, chat: Chat) -> StoreResult<Chat> {
        let _guard = self.lock.lock();
        let file = File::create(self.chat_path(&chat.id)?)?;
        let mut writer = BufWriter::new(file);
        let entry = ChatEntry::Metadata { chat: chat.clone() };
        writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
        writer.flush()?;
        tracing::debug!("Created chat file for {}", chat.id);
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &ChatId) -> StoreResult<Option<Chat>> {
        let _guard = self.lock.lock();
        Ok(Self::read_log(&self.chat_path(chat_id)?)?.map(|log| log.chat))
    }

    async fn list_chats(&self, owner_id: &str) -> StoreResult<Vec<Chat>> {
        let _guard = self.lock.lock();
        let mut chats = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }
            match Self::read_log(&path) {
                Ok(Some(log)) if log.chat.owner_id == owner_id => chats.push(log.chat),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping chat file {}: {}", path.display(), e),
            }
        }
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn rename_chat(&self, chat_id: &ChatId, title: &str) -> StoreResult<()> {
        let _guard = self.lock.lock();
        self.append(
            chat_id,
            &ChatEntry::Rename {
                title: title.to_string(),
                timestamp: now_millis(),
            },
        )
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> StoreResult<()> {
        let _guard = self.lock.lock();
        let path = self.chat_path(chat_id)?;
        if !path.exists() {
            return Err(StoreError::ChatNotFound(chat_id.clone()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    async fn load_messages(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        let _guard = self.lock.lock();
        Ok(self.load(chat_id)?.messages)
    }

    async fn append_message(&self, message: &Message) -> StoreResult<()> {
        let _guard = self.lock.lock();
        self.append(
            &message.chat_id,
            &ChatEntry::Message {
                message: message.clone(),
                timestamp: now_millis(),
            },
        )
    }

    async fn delete_messages_from_index(
        &self,
        chat_id: &ChatId,
        index: usize,
    ) -> StoreResult<DeletedMessages> {
        let _guard = self.lock.lock();
        let log = self.load(chat_id)?;
        if log.messages.is_empty() {
            return Err(StoreError::NoMessages(chat_id.clone()));
        }
        if index >= log.messages.len() {
            return Ok(DeletedMessages::default());
        }

        self.append(
            chat_id,
            &ChatEntry::Truncate {
                from_index: index,
                timestamp: now_millis(),
            },
        )?;
        let deleted_ids: Vec<_> = log.messages[index..].iter().map(|m| m.id.clone()).collect();
        Ok(DeletedMessages {
            deleted_count: deleted_ids.len(),
            deleted_ids,
        })
    }
}
