//! Configuration file support

use prism_ai::ReasoningLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Configuration for prism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat backend
    pub server_url: String,
    /// Bearer token (falls back to PRISM_API_TOKEN)
    pub api_token: Option<String>,
    /// Default model id
    pub model: Option<String>,
    /// Default reasoning level (off, low, medium, high)
    pub reasoning_level: Option<String>,
    /// Owner recorded on chats created locally
    pub owner_id: String,
    /// Where chat files are kept
    pub data_dir: Option<PathBuf>,
    /// Regenerate after deleting a reply
    pub regenerate_after_delete: bool,
    /// Also truncate the backend's copy of a chat on edit, retry and delete
    pub mirror_deletes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            api_token: None,
            model: None,
            reasoning_level: None,
            owner_id: "local".to_string(),
            data_dir: None,
            regenerate_after_delete: true,
            mirror_deletes: false,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prism")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PRISM_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults when the file is
    /// missing or broken
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::read(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                Self::default()
            }
        }
    }

    fn read(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the example config if no file exists yet
    pub fn init() -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        let io_error = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        fs::write(&path, example_config()).map_err(io_error)?;
        Ok(path)
    }

    /// Token from the config file, then the environment
    pub fn api_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("PRISM_API_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Configured reasoning level; unknown names are ignored with a warning
    pub fn reasoning(&self) -> Option<ReasoningLevel> {
        let name = self.reasoning_level.as_deref()?;
        let level = ReasoningLevel::parse(name);
        if level.is_none() {
            tracing::warn!("Unknown reasoning level in config: {}", name);
        }
        level
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::store::JsonlStore::default_dir)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# prism configuration file
# Place at ~/.config/prism/config.toml (Linux/Mac) or %APPDATA%\prism\config.toml (Windows)

# Chat backend
server_url = "http://localhost:3000"

# Bearer token for the backend (or set PRISM_API_TOKEN)
# api_token = "..."

# Default model
model = "anthropic/claude-opus-4"

# Default reasoning level (off, low, medium, high)
reasoning_level = "medium"

# Owner recorded on chats created by this client
owner_id = "local"

# Where chats are stored (defaults to the local data directory)
# data_dir = "~/.local/share/prism/chats"

# Regenerate the reply after deleting one
regenerate_after_delete = true

# Also truncate the backend's copy of a chat when messages are removed
mirror_deletes = false
"#
}
