// ABOUTME: Application configuration loaded from a TOML file with built-in defaults
// Covers host endpoints, persistence debounce, and channel reconnection settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failures loading or saving `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this config.
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The file or its directory could not be written.
    #[error("Failed to write config: {0}")]
    Write(#[from] std::io::Error),

    /// The config could not be serialized.
    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Contents of `config.toml`. Missing sections and keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[host]` section.
    pub host: HostConfig,
    /// `[editor]` section.
    pub editor: EditorConfig,
    /// `[channel]` section.
    pub channel: ChannelConfig,
}

/// `[host]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Base URL for tree and content round-trips
    pub http_url: String,
    /// WebSocket URL of the event channel
    pub socket_url: String,
    /// Upper bound on any single round-trip
    pub request_timeout_ms: u64,
}

/// `[editor]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Inactivity delay before an edited file is persisted
    pub persist_debounce_ms: u64,
}

/// `[channel]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Give up on a handshake after this long
    pub connect_timeout_ms: u64,
    /// Pause between reconnect attempts
    pub reconnect_interval_ms: u64,
    /// Consecutive failures before the loop gives up
    pub max_reconnect_attempts: u32,
    /// Keepalive ping period
    pub ping_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            http_url: "http://localhost:8000".to_string(),
            socket_url: "ws://localhost:8000/socket".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            persist_debounce_ms: 2_000,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            reconnect_interval_ms: 2_000,
            max_reconnect_attempts: 10,
            ping_interval_ms: 30_000,
        }
    }
}

impl HostConfig {
    /// `request_timeout_ms` as a duration.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl EditorConfig {
    /// `persist_debounce_ms` as a duration.
    pub const fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

impl ChannelConfig {
    /// `connect_timeout_ms` as a duration.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `reconnect_interval_ms` as a duration.
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// `ping_interval_ms` as a duration.
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

impl AppConfig {
    /// `~/.config/ide-session/config.toml` (platform equivalent elsewhere)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ide-session").join("config.toml"))
    }

    /// Load from `path`, or defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write the config as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
