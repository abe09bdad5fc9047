//! # Server configuration
//!
//! ## Configuration Sources (in priority order)
//!
//! 1. Environment variables (`UIPILOT_*` prefix)
//! 2. Project-level config (`.uipilot/config.toml`)
//! 3. Global config (`~/.config/uipilot/config.toml`)
//! 4. Default values
//!
//! ## Example
//!
//! ```toml
//! socket_path = "/run/user/1000/uipilot/ui.sock"
//! history_size = 50
//!
//! [defaults]
//! tree_max_nodes = 800
//! wait_timeout_ms = 5000
//!
//! [tables.alternates]
//! "org.telegram.messenger" = ["org.telegram.plus"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uipilot_core::{ConfirmPreference, FindMode, LaunchTables, OverlayRules};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Per-op defaults applied when a request omits a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpDefaults {
    pub tree_max_nodes: i64,
    pub max_nodes: i64,
    pub find_mode: FindMode,
    pub find_timeout_ms: i64,
    pub action_timeout_ms: i64,
    pub wait_timeout_ms: i64,
    pub open_app_timeout_ms: i64,
    pub handle_confirm_dialog: bool,
    pub preferred_confirm: ConfirmPreference,
}

impl Default for OpDefaults {
    fn default() -> Self {
        Self {
            tree_max_nodes: 500,
            max_nodes: 1500,
            find_mode: FindMode::First,
            find_timeout_ms: 0,
            action_timeout_ms: 0,
            wait_timeout_ms: 10_000,
            open_app_timeout_ms: 10_000,
            handle_confirm_dialog: true,
            preferred_confirm: ConfirmPreference::Always,
        }
    }
}

/// Data tables consulted by root selection and app launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default)]
    pub overlay: OverlayRules,
    #[serde(flatten)]
    pub launch: LaunchTables,
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("uipilot")
        .join("ui.sock")
}

fn default_max_request_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_history_size() -> usize {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unix socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Upper bound on a single request body
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Number of request/response pairs kept for `history`
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    #[serde(default)]
    pub defaults: OpDefaults,

    #[serde(default)]
    pub tables: TablesConfig,

    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_request_bytes: default_max_request_bytes(),
            history_size: default_history_size(),
            defaults: OpDefaults::default(),
            tables: TablesConfig::default(),
            loaded_from: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = config.merge_from_file(&global_path)?;
            }
        }

        if let Some(project_path) = Self::project_config_path() {
            if project_path.exists() {
                debug!("Loading project config from {:?}", project_path);
                config = config.merge_from_file(&project_path)?;
            }
        }

        config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.loaded_from = Some(path.to_path_buf());
        Ok(config)
    }

    /// Merge configuration from a file. Whole sections present in the file
    /// replace ours.
    pub fn merge_from_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let raw: toml::Table = toml::from_str(&content)?;
        let file_config: Self = toml::from_str(&content)?;

        if raw.contains_key("socket_path") {
            self.socket_path = file_config.socket_path;
        }
        if raw.contains_key("max_request_bytes") {
            self.max_request_bytes = file_config.max_request_bytes;
        }
        if raw.contains_key("history_size") {
            self.history_size = file_config.history_size;
        }
        if raw.contains_key("defaults") {
            self.defaults = file_config.defaults;
        }
        if raw.contains_key("tables") {
            self.tables = file_config.tables;
        }
        self.loaded_from = Some(path.to_path_buf());

        Ok(self)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(socket) = std::env::var("UIPILOT_SOCKET") {
            if !socket.is_empty() {
                self.socket_path = PathBuf::from(socket);
            }
        }

        if let Ok(size) = std::env::var("UIPILOT_HISTORY_SIZE") {
            if let Ok(parsed) = size.parse() {
                self.history_size = parsed;
            }
        }

        if let Ok(bytes) = std::env::var("UIPILOT_MAX_REQUEST_BYTES") {
            if let Ok(parsed) = bytes.parse() {
                self.max_request_bytes = parsed;
            }
        }

        self
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        std::fs::write(path, content)?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializationError(e.to_string()))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("uipilot").join("config.toml"))
    }

    pub fn project_config_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|d| d.join(".uipilot").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_request_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_request_bytes must be greater than 0".to_string(),
            ));
        }
        if self.history_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "history_size must be greater than 0".to_string(),
            ));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig("socket_path is empty".to_string()));
        }
        Ok(())
    }
}

/// Milliseconds from the wire, negatives meaning "no wait".
pub fn millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
