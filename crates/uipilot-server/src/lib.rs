//! # uipilot server
//!
//! Local request/response server for the uipilot automation engine.
//!
//! ## Overview
//!
//! A client connects to the Unix socket, writes one JSON request, shuts down
//! its write half and reads one JSON response. Requests are serialized behind
//! a single lock and run on the blocking pool, since every tree walk, wait and
//! gesture in the engine blocks.
//!
//! ## Configuration
//!
//! - Global config: `~/.config/uipilot/config.toml`
//! - Project config: `.uipilot/config.toml`
//! - Environment: `UIPILOT_SOCKET`, `UIPILOT_HISTORY_SIZE`, `UIPILOT_MAX_REQUEST_BYTES`

pub mod config;
pub mod dispatcher;
pub mod history;
pub mod protocol;
pub mod server;
pub mod transport;

pub use config::{ConfigError, OpDefaults, ServerConfig, TablesConfig};
pub use dispatcher::Dispatcher;
pub use history::{History, HistoryEntry};
pub use protocol::{Op, Response};
pub use server::Server;
pub use transport::Connection;

use std::path::PathBuf;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another server is already listening on {0}")]
    AlreadyRunning(PathBuf),

    #[error("Request exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("Request is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
