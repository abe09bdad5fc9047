//! # Commands
//!
//! Subcommand implementations for the uipilot CLI.

pub mod config;
pub mod send;
pub mod serve;

use crate::cli::Cli;
use anyhow::Context;
use uipilot_server::ServerConfig;

/// Effective configuration for this invocation.
pub fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = ServerConfig::load_from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
                .apply_env_overrides();
            config.validate()?;
            config
        }
        None => ServerConfig::load().context("failed to load configuration")?,
    };

    if let Some(socket) = &cli.socket {
        config.socket_path = socket.clone();
    }
    Ok(config)
}
