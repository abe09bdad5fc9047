//! # uipilot CLI
//!
//! Runs the protocol daemon and sends one-shot requests to it.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose. Logs go to stderr so `send` output stays clean.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(&cli)?;

    match cli.command {
        Commands::Serve { fixture } => {
            commands::serve::run(config, fixture).await?;
        }
        Commands::Send { request, pretty } => {
            commands::send::run(&config, request, pretty).await?;
        }
        Commands::Config { paths } => {
            commands::config::run(&config, paths)?;
        }
    }

    Ok(())
}
