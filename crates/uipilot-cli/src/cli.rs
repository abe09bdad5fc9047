//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// uipilot - drive the foreground UI through its accessibility tree
#[derive(Parser, Debug)]
#[command(name = "uipilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket path (overrides config)
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Read configuration from this file instead of the usual locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the protocol server
    Serve {
        /// UI fixture (JSON tree dump or screen) to serve instead of a live host
        #[arg(short, long)]
        fixture: Option<PathBuf>,
    },

    /// Send one request and print the response
    Send {
        /// Request JSON; read from stdin when omitted
        request: Option<String>,
        /// Pretty-print the response
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the effective configuration
    Config {
        /// Also list the config file locations
        #[arg(long)]
        paths: bool,
    },
}
