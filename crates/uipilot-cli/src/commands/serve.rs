//! # Serve Command
//!
//! Run the protocol server until interrupted.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uipilot_core::{EventHub, MemorySource};
use uipilot_server::{Dispatcher, Server, ServerConfig};

pub async fn run(config: ServerConfig, fixture: Option<PathBuf>) -> anyhow::Result<()> {
    let dispatcher = match fixture {
        Some(path) => {
            let source = MemorySource::load(&path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?;
            let hub = Arc::new(EventHub::new());
            let source = Arc::new(source);
            source.attach_events(Arc::clone(&hub));
            info!("serving fixture {}", path.display());
            Dispatcher::connect(source, hub, &config)
        }
        None => {
            warn!("no node source attached; only ping and history will succeed");
            Dispatcher::<MemorySource>::disconnected(&config)
        }
    };

    let server = Server::new(config, dispatcher);
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.notify_one();
        }
    });

    server.run().await?;
    Ok(())
}
