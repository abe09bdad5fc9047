//! # Send Command
//!
//! One request, one response.

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use uipilot_server::ServerConfig;

pub async fn run(config: &ServerConfig, request: Option<String>, pretty: bool) -> anyhow::Result<()> {
    let body = match request {
        Some(body) => body,
        None => {
            let mut body = String::new();
            tokio::io::stdin().read_to_string(&mut body).await?;
            body
        }
    };

    let socket = &config.socket_path;
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("failed to connect to {}", socket.display()))?;
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await?;

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await?;
    let response: Value = serde_json::from_str(&raw).context("server sent invalid JSON")?;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{response}");
    }

    if response.get("ok").and_then(Value::as_bool) != Some(true) {
        std::process::exit(1);
    }
    Ok(())
}
