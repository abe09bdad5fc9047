//! Unix socket server for the uipilot protocol.

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::protocol::Response;
use crate::transport::Connection;
use crate::{Result, ServerError};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};
use uipilot_core::{ErrorCode, NodeSource, PackageHost};

/// The protocol server.
pub struct Server<S> {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher<S>>,
    lock: Arc<Mutex<()>>,
    shutdown: Arc<Notify>,
}

impl<S> Server<S>
where
    S: NodeSource + PackageHost + 'static,
{
    pub fn new(config: ServerConfig, dispatcher: Dispatcher<S>) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            lock: Arc::new(Mutex::new(())),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get the shutdown notifier (for external shutdown signaling).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<S>> {
        &self.dispatcher
    }

    /// Accept connections until the shutdown handle is notified.
    pub async fn run(&self) -> Result<()> {
        let path = &self.config.socket_path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Remove a stale socket file, but never a live server's
        if path.exists() {
            if UnixStream::connect(path).await.is_ok() {
                return Err(ServerError::AlreadyRunning(path.clone()));
            }
            debug!("removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
            path: path.clone(),
            source,
        })?;
        info!("uipilot server listening on {}", path.display());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let session = Session {
                                dispatcher: Arc::clone(&self.dispatcher),
                                lock: Arc::clone(&self.lock),
                                limit: self.config.max_request_bytes,
                            };
                            tokio::spawn(async move {
                                if let Err(e) = session.serve(stream).await {
                                    warn!("connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(path);
        info!("server stopped");
        Ok(())
    }
}

/// Per-connection state.
struct Session<S> {
    dispatcher: Arc<Dispatcher<S>>,
    lock: Arc<Mutex<()>>,
    limit: usize,
}

impl<S> Session<S>
where
    S: NodeSource + PackageHost + 'static,
{
    async fn serve<C: Connection>(self, mut conn: C) -> Result<()> {
        let (raw, response) = match conn.read_request(self.limit).await {
            Ok(raw) => {
                let response = self.dispatch(raw.clone()).await;
                (raw, response)
            }
            Err(e) => {
                debug!("request read failed: {e}");
                (String::new(), Response::error(ErrorCode::ReadFailed, e.to_string()))
            }
        };

        let body = response.to_json();
        self.dispatcher.history().record(&raw, &body);
        conn.write_response(&body).await
    }

    /// Run the request on the blocking pool, one at a time.
    async fn dispatch(&self, raw: String) -> Response {
        let _guard = self.lock.lock().await;
        let dispatcher = Arc::clone(&self.dispatcher);
        match tokio::task::spawn_blocking(move || dispatcher.handle_raw(&raw)).await {
            Ok(response) => response,
            Err(e) => {
                error!("request handler failed: {e}");
                Response::error(ErrorCode::Exception, format!("handler failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::io::Builder;
    use uipilot_core::MemorySource;

    fn session(limit: usize) -> Session<MemorySource> {
        Session {
            dispatcher: Arc::new(Dispatcher::disconnected(&ServerConfig::default())),
            lock: Arc::new(Mutex::new(())),
            limit,
        }
    }

    #[tokio::test]
    async fn test_oversized_request_reports_read_failed() {
        let session = session(4);
        let history = Arc::clone(session.dispatcher.history());
        let expected = Response::error(ErrorCode::ReadFailed, "Request exceeds 4 bytes").to_json();
        let conn = Builder::new().read(b"01234").write(expected.as_bytes()).build();

        session.serve(conn).await.unwrap();

        let entries = history.recent();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request, "");
        assert_eq!(entries[0].response, expected);
    }

    #[tokio::test]
    async fn test_disconnected_source() {
        let session = session(1024);
        let response = session.dispatch(r#"{"op":"tree"}"#.to_string()).await;
        assert_eq!(response.error_code(), Some("SERVICE_DISABLED"));

        let response = session.dispatch(r#"{"op":"ping"}"#.to_string()).await;
        assert_eq!(response.into_value(), json!({"ok": true, "message": "pong"}));
    }
}
