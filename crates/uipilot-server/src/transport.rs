//! One-shot request/response framing over a byte stream.
//!
//! The request runs until the peer shuts down its write half. The response is
//! written whole, then our write half is shut down.

use crate::{Result, ServerError};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[async_trait]
pub trait Connection: Send {
    /// Read the whole request, failing once it grows past `limit` bytes.
    async fn read_request(&mut self, limit: usize) -> Result<String>;

    /// Write the response and close our side.
    async fn write_response(&mut self, body: &str) -> Result<()>;
}

#[async_trait]
impl<T> Connection for T
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_request(&mut self, limit: usize) -> Result<String> {
        let mut buf = Vec::new();
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        (&mut *self).take(cap).read_to_end(&mut buf).await?;
        if buf.len() > limit {
            return Err(ServerError::RequestTooLarge(limit));
        }
        debug!(bytes = buf.len(), "request read");
        Ok(String::from_utf8(buf)?)
    }

    async fn write_response(&mut self, body: &str) -> Result<()> {
        self.write_all(body.as_bytes()).await?;
        self.flush().await?;
        self.shutdown().await?;
        Ok(())
    }
}
