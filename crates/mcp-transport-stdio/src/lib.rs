//! [`Transport`] over the process's stdin/stdout, framed with `Content-Length`.
//!
//! Grounded on the teacher's `turbomcp-stdio::StdioTransport` interior
//! mutability pattern: a `tokio::sync::Mutex` guards each I/O stream (since
//! reading/writing crosses an `.await` point and a `std::sync::Mutex` cannot
//! be held there), while open/closed state uses a plain atomic. Framing
//! itself is delegated to `mcp_transport::framer`, since the teacher's own
//! framing (newline-delimited JSON) does not match this runtime's wire
//! format.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, Stdin, Stdout};
use tokio::sync::Mutex as AsyncMutex;

use mcp_core::{Error, Message, Result};
use mcp_transport::framer::{self, FramerConfig};
use mcp_transport::metrics::AtomicMetrics;
use mcp_transport::{Transport, TransportMetrics};

/// A [`Transport`] that frames MCP messages over the process's standard
/// streams. There is exactly one of these per process: stdin/stdout are
/// process-global, so constructing a second instance would race the first
/// for bytes.
pub struct StdioTransport {
    reader: AsyncMutex<BufReader<Stdin>>,
    writer: AsyncMutex<Stdout>,
    config: FramerConfig,
    metrics: AtomicMetrics,
    open: AtomicBool,
}

impl StdioTransport {
    /// Connects to the process's stdin/stdout with the default frame size
    /// limit.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Connects with a caller-supplied frame size limit.
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            reader: AsyncMutex::new(BufReader::new(tokio::io::stdin())),
            writer: AsyncMutex::new(tokio::io::stdout()),
            config,
            metrics: AtomicMetrics::new(),
            open: AtomicBool::new(true),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: Message) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let payload = serde_json::to_vec(&message)
            .map_err(|e| Error::Protocol(format!("failed to serialize message: {e}")))?;
        let mut writer = self.writer.lock().await;
        framer::write_frame(&mut *writer, &payload).await?;
        self.metrics.record_sent(payload.len());
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let mut reader = self.reader.lock().await;
        let frame = framer::read_frame(&mut *reader, &self.config).await?;
        let Some(payload) = frame else {
            self.open.store(false, Ordering::SeqCst);
            return Err(Error::TransportClosed);
        };
        self.metrics.record_received(payload.len());
        serde_json::from_slice(&payload)
            .map_err(|e| Error::Protocol(format!("failed to parse message: {e}")))
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

/// Exercises [`StdioTransport`]'s send/recv path against in-memory pipes
/// rather than the real process stdio handles, which can't be swapped out
/// from within a single test binary.
#[doc(hidden)]
pub struct PipeTransport<R, W> {
    reader: AsyncMutex<BufReader<R>>,
    writer: AsyncMutex<W>,
    config: FramerConfig,
    metrics: AtomicMetrics,
    open: AtomicBool,
}

impl<R, W> PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: AsyncMutex::new(BufReader::new(reader)),
            writer: AsyncMutex::new(writer),
            config: FramerConfig::default(),
            metrics: AtomicMetrics::new(),
            open: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl<R, W> Transport for PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn send(&self, message: Message) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let payload = serde_json::to_vec(&message)
            .map_err(|e| Error::Protocol(format!("failed to serialize message: {e}")))?;
        let mut writer = self.writer.lock().await;
        framer::write_frame(&mut *writer, &payload).await?;
        self.metrics.record_sent(payload.len());
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let mut reader = self.reader.lock().await;
        let frame = framer::read_frame(&mut *reader, &self.config).await?;
        let Some(payload) = frame else {
            self.open.store(false, Ordering::SeqCst);
            return Err(Error::TransportClosed);
        };
        self.metrics.record_received(payload.len());
        serde_json::from_slice(&payload)
            .map_err(|e| Error::Protocol(format!("failed to parse message: {e}")))
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_notification_over_a_pipe() {
        let (client_io, server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);

        let client = PipeTransport::new(client_read, client_write);
        let server = PipeTransport::new(server_read, server_write);

        client.send(Message::notification("ping", None)).await.unwrap();
        let received = server.recv().await.unwrap();
        assert_eq!(received.method(), Some("ping"));
        assert_eq!(server.metrics().messages_received, 1);
        assert_eq!(client.metrics().messages_sent, 1);
    }

    #[tokio::test]
    async fn recv_after_close_returns_transport_closed() {
        let (client_io, server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let client = PipeTransport::new(client_read, client_write);
        let server = PipeTransport::new(server_read, server_write);

        client.close().await.unwrap();
        assert!(!client.is_open());
        let err = client.send(Message::notification("ping", None)).await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
        drop(server);
    }

    #[tokio::test]
    async fn peer_disconnect_surfaces_as_transport_closed() {
        let (client_io, server_io) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);
        let client = PipeTransport::new(client_read, client_write);
        let server = PipeTransport::new(server_read, server_write);

        drop(client);
        let err = server.recv().await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }
}
