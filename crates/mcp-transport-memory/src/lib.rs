//! An in-memory [`Transport`] pair for tests and same-process peers (§4.2).
//!
//! `InMemoryTransport::pair()` returns two endpoints wired together by two
//! unbounded MPSC channels, one per direction. Neither endpoint touches
//! actual I/O, so this crate has no framing concerns — it exists purely to
//! let `mcp-router`/`mcp-session`/`mcp-client`/`mcp-server` tests drive a
//! real `Transport` implementation without a process boundary.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use mcp_core::{Error, Message, Result};
use mcp_transport::{Transport, TransportMetrics};

/// One end of an in-memory transport pair.
pub struct InMemoryTransport {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Message>>,
    metrics: mcp_transport::metrics::AtomicMetrics,
    closed: std::sync::atomic::AtomicBool,
}

impl InMemoryTransport {
    /// Creates two endpoints connected to each other: whatever endpoint A
    /// sends, endpoint B receives, and vice versa.
    pub fn pair() -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
        let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();

        let a = Self {
            outbound: a_to_b_tx,
            inbound: AsyncMutex::new(b_to_a_rx),
            metrics: mcp_transport::metrics::AtomicMetrics::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        let b = Self {
            outbound: b_to_a_tx,
            inbound: AsyncMutex::new(a_to_b_rx),
            metrics: mcp_transport::metrics::AtomicMetrics::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        };
        (a, b)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, message: Message) -> Result<()> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let approx_size = serde_json::to_vec(&message).map(|v| v.len()).unwrap_or(0);
        self.outbound
            .send(message)
            .map_err(|_| Error::TransportClosed)?;
        self.metrics.record_sent(approx_size);
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        let mut rx = self.inbound.lock().await;
        match rx.recv().await {
            Some(message) => {
                let approx_size = serde_json::to_vec(&message).map(|v| v.len()).unwrap_or(0);
                self.metrics.record_received(approx_size);
                Ok(message)
            }
            None => Err(Error::TransportClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_flow_in_both_directions() {
        let (a, b) = InMemoryTransport::pair();

        a.send(Message::notification("ping", None)).await.unwrap();
        let received = b.recv().await.unwrap();
        assert_eq!(received.method(), Some("ping"));

        b.send(Message::notification("pong", None)).await.unwrap();
        let received = a.recv().await.unwrap();
        assert_eq!(received.method(), Some("pong"));
    }

    #[tokio::test]
    async fn closing_one_side_fails_its_own_future_sends() {
        let (a, _b) = InMemoryTransport::pair();
        a.close().await.unwrap();
        assert!(!a.is_open());
        let err = a.send(Message::notification("ping", None)).await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    #[tokio::test]
    async fn dropping_the_peer_surfaces_transport_closed_on_recv() {
        let (a, b) = InMemoryTransport::pair();
        drop(b);
        let err = a.recv().await.unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    #[tokio::test]
    async fn metrics_track_sent_and_received_counts() {
        let (a, b) = InMemoryTransport::pair();
        a.send(Message::notification("ping", None)).await.unwrap();
        b.recv().await.unwrap();

        assert_eq!(a.metrics().messages_sent, 1);
        assert_eq!(b.metrics().messages_received, 1);
    }
}
