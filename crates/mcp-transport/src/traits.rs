//! The narrow transport capability trait (§4.2).
//!
//! Grounded on the teacher's `turbomcp-transport-traits::Transport` trait:
//! one small `async_trait` interface every concrete transport implements,
//! rather than a deep hierarchy of transport base classes.

use async_trait::async_trait;

use mcp_core::{Message, Result};

use crate::metrics::TransportMetrics;

/// A bidirectional, message-oriented channel that moves [`Message`] values
/// between peers.
///
/// Implementations own framing and I/O; callers never see raw bytes.
/// `send`/`recv` may be called concurrently from different tasks as long as
/// the implementation documents its own serialization discipline — stdio and
/// HTTP transports serialize writes behind a single writer lock, in-memory
/// transports use an MPSC channel, per §4.2.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message. Returns once the message has been handed to the
    /// underlying stream (not necessarily acknowledged by the peer).
    async fn send(&self, message: Message) -> Result<()>;

    /// Waits for and returns the next inbound message.
    ///
    /// Returns [`mcp_core::Error::TransportClosed`] once the peer has closed
    /// the connection and no further messages will arrive.
    async fn recv(&self) -> Result<Message>;

    /// Initiates an orderly shutdown. Idempotent: closing an already-closed
    /// transport is not an error.
    async fn close(&self) -> Result<()>;

    /// Reports whether the transport is still able to send and receive.
    fn is_open(&self) -> bool;

    /// Returns a snapshot of this transport's activity counters.
    fn metrics(&self) -> TransportMetrics;
}
