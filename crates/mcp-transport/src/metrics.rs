//! Lock-free transport metrics, grounded in the teacher's `AtomicMetrics`
//! pattern (counters updated without ever holding a mutex across an await).

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of a transport's activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportMetrics {
    /// Total messages successfully sent.
    pub messages_sent: u64,
    /// Total messages successfully received.
    pub messages_received: u64,
    /// Total bytes written to the underlying stream.
    pub bytes_sent: u64,
    /// Total bytes read from the underlying stream.
    pub bytes_received: u64,
}

/// Lock-free counters a transport updates as it sends/receives.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl AtomicMetrics {
    /// Creates a zeroed counter set.
    pub const fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Records one successfully sent message of `bytes` length.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records one successfully received message of `bytes` length.
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot (each field is read independently;
    /// counters only ever increase, so this is safe for monitoring purposes).
    pub fn snapshot(&self) -> TransportMetrics {
        TransportMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = AtomicMetrics::new();
        m.record_sent(10);
        m.record_sent(5);
        m.record_received(20);
        let snap = m.snapshot();
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.bytes_sent, 15);
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.bytes_received, 20);
    }
}
