//! Periodic `ping` keepalive (§4.5): each side emits `ping` at a configured
//! interval and declares the peer dead after `threshold` consecutive
//! unanswered pings.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use mcp_core::methods::request;
use mcp_core::Error;
use mcp_router::Router;

/// Keepalive tuning, negotiated on only if both peers advertise
/// `experimental.keepalive` (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveConfig {
    /// How often to send a `ping`.
    pub interval: Duration,
    /// How long to wait for a single `ping` reply before counting it as missed.
    pub reply_timeout: Duration,
    /// Consecutive missed pings before the connection is declared dead.
    pub threshold: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            reply_timeout: Duration::from_secs(10),
            threshold: 3,
        }
    }
}

/// A running keepalive loop. Dropping this (or calling [`Keepalive::stop`])
/// cancels the background task.
pub struct Keepalive {
    task: JoinHandle<()>,
    missed: Arc<AtomicU32>,
}

impl Keepalive {
    /// Spawns the ping loop against `router`. `on_timeout` is invoked once,
    /// from the keepalive task, after `threshold` consecutive pings go
    /// unanswered; the caller is expected to close the transport in response.
    pub fn spawn<F>(router: Arc<Router>, config: KeepaliveConfig, on_timeout: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        let missed = Arc::new(AtomicU32::new(0));
        let missed_for_task = Arc::clone(&missed);
        let task = tokio::spawn(async move {
            let mut on_timeout = Some(on_timeout);
            loop {
                tokio::time::sleep(config.interval).await;
                let result =
                    tokio::time::timeout(config.reply_timeout, router.call(request::PING, None))
                        .await;
                match result {
                    Ok(Ok(_)) => {
                        missed_for_task.store(0, Ordering::SeqCst);
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(error = %err, "ping reply was an error, not a missed ping");
                        missed_for_task.store(0, Ordering::SeqCst);
                    }
                    Err(_elapsed) => {
                        let count = missed_for_task.fetch_add(1, Ordering::SeqCst) + 1;
                        tracing::warn!(count, threshold = config.threshold, "ping unanswered");
                        if count >= config.threshold {
                            if let Some(cb) = on_timeout.take() {
                                cb(Error::KeepaliveTimeout { missed: count });
                            }
                            return;
                        }
                    }
                }
            }
        });
        Self { task, missed }
    }

    /// Consecutive unanswered pings since the last reply, for diagnostics.
    pub fn missed_count(&self) -> u32 {
        self.missed.load(Ordering::SeqCst)
    }

    /// Aborts the keepalive task.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_transport_memory::InMemoryTransport;
    use std::sync::atomic::AtomicBool;

    fn connected_pair() -> (Arc<Router>, Arc<Router>) {
        let (a, b) = InMemoryTransport::pair();
        let a = Router::new(Arc::new(a));
        let b = Router::new(Arc::new(b));
        a.spawn_read_loop();
        b.spawn_read_loop();
        (a, b)
    }

    #[tokio::test]
    async fn pings_answered_by_the_peer_never_time_out() {
        let (a, b) = connected_pair();
        let pong: Arc<dyn mcp_router::RequestHandler> = Arc::new(
            |_params: Option<serde_json::Value>, _cancel: mcp_router::CancelFlag| {
                Box::pin(async { Ok(serde_json::Value::Null) })
                    as futures::future::BoxFuture<'static, Result<serde_json::Value, mcp_core::message::RpcError>>
            },
        );
        b.set_request_handler(request::PING, pong);

        let fired = Arc::new(AtomicBool::new(false));
        let fired_for_cb = Arc::clone(&fired);
        let keepalive = Keepalive::spawn(
            a,
            KeepaliveConfig {
                interval: Duration::from_millis(20),
                reply_timeout: Duration::from_millis(50),
                threshold: 3,
            },
            move |_err| fired_for_cb.store(true, Ordering::SeqCst),
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(keepalive.missed_count(), 0);
        assert!(!fired.load(Ordering::SeqCst));
        keepalive.stop();
        let _ = b;
    }

    #[tokio::test]
    async fn unanswered_pings_trigger_keepalive_timeout_after_threshold() {
        // The peer's transport endpoint is kept alive but never replies, so
        // every ping simply elapses instead of being answered.
        let (lonely, _peer) = InMemoryTransport::pair();
        let lonely = Router::new(Arc::new(lonely));
        lonely.spawn_read_loop();

        let fired = Arc::new(AtomicBool::new(false));
        let fired_for_cb = Arc::clone(&fired);
        let keepalive = Keepalive::spawn(
            lonely,
            KeepaliveConfig {
                interval: Duration::from_millis(5),
                reply_timeout: Duration::from_millis(5),
                threshold: 2,
            },
            move |err| {
                assert!(matches!(err, Error::KeepaliveTimeout { .. }));
                fired_for_cb.store(true, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired.load(Ordering::SeqCst));
        keepalive.stop();
    }
}
