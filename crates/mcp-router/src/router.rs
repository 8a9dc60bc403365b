//! The Router (C4): JSON-RPC request/response correlation, notification
//! dispatch, and cancellation, grounded on the teacher's
//! `turbomcp-client::dispatcher::MessageDispatcher` — one background task
//! pulling messages off the transport, a `response_waiters` map of
//! `Id -> oneshot::Sender`, and pluggable request/notification handler
//! tables.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use mcp_core::methods::notification;
use mcp_core::{error::rpc, Error, Id, IdGenerator, Message, Result};
use mcp_transport::Transport;

use crate::handler::{CancelFlag, NotificationHandler, RequestHandler};
use crate::pending::{PendingEntry, PendingResult};
use crate::progress::ProgressUpdate;

/// Snapshot of the router's activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterMetrics {
    pub requests_sent: u64,
    pub requests_received: u64,
    pub notifications_received: u64,
    pub responses_received: u64,
    pub cancellations: u64,
}

#[derive(Default)]
struct AtomicRouterMetrics {
    requests_sent: AtomicU64,
    requests_received: AtomicU64,
    notifications_received: AtomicU64,
    responses_received: AtomicU64,
    cancellations: AtomicU64,
}

impl AtomicRouterMetrics {
    fn snapshot(&self) -> RouterMetrics {
        RouterMetrics {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Owns one connection's JSON-RPC state machine.
///
/// Construct with [`Router::new`], call [`Router::spawn_read_loop`] once to
/// start pulling inbound messages, then use [`Router::call`] /
/// [`Router::notify`] to drive outbound traffic and
/// [`Router::set_request_handler`] / [`Router::set_notification_handler`] to
/// answer inbound traffic.
pub struct Router {
    transport: Arc<dyn Transport>,
    id_gen: IdGenerator,
    pending: Mutex<HashMap<Id, PendingEntry>>,
    inbound_cancel_flags: Mutex<HashMap<Id, CancelFlag>>,
    request_handlers: Mutex<HashMap<String, Arc<dyn RequestHandler>>>,
    notification_handlers: Mutex<HashMap<String, Arc<dyn NotificationHandler>>>,
    progress_sinks: Mutex<HashMap<String, mpsc::UnboundedSender<ProgressUpdate>>>,
    metrics: AtomicRouterMetrics,
}

impl Router {
    /// Builds a router over `transport`. Call [`Router::spawn_read_loop`]
    /// separately to start dispatching — kept apart from construction so
    /// callers can register handlers first without racing the read loop.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            id_gen: IdGenerator::new(),
            pending: Mutex::new(HashMap::new()),
            inbound_cancel_flags: Mutex::new(HashMap::new()),
            request_handlers: Mutex::new(HashMap::new()),
            notification_handlers: Mutex::new(HashMap::new()),
            progress_sinks: Mutex::new(HashMap::new()),
            metrics: AtomicRouterMetrics::default(),
        })
    }

    /// The transport this router dispatches over, for callers that need to
    /// close it directly (e.g. a keepalive timeout).
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Starts the single read task that owns `transport.recv()`. Per §4.2's
    /// concurrency contract, only this task ever calls `recv`.
    pub fn spawn_read_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move { router.read_loop().await })
    }

    async fn read_loop(self: Arc<Self>) {
        loop {
            match self.transport.recv().await {
                Ok(message) => self.dispatch(message),
                Err(err) => {
                    tracing::debug!(error = %err, "router read loop ending");
                    self.fail_all_pending(err.clone());
                    if err.is_connection_fatal() {
                        return;
                    }
                }
            }
        }
    }

    fn dispatch(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response { id, result } => {
                self.metrics.responses_received.fetch_add(1, Ordering::Relaxed);
                self.complete_pending(&id, PendingResult::Reply(Ok(result)));
            }
            Message::ResponseError { id, error } => {
                self.metrics.responses_received.fetch_add(1, Ordering::Relaxed);
                self.complete_pending(&id, PendingResult::Reply(Err(error)));
            }
            Message::Request { id, method, params } => {
                self.metrics.requests_received.fetch_add(1, Ordering::Relaxed);
                self.spawn_inbound_request(id, method, params);
            }
            Message::Notification { method, params } => {
                self.metrics.notifications_received.fetch_add(1, Ordering::Relaxed);
                self.handle_notification(method, params);
            }
        }
    }

    fn complete_pending(&self, id: &Id, outcome: PendingResult) {
        let entry = self.pending.lock().unwrap().remove(id);
        match entry {
            Some(entry) => {
                let _ = entry.sink.send(outcome);
            }
            None => tracing::debug!(%id, "response for unknown or already-resolved request id"),
        }
    }

    fn fail_all_pending(&self, err: Error) {
        let mut pending = self.pending.lock().unwrap();
        for (_, entry) in pending.drain() {
            let _ = entry.sink.send(PendingResult::Failed(err.clone()));
        }
    }

    fn spawn_inbound_request(self: &Arc<Self>, id: Id, method: String, params: Option<Value>) {
        let cancel_flag: CancelFlag = self
            .inbound_cancel_flags
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        let router = self.clone();
        let span = tracing::info_span!("rpc_dispatch", method = %method, id = %id);
        tokio::spawn(
            async move {
                let reply = if cancel_flag.load(Ordering::Relaxed) {
                    Message::error(id.clone(), rpc::request_cancelled(&id))
                } else {
                    let handler = router.request_handlers.lock().unwrap().get(&method).cloned();
                    let outcome = match handler {
                        Some(handler) => handler.handle(params, cancel_flag.clone()).await,
                        None => Err(rpc::method_not_found(&method)),
                    };

                    if cancel_flag.load(Ordering::Relaxed) {
                        // A late result is discarded: the caller already moved on.
                        Message::error(id.clone(), rpc::request_cancelled(&id))
                    } else {
                        match outcome {
                            Ok(result) => Message::success(id.clone(), result),
                            Err(error) => Message::error(id.clone(), error),
                        }
                    }
                };

                router.inbound_cancel_flags.lock().unwrap().remove(&id);
                if let Err(e) = router.transport.send(reply).await {
                    tracing::warn!(error = %e, %id, "failed to send reply");
                }
            }
            .instrument(span),
        );
    }

    fn handle_notification(self: &Arc<Self>, method: String, params: Option<Value>) {
        if method == notification::CANCEL_REQUEST {
            self.handle_cancel_notification(params, "id");
            return;
        }
        if method == notification::CANCELLED {
            self.handle_cancel_notification(params, "requestId");
            return;
        }
        if method == notification::PROGRESS {
            self.handle_progress_notification(params);
            return;
        }

        let handler = self.notification_handlers.lock().unwrap().get(&method).cloned();
        if let Some(handler) = handler {
            tokio::spawn(async move { handler.handle(params).await });
        } else {
            tracing::debug!(method, "no handler registered for notification");
        }
    }

    /// Flips the cancel flag for the inbound request named by `params[key]`.
    /// Shared by `$/cancelRequest` (internal control message, key `id`) and
    /// the wire-level `notifications/cancelled` (key `requestId`) — both
    /// carry the same information, just under the name each convention uses.
    fn handle_cancel_notification(&self, params: Option<Value>, key: &str) {
        let Some(id) = params.as_ref().and_then(|p| p.get(key)).and_then(parse_id) else {
            tracing::debug!(key, "cancellation notification missing a valid id");
            return;
        };
        self.metrics.cancellations.fetch_add(1, Ordering::Relaxed);
        if let Some(flag) = self.inbound_cancel_flags.lock().unwrap().get(&id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    fn handle_progress_notification(&self, params: Option<Value>) {
        let Some(params) = params else { return };
        let Ok(update) = serde_json::from_value::<ProgressUpdate>(params) else {
            tracing::debug!("malformed notifications/progress payload");
            return;
        };
        let sinks = self.progress_sinks.lock().unwrap();
        if let Some(sink) = sinks.get(&update.progress_token) {
            let _ = sink.send(update);
        }
    }

    /// Registers (or replaces) the handler for inbound requests of `method`.
    pub fn set_request_handler(&self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.request_handlers.lock().unwrap().insert(method.into(), handler);
    }

    /// Registers (or replaces) the handler for inbound notifications of `method`.
    pub fn set_notification_handler(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.notification_handlers.lock().unwrap().insert(method.into(), handler);
    }

    /// Sends a one-way notification; there is no reply to await.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        self.transport.send(Message::notification(method, params)).await
    }

    /// Sends a request and awaits its reply, with no progress relay or timeout.
    pub async fn call(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        let method = method.into();
        let span = tracing::info_span!("rpc_call", method = %method, id = tracing::field::Empty);
        async move {
            let (id, rx) = self.start_call(method, params, None).await?;
            tracing::Span::current().record("id", tracing::field::display(&id));
            Self::finish_call(rx.await)
        }
        .instrument(span)
        .await
    }

    /// Sends a request, relaying any `notifications/progress` updates whose
    /// `progressToken` matches this call onto `progress`.
    pub async fn call_with_progress(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<Value> {
        let method = method.into();
        let span = tracing::info_span!("rpc_call", method = %method, id = tracing::field::Empty);
        async move {
            let (id, rx) = self.start_call(method, params, Some(progress)).await?;
            tracing::Span::current().record("id", tracing::field::display(&id));
            let result = Self::finish_call(rx.await);
            self.progress_sinks.lock().unwrap().remove(&id.to_string());
            result
        }
        .instrument(span)
        .await
    }

    /// Sends a request and fails it with [`Error::Timeout`] — emitting
    /// `$/cancelRequest` to the peer — if no reply arrives within `timeout`.
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let method = method.into();
        let span = tracing::info_span!("rpc_call", method = %method, id = tracing::field::Empty);
        async move { self.call_with_timeout_inner(method, params, timeout).await }
            .instrument(span)
            .await
    }

    async fn call_with_timeout_inner(
        &self,
        method: String,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let (id, rx) = self.start_call(method, params, None).await?;
        tracing::Span::current().record("id", tracing::field::display(&id));
        match tokio::time::timeout(timeout, rx).await {
            Ok(outcome) => Self::finish_call(outcome),
            Err(_elapsed) => {
                self.cancel(&id).await;
                Err(Error::Timeout)
            }
        }
    }

    /// Externally cancels an in-flight outbound request: flips its cancel
    /// flag, resolves the local waiter with [`Error::Cancelled`] without
    /// waiting for a late reply, and tells the peer via both the internal
    /// `$/cancelRequest` control message and the wire-level
    /// `notifications/cancelled {requestId}` (§6) so a standards-conformant
    /// peer — one that doesn't know about `$/cancelRequest` — still learns
    /// the request was abandoned.
    pub async fn cancel(&self, id: &Id) {
        if let Some(entry) = self.pending.lock().unwrap().remove(id) {
            entry.cancel_flag.store(true, Ordering::Relaxed);
            let _ = entry.sink.send(PendingResult::Cancelled);
        }
        if let Err(e) = self
            .notify(notification::CANCEL_REQUEST, Some(serde_json::json!({ "id": id })))
            .await
        {
            tracing::debug!(error = %e, %id, "failed to send internal cancellation notice");
        }
        if let Err(e) = self
            .notify(notification::CANCELLED, Some(serde_json::json!({ "requestId": id })))
            .await
        {
            tracing::debug!(error = %e, %id, "failed to send notifications/cancelled");
        }
    }

    async fn start_call(
        &self,
        method: impl Into<String>,
        mut params: Option<Value>,
        progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    ) -> Result<(Id, oneshot::Receiver<PendingResult>)> {
        let id = self.id_gen.next();
        let (tx, rx) = oneshot::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        if let Some(sink) = progress {
            let token = id.to_string();
            attach_progress_token(&mut params, &token);
            self.progress_sinks.lock().unwrap().insert(token, sink);
        }

        self.pending.lock().unwrap().insert(
            id.clone(),
            PendingEntry {
                sink: tx,
                cancel_flag,
            },
        );

        let message = Message::request(id.clone(), method, params);
        if let Err(e) = self.transport.send(message).await {
            self.pending.lock().unwrap().remove(&id);
            return Err(e);
        }
        self.metrics.requests_sent.fetch_add(1, Ordering::Relaxed);
        Ok((id, rx))
    }

    fn finish_call(outcome: std::result::Result<PendingResult, oneshot::error::RecvError>) -> Result<Value> {
        match outcome {
            Ok(PendingResult::Reply(Ok(value))) => Ok(value),
            Ok(PendingResult::Reply(Err(error))) => Err(Error::from_rpc_error(error)),
            Ok(PendingResult::Cancelled) => Err(Error::Cancelled),
            Ok(PendingResult::Failed(error)) => Err(error),
            Err(_) => Err(Error::Internal(
                "pending request dropped without a reply".to_string(),
            )),
        }
    }

    /// Returns a snapshot of this router's activity counters.
    pub fn metrics(&self) -> RouterMetrics {
        self.metrics.snapshot()
    }
}

fn attach_progress_token(params: &mut Option<Value>, token: &str) {
    let mut object = match params.take() {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    let meta = object
        .entry("_meta")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(meta_map) = meta {
        meta_map.insert("progressToken".to_string(), Value::String(token.to_string()));
    }
    *params = Some(Value::Object(object));
}

fn parse_id(value: &Value) -> Option<Id> {
    if let Some(n) = value.as_i64() {
        return Some(Id::Number(n));
    }
    value.as_str().map(Id::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_core::message::RpcError;
    use mcp_transport_memory::InMemoryTransport;
    use std::sync::atomic::Ordering as StdOrdering;

    struct Echo;

    #[async_trait::async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, params: Option<Value>, _cancel: CancelFlag) -> std::result::Result<Value, RpcError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct NeverResponds;

    #[async_trait::async_trait]
    impl RequestHandler for NeverResponds {
        async fn handle(&self, _params: Option<Value>, cancel: CancelFlag) -> std::result::Result<Value, RpcError> {
            loop {
                if cancel.load(StdOrdering::Relaxed) {
                    return Err(rpc::request_cancelled(&Id::Number(-1)));
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    fn connected_pair() -> (Arc<Router>, Arc<Router>) {
        let (a, b) = InMemoryTransport::pair();
        let client = Router::new(Arc::new(a));
        let server = Router::new(Arc::new(b));
        client.spawn_read_loop();
        server.spawn_read_loop();
        (client, server)
    }

    #[tokio::test]
    async fn call_reaches_its_handler_and_returns_the_result() {
        let (client, server) = connected_pair();
        server.set_request_handler("echo", Arc::new(Echo));

        let result = client.call("echo", Some(serde_json::json!({"hello": "world"}))).await.unwrap();
        assert_eq!(result, serde_json::json!({"hello": "world"}));
        assert_eq!(client.metrics().requests_sent, 1);
        assert_eq!(server.metrics().requests_received, 1);
    }

    #[tokio::test]
    async fn unregistered_method_replies_method_not_found() {
        let (client, server) = connected_pair();
        let _ = server;
        let err = client.call("nope", None).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotFound(_)));
    }

    #[tokio::test]
    async fn notifications_are_dispatched_without_a_reply() {
        let (client, server) = connected_pair();
        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen_clone = seen.clone();

        struct Flag(Arc<std::sync::atomic::AtomicBool>);
        #[async_trait::async_trait]
        impl NotificationHandler for Flag {
            async fn handle(&self, _params: Option<Value>) {
                self.0.store(true, StdOrdering::Relaxed);
            }
        }
        server.set_notification_handler("ping", Arc::new(Flag(seen_clone)));

        client.notify("ping", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.load(StdOrdering::Relaxed));
    }

    #[tokio::test]
    async fn cancelled_notification_flips_the_remote_handlers_cancel_flag() {
        let (client, server) = connected_pair();
        server.set_request_handler("stuck", Arc::new(NeverResponds));

        let (id, _rx) = client.start_call("stuck", None, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Send the wire-level `notifications/cancelled` directly, bypassing
        // the internal `$/cancelRequest` control message entirely, to prove
        // this notification alone is enough to flip the handler's cancel
        // flag (the scenario `cancel()` itself also triggers via both).
        client
            .transport()
            .send(Message::notification(
                notification::CANCELLED,
                Some(serde_json::json!({ "requestId": id })),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let flagged = server
            .inbound_cancel_flags
            .lock()
            .unwrap()
            .get(&id)
            .map(|f| f.load(StdOrdering::Relaxed));
        assert_eq!(flagged, Some(true));
    }

    #[tokio::test]
    async fn timeout_cancels_the_in_flight_request() {
        let (client, server) = connected_pair();
        server.set_request_handler("stuck", Arc::new(NeverResponds));

        let result = client
            .call_with_timeout("stuck", None, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn progress_updates_are_relayed_to_the_caller() {
        let (client, server) = connected_pair();

        struct Progress;
        #[async_trait::async_trait]
        impl RequestHandler for Progress {
            async fn handle(&self, params: Option<Value>, _cancel: CancelFlag) -> std::result::Result<Value, RpcError> {
                let token = params
                    .as_ref()
                    .and_then(|p| p.get("_meta"))
                    .and_then(|m| m.get("progressToken"))
                    .and_then(|t| t.as_str())
                    .unwrap()
                    .to_string();
                Ok(serde_json::json!({"token": token}))
            }
        }
        server.set_request_handler("track", Arc::new(Progress));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = client.call_with_progress("track", None, tx).await.unwrap();
        assert!(result.get("token").is_some());
        // No progress notifications were actually sent in this test, so the
        // channel should simply have no pending items.
        assert!(rx.try_recv().is_err());
    }
}
