//! Handler-registration server-side operations (C7, server role): composes
//! [`mcp_router::Router`], [`mcp_session::Session`], and an optional
//! [`mcp_validator::Validator`] into the operations a host program registers
//! — `onListTools`, `onCallTool`, `onReadResource`, and so on — plus the
//! side-channel emitters (`notifyResourceUpdated`, progress, log messages)
//! that don't originate from an inbound request.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use mcp_core::error::rpc;
use mcp_core::message::RpcError;
use mcp_core::methods::{notification, request};
use mcp_core::{Capabilities, Implementation, Result};
use mcp_router::{CancelFlag, ProgressUpdate, RequestHandler, Router};
use mcp_session::{EndpointConfig, Keepalive, KeepaliveConfig, Session};
use mcp_session::subscriptions::SubscriptionRegistry;
use mcp_transport::Transport;
use mcp_validator::{Direction, NoopValidator, ValidationMode, Validator};

/// One connection's worth of subscription identity. Point-to-point
/// connections (§1's Non-goals: "multi-peer fan-out" is out of scope here)
/// have exactly one peer, so this is a constant rather than a per-client id.
const PEER: &str = "peer";

/// The server side of one MCP connection.
pub struct Server {
    router: Arc<Router>,
    session: Arc<Session>,
    validator: Arc<dyn Validator>,
    validation_mode: ValidationMode,
    subscriptions: Arc<SubscriptionRegistry>,
    keepalive: AsyncMutex<Option<Keepalive>>,
}

impl Server {
    /// Builds a server with no payload validation (`ValidationMode::Off`).
    pub fn new(transport: Arc<dyn Transport>, info: Implementation, capabilities: Capabilities) -> Arc<Self> {
        Self::with_validator(transport, info, capabilities, Arc::new(NoopValidator), ValidationMode::Off)
    }

    /// Builds a server with an explicit validator and mode, applied to both
    /// inbound request params and outbound results before they're sent.
    pub fn with_validator(
        transport: Arc<dyn Transport>,
        info: Implementation,
        capabilities: Capabilities,
        validator: Arc<dyn Validator>,
        validation_mode: ValidationMode,
    ) -> Arc<Self> {
        let router = Router::new(transport);
        let session = Session::new_server(Arc::clone(&router), info, capabilities);
        let server = Arc::new(Self {
            router,
            session,
            validator,
            validation_mode,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            keepalive: AsyncMutex::new(None),
        });
        server.install_ping_handler();
        server.install_subscription_handlers();
        server
    }

    /// `ping` is answered even before the handshake completes (§4.5 exempts
    /// `initialize` and `ping` from the pre-initialize guard), so it is
    /// registered directly on the router rather than through [`Server::wrap`].
    fn install_ping_handler(self: &Arc<Self>) {
        let ping: Arc<dyn RequestHandler> = Arc::new(|_params: Option<Value>, _cancel: CancelFlag| {
            Box::pin(async move { Ok(Value::Null) })
                as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
        });
        self.router.set_request_handler(request::PING, ping);
    }

    /// Builds a server from an aggregate [`EndpointConfig`] (§6): constructs
    /// the configured transport, wires validation, and starts keepalive if
    /// configured. Caller must still register `on_*` handlers and call
    /// [`Server::run`].
    pub async fn from_config(config: EndpointConfig) -> Result<Arc<Self>> {
        let transport = config.transport.build()?;
        let server = Self::with_validator(
            transport,
            config.local_info,
            config.capabilities,
            config.validator,
            config.validation,
        );
        if let Some(keepalive_config) = config.keepalive {
            server.enable_keepalive(keepalive_config).await;
        }
        Ok(server)
    }

    /// Starts the read loop. Register every `on_*` handler first — handlers
    /// registered after this call may race the first inbound message.
    pub fn run(self: &Arc<Self>) {
        self.router.spawn_read_loop();
    }

    /// `true` once the client has completed the `initialize` handshake.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// The capability set negotiated during the handshake.
    pub fn negotiated_capabilities(&self) -> Option<Capabilities> {
        self.session.negotiated_capabilities()
    }

    /// Starts emitting `ping` at `config.interval`, closing the transport and
    /// logging if the peer misses `config.threshold` consecutive replies.
    pub async fn enable_keepalive(self: &Arc<Self>, config: KeepaliveConfig) {
        let router_for_timeout = Arc::clone(&self.router);
        let keepalive = Keepalive::spawn(Arc::clone(&self.router), config, move |err| {
            tracing::warn!(error = %err, "keepalive failed, closing transport");
            let transport = Arc::clone(router_for_timeout.transport());
            tokio::spawn(async move {
                if let Err(close_err) = transport.close().await {
                    tracing::debug!(error = %close_err, "transport close after keepalive timeout failed");
                }
            });
        });
        *self.keepalive.lock().await = Some(keepalive);
    }

    fn install_subscription_handlers(self: &Arc<Self>) {
        let for_subscribe = Arc::clone(self);
        let subscribe: Arc<dyn RequestHandler> = Arc::new(move |params: Option<Value>, _cancel: CancelFlag| {
            let server = Arc::clone(&for_subscribe);
            Box::pin(async move {
                let uri = extract_uri(&params)?;
                server.subscriptions.subscribe(&uri, PEER);
                Ok(serde_json::json!({}))
            }) as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
        });
        self.router
            .set_request_handler(request::RESOURCES_SUBSCRIBE, self.session.guard(subscribe));

        let for_unsubscribe = Arc::clone(self);
        let unsubscribe: Arc<dyn RequestHandler> = Arc::new(move |params: Option<Value>, _cancel: CancelFlag| {
            let server = Arc::clone(&for_unsubscribe);
            Box::pin(async move {
                let uri = extract_uri(&params)?;
                server.subscriptions.unsubscribe(&uri, PEER);
                Ok(serde_json::json!({}))
            }) as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
        });
        self.router
            .set_request_handler(request::RESOURCES_UNSUBSCRIBE, self.session.guard(unsubscribe));
    }

    fn wrap(self: &Arc<Self>, inner: Arc<dyn RequestHandler>) -> Arc<dyn RequestHandler> {
        let server = Arc::clone(self);
        self.session.guard(Arc::new(ValidatingHandler { server, inner }))
    }

    /// Registers the `tools/list` handler.
    pub fn on_list_tools(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::TOOLS_LIST, wrapped);
    }

    /// Registers the `tools/call` handler.
    pub fn on_call_tool(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::TOOLS_CALL, wrapped);
    }

    /// Registers the `prompts/list` handler.
    pub fn on_list_prompts(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::PROMPTS_LIST, wrapped);
    }

    /// Registers the `prompts/get` handler.
    pub fn on_get_prompt(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::PROMPTS_GET, wrapped);
    }

    /// Registers the `resources/list` handler.
    pub fn on_list_resources(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::RESOURCES_LIST, wrapped);
    }

    /// Registers the `resources/templates/list` handler.
    pub fn on_list_resource_templates(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router
            .set_request_handler(request::RESOURCES_TEMPLATES_LIST, wrapped);
    }

    /// Registers the `resources/read` handler. If `experimental.chunkedRead`
    /// was not negotiated, the params' `offset`/`length` should be ignored by
    /// the handler per §4.5; [`mcp_session::chunked::read_chunk`] is
    /// available to implementations that want to honor them.
    pub fn on_read_resource(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router.set_request_handler(request::RESOURCES_READ, wrapped);
    }

    /// Registers the `logging/setLevel` handler.
    pub fn on_set_log_level(self: &Arc<Self>, handler: Arc<dyn RequestHandler>) {
        let wrapped = self.wrap(handler);
        self.router
            .set_request_handler(request::LOGGING_SET_LEVEL, wrapped);
    }

    /// Issues a server-initiated `sampling/createMessage` request to the
    /// client and awaits its reply.
    pub async fn create_message(&self, params: Option<Value>) -> Result<Value> {
        self.router.call(request::SAMPLING_CREATE_MESSAGE, params).await
    }

    /// Emits `notifications/resources/updated {uri}` if the peer is
    /// currently subscribed to `uri`; a silent no-op otherwise.
    pub async fn notify_resource_updated(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        if self.subscriptions.is_subscribed(&uri, PEER) {
            self.router
                .notify(notification::RESOURCES_UPDATED, Some(serde_json::json!({ "uri": uri })))
                .await?;
        }
        Ok(())
    }

    /// Emits `notifications/resources/list_changed`.
    pub async fn notify_resources_list_changed(&self) -> Result<()> {
        self.router.notify(notification::RESOURCES_LIST_CHANGED, None).await
    }

    /// Emits `notifications/tools/list_changed`.
    pub async fn notify_tools_list_changed(&self) -> Result<()> {
        self.router.notify(notification::TOOLS_LIST_CHANGED, None).await
    }

    /// Emits `notifications/prompts/list_changed`.
    pub async fn notify_prompts_list_changed(&self) -> Result<()> {
        self.router.notify(notification::PROMPTS_LIST_CHANGED, None).await
    }

    /// Emits `notifications/message {level, data}` for structured log
    /// forwarding.
    pub async fn notify_log_message(&self, level: impl Into<String>, data: Value) -> Result<()> {
        self.router
            .notify(
                notification::MESSAGE,
                Some(serde_json::json!({ "level": level.into(), "data": data })),
            )
            .await
    }

    /// Emits a `notifications/progress` update bound to `progress_token`, for
    /// a handler that wants to report on a long-running operation.
    pub async fn emit_progress(&self, progress_token: impl Into<String>, progress: f64, total: Option<f64>) -> Result<()> {
        let update = ProgressUpdate {
            progress_token: progress_token.into(),
            progress,
            total,
        };
        self.router
            .notify(notification::PROGRESS, Some(serde_json::to_value(update)?))
            .await
    }

    /// Removes every subscription this connection's peer holds, e.g. when
    /// the underlying transport has closed.
    pub fn clear_subscriptions(&self) {
        self.subscriptions.remove_subscriber(PEER);
    }

    /// Direct access to the underlying router for request methods the typed
    /// surface doesn't cover.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

struct ValidatingHandler {
    server: Arc<Server>,
    inner: Arc<dyn RequestHandler>,
}

#[async_trait::async_trait]
impl RequestHandler for ValidatingHandler {
    async fn handle(&self, params: Option<Value>, cancel: CancelFlag) -> std::result::Result<Value, RpcError> {
        let payload = params.clone().unwrap_or(Value::Null);
        // The method name isn't threaded through the handler call; validators
        // that need it key off payload shape instead, or are registered per
        // handler by the embedding server (see DESIGN.md).
        self.server
            .validation_mode
            .apply(self.server.validator.as_ref(), "", Direction::Inbound, &payload)
            .map_err(|_| rpc::invalid_params("payload failed validation"))?;

        let result = self.inner.handle(params, cancel).await?;

        self.server
            .validation_mode
            .apply(self.server.validator.as_ref(), "", Direction::Outbound, &result)
            .map_err(|_| rpc::invalid_params("result failed validation"))?;
        Ok(result)
    }
}

fn extract_uri(params: &Option<Value>) -> std::result::Result<String, RpcError> {
    params
        .as_ref()
        .and_then(|p| p.get("uri"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| rpc::invalid_params("uri is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_client::Client;
    use mcp_transport_memory::InMemoryTransport;

    fn list_tools_handler() -> Arc<dyn RequestHandler> {
        Arc::new(|_params: Option<Value>, _cancel: CancelFlag| {
            Box::pin(async move { Ok(serde_json::json!({ "items": [] })) })
                as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
        })
    }

    fn server_client_pair() -> (Arc<Server>, Arc<Client>) {
        let (client_transport, server_transport) = InMemoryTransport::pair();
        let server = Server::new(
            Arc::new(server_transport),
            Implementation::new("stub-server", "0.0.0"),
            Capabilities::default(),
        );
        server.on_list_tools(list_tools_handler());
        server.run();

        let client = Client::new(
            Arc::new(client_transport),
            Implementation::new("test-client", "0.1.0"),
            Capabilities::default(),
        );
        (server, client)
    }

    #[tokio::test]
    async fn rejects_requests_sent_before_the_handshake_completes() {
        let (_server, client) = server_client_pair();
        let err = client.list_tools(None).await.unwrap_err();
        assert!(matches!(err, mcp_core::Error::ServerNotInitialized));
    }

    #[tokio::test]
    async fn ping_is_answered_even_before_the_handshake_completes() {
        let (_server, client) = server_client_pair();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn registered_handler_serves_requests_after_the_handshake() {
        let (_server, client) = server_client_pair();
        client.initialize().await.unwrap();
        let page = client.list_tools(None).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn subscribe_then_resource_update_is_delivered_to_the_subscribed_peer() {
        let (server, client) = server_client_pair();
        client.initialize().await.unwrap();

        let mut updates = client.subscribe_resource("file:///a").await.unwrap();
        server.notify_resource_updated("file:///a").await.unwrap();
        let update = updates.recv().await.unwrap();
        assert_eq!(update.uri, "file:///a");
    }

    #[tokio::test]
    async fn resource_update_for_an_unsubscribed_uri_is_not_sent() {
        let (server, client) = server_client_pair();
        client.initialize().await.unwrap();

        // No subscription registered; this must not error, and must not
        // produce a notification the client has no handler expectations for.
        server.notify_resource_updated("file:///never-subscribed").await.unwrap();
    }
}
