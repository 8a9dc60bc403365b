//! Typed client-side operations (C7, client role): composes
//! [`mcp_router::Router`], [`mcp_session::Session`], and an optional
//! [`mcp_validator::Validator`] into the operations a host program actually
//! calls — `listTools`, `callTool`, `readResource`, `subscribeResource`, and
//! so on — on top of the generic `sendRequest`/`sendNotification` primitives.

mod logging;
mod prompts;
mod resources;
mod sampling;
mod tools;

pub use logging::LogMessage;
pub use sampling::SamplingHandler;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use mcp_core::methods::{notification, request};
use mcp_core::{Capabilities, Implementation, Result};
use mcp_router::{CancelFlag, NotificationHandler, ProgressUpdate, RequestHandler, Router};
use mcp_session::{EndpointConfig, Keepalive, KeepaliveConfig, Session};
use mcp_transport::Transport;
use mcp_validator::{Direction, NoopValidator, ValidationMode, Validator};

use mcp_session::subscriptions::{ResourceUpdate, SubscriptionSinks};

use logging::LogSink;

/// The client side of one MCP connection.
pub struct Client {
    router: Arc<Router>,
    session: Arc<Session>,
    validator: Arc<dyn Validator>,
    validation_mode: ValidationMode,
    subscriptions: Arc<SubscriptionSinks>,
    log_sink: LogSink,
    keepalive: AsyncMutex<Option<Keepalive>>,
}

impl Client {
    /// Builds a client with no payload validation (`ValidationMode::Off`).
    pub fn new(transport: Arc<dyn Transport>, info: Implementation, capabilities: Capabilities) -> Arc<Self> {
        Self::with_validator(transport, info, capabilities, Arc::new(NoopValidator), ValidationMode::Off)
    }

    /// Builds a client with an explicit validator and mode applied to both
    /// outbound request params and inbound results.
    pub fn with_validator(
        transport: Arc<dyn Transport>,
        info: Implementation,
        capabilities: Capabilities,
        validator: Arc<dyn Validator>,
        validation_mode: ValidationMode,
    ) -> Arc<Self> {
        let router = Router::new(transport);
        router.spawn_read_loop();
        let session = Session::new_client(Arc::clone(&router), info, capabilities);
        let client = Arc::new(Self {
            router,
            session,
            validator,
            validation_mode,
            subscriptions: Arc::new(SubscriptionSinks::new()),
            log_sink: LogSink::default(),
            keepalive: AsyncMutex::new(None),
        });
        client.install_notification_handlers();
        client.install_log_message_handler();
        client
    }

    /// Builds a client from an aggregate [`EndpointConfig`] (§6): constructs
    /// the configured transport, wires validation, runs no handshake (call
    /// [`Client::initialize`] separately), and starts keepalive if
    /// configured.
    pub async fn from_config(config: EndpointConfig) -> Result<Arc<Self>> {
        let transport = config.transport.build()?;
        let client = Self::with_validator(
            transport,
            config.local_info,
            config.capabilities,
            config.validator,
            config.validation,
        );
        if let Some(keepalive_config) = config.keepalive {
            client.enable_keepalive(keepalive_config).await;
        }
        Ok(client)
    }

    /// Starts emitting `ping` at `config.interval`, declaring the peer dead
    /// and logging if it misses `config.threshold` consecutive replies.
    /// Mirrors the server side's equivalent method — either side of a
    /// connection may run the keepalive loop (§4.5: "each side emits ping").
    pub async fn enable_keepalive(self: &Arc<Self>, config: KeepaliveConfig) {
        let keepalive = Keepalive::spawn(Arc::clone(&self.router), config, |err| {
            tracing::warn!(error = %err, "keepalive failed");
        });
        *self.keepalive.lock().await = Some(keepalive);
    }

    fn install_notification_handlers(self: &Arc<Self>) {
        let for_updates = Arc::clone(self);
        let updated: Arc<dyn NotificationHandler> = Arc::new(move |params: Option<Value>| {
            let client = Arc::clone(&for_updates);
            Box::pin(async move {
                if let Some(uri) = params.as_ref().and_then(|p| p.get("uri")).and_then(|v| v.as_str()) {
                    client.subscriptions.deliver(uri);
                }
            }) as futures::future::BoxFuture<'static, ()>
        });
        self.router
            .set_notification_handler(notification::RESOURCES_UPDATED, updated);
    }

    /// Runs the `initialize` / `notifications/initialized` handshake.
    /// Must be awaited before any other request is sent.
    pub async fn initialize(&self) -> Result<Capabilities> {
        self.session.initialize().await
    }

    /// `true` once [`Client::initialize`] has completed.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// The capability set negotiated during the handshake.
    pub fn negotiated_capabilities(&self) -> Option<Capabilities> {
        self.session.negotiated_capabilities()
    }

    /// Liveness check.
    pub async fn ping(&self) -> Result<()> {
        self.call(request::PING, None).await?;
        Ok(())
    }

    /// Sets the minimum log level the peer should emit
    /// `notifications/message` for.
    pub async fn set_log_level(&self, level: impl Into<String>) -> Result<()> {
        self.call(
            request::LOGGING_SET_LEVEL,
            Some(serde_json::json!({ "level": level.into() })),
        )
        .await?;
        Ok(())
    }

    /// Subscribes to update notifications for `uri`; the returned channel
    /// receives one [`ResourceUpdate`] per `notifications/resources/updated`
    /// naming that URI.
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> Result<mpsc::UnboundedReceiver<ResourceUpdate>> {
        let uri = uri.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.register(uri.clone(), tx);
        self.call(request::RESOURCES_SUBSCRIBE, Some(serde_json::json!({ "uri": uri })))
            .await?;
        Ok(rx)
    }

    /// Unsubscribes from `uri`'s update notifications.
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        self.call(
            request::RESOURCES_UNSUBSCRIBE,
            Some(serde_json::json!({ "uri": uri })),
        )
        .await?;
        self.subscriptions.unregister(&uri);
        Ok(())
    }

    /// Registers the handler invoked for server-initiated
    /// `sampling/createMessage` requests.
    pub fn on_sampling_create_message(&self, handler: Arc<dyn SamplingHandler>) {
        let adapter: Arc<dyn RequestHandler> = Arc::new(sampling::Adapter(handler));
        self.router
            .set_request_handler(request::SAMPLING_CREATE_MESSAGE, adapter);
    }

    /// The generic outbound-request primitive every typed operation is built
    /// on: validates `params` per the configured mode, sends the request,
    /// then validates the result before returning it.
    pub async fn call(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        let method = method.into();
        let payload = params.clone().unwrap_or(Value::Null);
        self.validation_mode
            .apply(self.validator.as_ref(), &method, Direction::Outbound, &payload)?;

        let result = self.router.call(method.clone(), params).await?;

        self.validation_mode
            .apply(self.validator.as_ref(), &method, Direction::Inbound, &result)?;
        Ok(result)
    }

    /// Like [`Client::call`], but progress notifications carrying the
    /// attached token are relayed to `progress` as they arrive.
    pub async fn call_with_progress(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<Value> {
        let method = method.into();
        let payload = params.clone().unwrap_or(Value::Null);
        self.validation_mode
            .apply(self.validator.as_ref(), &method, Direction::Outbound, &payload)?;

        let result = self
            .router
            .call_with_progress(method.clone(), params, progress)
            .await?;

        self.validation_mode
            .apply(self.validator.as_ref(), &method, Direction::Inbound, &result)?;
        Ok(result)
    }

    /// The generic outbound-notification primitive.
    pub async fn notify(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        self.router.notify(method, params).await
    }

    /// Cancels an in-flight outbound call by id (mirrors what
    /// [`Router::call_with_timeout`] does internally on elapse).
    pub async fn cancel(&self, id: &mcp_core::Id) {
        self.router.cancel(id).await
    }

    /// Direct access to the underlying router, for callers that need request
    /// handler registration the typed surface doesn't cover (e.g. other
    /// server-initiated request methods).
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

/// Binds a `CancelFlag` that is never flipped, for callers invoking a
/// [`RequestHandler`] directly outside of the router's dispatch loop (tests,
/// mostly).
pub fn inert_cancel_flag() -> CancelFlag {
    Arc::new(std::sync::atomic::AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_transport_memory::InMemoryTransport;

    fn echo_server_handler() -> Arc<dyn RequestHandler> {
        Arc::new(|params: Option<Value>, _cancel: CancelFlag| {
            Box::pin(async move {
                Ok(serde_json::json!({
                    "protocolVersion": mcp_core::methods::LATEST_PROTOCOL_VERSION,
                    "capabilities": {},
                    "serverInfo": {"name": "stub-server", "version": "0.0.0"},
                }))
            }) as futures::future::BoxFuture<'static, std::result::Result<Value, mcp_core::message::RpcError>>
        })
    }

    #[tokio::test]
    async fn initialize_and_generic_call_round_trip() {
        let (client_transport, server_transport) = InMemoryTransport::pair();
        let server_router = Router::new(Arc::new(server_transport));
        server_router.set_request_handler(request::INITIALIZE, echo_server_handler());
        server_router.set_request_handler(
            request::TOOLS_LIST,
            Arc::new(|_params: Option<Value>, _cancel: CancelFlag| {
                Box::pin(async move { Ok(serde_json::json!({ "items": [] })) })
                    as futures::future::BoxFuture<'static, std::result::Result<Value, mcp_core::message::RpcError>>
            }),
        );
        server_router.spawn_read_loop();

        let client = Client::new(
            Arc::new(client_transport),
            Implementation::new("test-client", "0.1.0"),
            Capabilities::default(),
        );
        client.initialize().await.unwrap();
        assert!(client.is_ready());

        let page = client.list_tools(None).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
