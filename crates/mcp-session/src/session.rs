//! The session state machine driving the `initialize` handshake (§4.5):
//! pre-initialize gating on the server side, capability negotiation on both
//! sides, and the post-handshake `Ready` state other modules key off of.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use mcp_core::error::rpc;
use mcp_core::message::RpcError;
use mcp_core::methods::{negotiate_protocol_version, notification, request};
use mcp_core::{Capabilities, Error, Implementation, Result};
use mcp_router::{CancelFlag, NotificationHandler, RequestHandler, Router};

use crate::handshake::{InitializeParams, InitializeResult};

/// Which end of the handshake this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone)]
enum State {
    AwaitingInitialize,
    /// Server only: replied to `initialize`, waiting for `notifications/initialized`.
    Initializing {
        negotiated: Capabilities,
        peer_info: Implementation,
        protocol_version: String,
    },
    Ready {
        negotiated: Capabilities,
        peer_info: Implementation,
        protocol_version: String,
    },
}

/// Drives one side of the `initialize` handshake and exposes the negotiated
/// result to the rest of the runtime.
pub struct Session {
    router: Arc<Router>,
    role: Role,
    local_info: Implementation,
    local_capabilities: Capabilities,
    state: Mutex<State>,
}

impl Session {
    /// Builds a client-side session. Call [`Session::initialize`] to run the
    /// handshake before issuing any other request.
    pub fn new_client(
        router: Arc<Router>,
        local_info: Implementation,
        local_capabilities: Capabilities,
    ) -> Arc<Self> {
        Arc::new(Self {
            router,
            role: Role::Client,
            local_info,
            local_capabilities,
            state: Mutex::new(State::AwaitingInitialize),
        })
    }

    /// Builds a server-side session and registers its `initialize` request
    /// handler and `notifications/initialized` notification handler on the
    /// router. Other handlers registered through [`Session::guard`] are
    /// rejected with `ServerNotInitialized` until the handshake completes.
    pub fn new_server(
        router: Arc<Router>,
        local_info: Implementation,
        local_capabilities: Capabilities,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            router,
            role: Role::Server,
            local_info,
            local_capabilities,
            state: Mutex::new(State::AwaitingInitialize),
        });
        session.install_server_handlers();
        session
    }

    fn install_server_handlers(self: &Arc<Self>) {
        let for_request = Arc::clone(self);
        let initialize_handler: Arc<dyn RequestHandler> =
            Arc::new(move |params: Option<Value>, _cancel: CancelFlag| {
                let session = Arc::clone(&for_request);
                Box::pin(async move { session.handle_initialize_request(params).await })
                    as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
            });
        self.router
            .set_request_handler(request::INITIALIZE, initialize_handler);

        let for_notification = Arc::clone(self);
        let initialized_handler: Arc<dyn NotificationHandler> =
            Arc::new(move |_params: Option<Value>| {
                let session = Arc::clone(&for_notification);
                Box::pin(async move { session.handle_initialized_notification() })
                    as futures::future::BoxFuture<'static, ()>
            });
        self.router
            .set_notification_handler(notification::INITIALIZED, initialized_handler);
    }

    #[tracing::instrument(skip(self, params))]
    async fn handle_initialize_request(
        &self,
        params: Option<Value>,
    ) -> std::result::Result<Value, RpcError> {
        let params: InitializeParams = params
            .ok_or_else(|| rpc::invalid_params("initialize requires params"))
            .and_then(|v| serde_json::from_value(v).map_err(|e| rpc::invalid_params(e.to_string())))?;

        let protocol_version = negotiate_protocol_version(&[params.protocol_version.clone()])
            .ok_or_else(|| {
                rpc::invalid_params(format!(
                    "unsupported protocol version: {}",
                    params.protocol_version
                ))
            })?
            .to_string();

        let negotiated = self.local_capabilities.intersect(&params.capabilities);

        {
            let mut state = self.state.lock().unwrap();
            *state = State::Initializing {
                negotiated: negotiated.clone(),
                peer_info: params.client_info.clone(),
                protocol_version: protocol_version.clone(),
            };
        }

        let result = InitializeResult {
            protocol_version,
            capabilities: self.local_capabilities.clone(),
            server_info: self.local_info.clone(),
            instructions: None,
        };
        serde_json::to_value(result).map_err(|e| rpc::invalid_params(e.to_string()))
    }

    fn handle_initialized_notification(&self) {
        let mut state = self.state.lock().unwrap();
        if let State::Initializing {
            negotiated,
            peer_info,
            protocol_version,
        } = &*state
        {
            *state = State::Ready {
                negotiated: negotiated.clone(),
                peer_info: peer_info.clone(),
                protocol_version: protocol_version.clone(),
            };
        } else {
            tracing::warn!("notifications/initialized received outside the Initializing state");
        }
    }

    /// Client-only: runs the `initialize` request/`notifications/initialized`
    /// exchange and returns the negotiated capability set.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Capabilities> {
        assert_eq!(self.role, Role::Client, "initialize is client-side only");

        let params = InitializeParams {
            protocol_version: mcp_core::methods::LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: self.local_capabilities.clone(),
            client_info: self.local_info.clone(),
        };
        let params_value = serde_json::to_value(params)
            .map_err(|e| Error::Internal(format!("failed to encode initialize params: {e}")))?;
        let reply = self
            .router
            .call(request::INITIALIZE, Some(params_value))
            .await?;
        let result: InitializeResult = serde_json::from_value(reply)
            .map_err(|e| Error::Protocol(format!("malformed initialize result: {e}")))?;

        let negotiated = self.local_capabilities.intersect(&result.capabilities);
        {
            let mut state = self.state.lock().unwrap();
            *state = State::Ready {
                negotiated: negotiated.clone(),
                peer_info: result.server_info,
                protocol_version: result.protocol_version,
            };
        }
        self.router.notify(notification::INITIALIZED, None).await?;
        Ok(negotiated)
    }

    /// `true` once the handshake has completed on this side.
    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Ready { .. })
    }

    /// The capability intersection computed during the handshake, or `None`
    /// before it completes.
    pub fn negotiated_capabilities(&self) -> Option<Capabilities> {
        match &*self.state.lock().unwrap() {
            State::Ready { negotiated, .. } => Some(negotiated.clone()),
            _ => None,
        }
    }

    /// The peer's `{name, version}`, known once the handshake has progressed
    /// past the `initialize` exchange.
    pub fn peer_info(&self) -> Option<Implementation> {
        match &*self.state.lock().unwrap() {
            State::Initializing { peer_info, .. } | State::Ready { peer_info, .. } => {
                Some(peer_info.clone())
            }
            State::AwaitingInitialize => None,
        }
    }

    /// Wraps `inner` so it replies `-32002 ServerNotInitialized` instead of
    /// running until the handshake is `Ready`. `initialize` and `ping` should
    /// never be wrapped with this (§4.5 exempts them).
    pub fn guard(self: &Arc<Self>, inner: Arc<dyn RequestHandler>) -> Arc<dyn RequestHandler> {
        let session = Arc::clone(self);
        Arc::new(GuardedHandler { session, inner })
    }
}

struct GuardedHandler {
    session: Arc<Session>,
    inner: Arc<dyn RequestHandler>,
}

#[async_trait::async_trait]
impl RequestHandler for GuardedHandler {
    async fn handle(
        &self,
        params: Option<Value>,
        cancel: CancelFlag,
    ) -> std::result::Result<Value, RpcError> {
        if !self.session.is_ready() {
            return Err(rpc::server_not_initialized());
        }
        self.inner.handle(params, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_transport_memory::InMemoryTransport;

    fn connected_pair() -> (Arc<Router>, Arc<Router>) {
        let (a, b) = InMemoryTransport::pair();
        let client = Router::new(Arc::new(a));
        let server = Router::new(Arc::new(b));
        client.spawn_read_loop();
        server.spawn_read_loop();
        (client, server)
    }

    #[tokio::test]
    async fn handshake_negotiates_the_common_capability_set() {
        let (client_router, server_router) = connected_pair();

        let server = Session::new_server(
            server_router,
            Implementation::new("test-server", "0.1.0"),
            Capabilities {
                resources: Some(mcp_core::capabilities::ResourcesCapability {
                    subscribe: true,
                    list_changed: true,
                }),
                ..Default::default()
            },
        );

        let client = Session::new_client(
            client_router,
            Implementation::new("test-client", "0.1.0"),
            Capabilities {
                resources: Some(mcp_core::capabilities::ResourcesCapability {
                    subscribe: true,
                    list_changed: false,
                }),
                ..Default::default()
            },
        );

        let negotiated = client.initialize().await.unwrap();
        assert!(negotiated.supports_resource_subscribe());

        // give the server's notification handler a moment to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(server.is_ready());
        assert_eq!(server.peer_info().unwrap().name, "test-client");
    }

    #[tokio::test]
    async fn guarded_handler_rejects_calls_before_the_handshake_completes() {
        let (client_router, server_router) = connected_pair();
        let server = Session::new_server(
            server_router,
            Implementation::new("test-server", "0.1.0"),
            Capabilities::default(),
        );

        let echo: Arc<dyn RequestHandler> =
            Arc::new(|params: Option<Value>, _cancel: CancelFlag| {
                Box::pin(async move { Ok(params.unwrap_or(Value::Null)) })
                    as futures::future::BoxFuture<'static, std::result::Result<Value, RpcError>>
            });
        server
            .router
            .set_request_handler("echo", server.guard(echo));

        let err = client_router
            .call("echo", Some(serde_json::json!({"x": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerNotInitialized));

        let client = Session::new_client(
            client_router.clone(),
            Implementation::new("test-client", "0.1.0"),
            Capabilities::default(),
        );
        client.initialize().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let reply = client_router
            .call("echo", Some(serde_json::json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(reply, serde_json::json!({"x": 1}));
    }
}
