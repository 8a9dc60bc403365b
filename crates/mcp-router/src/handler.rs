//! Handler traits invoked by the router's read loop (§4.4).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use mcp_core::message::RpcError;

/// A cooperative cancellation flag a handler may poll at suspension points.
/// Flipped by `$/cancelRequest`; the router discards the handler's result
/// if it completes after the originator has already moved on.
pub type CancelFlag = Arc<AtomicBool>;

/// Handles one inbound JSON-RPC request and produces its reply.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>, cancel: CancelFlag) -> Result<Value, RpcError>;
}

/// Handles one inbound JSON-RPC notification. No reply is sent regardless of
/// outcome; failures are logged by the caller.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>);
}

#[async_trait]
impl<F> RequestHandler for F
where
    F: Fn(Option<Value>, CancelFlag) -> futures::future::BoxFuture<'static, Result<Value, RpcError>>
        + Send
        + Sync,
{
    async fn handle(&self, params: Option<Value>, cancel: CancelFlag) -> Result<Value, RpcError> {
        (self)(params, cancel).await
    }
}

#[async_trait]
impl<F> NotificationHandler for F
where
    F: Fn(Option<Value>) -> futures::future::BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, params: Option<Value>) {
        (self)(params).await
    }
}
