//! Client-side handling of the server-initiated `sampling/createMessage`
//! request (§6): the server asks the client's host LLM to produce a
//! completion. The payload shape is an external collaborator's concern; this
//! module only adapts a user-supplied handler into the router's
//! [`RequestHandler`] trait object.

use async_trait::async_trait;
use serde_json::Value;

use mcp_core::message::RpcError;
use mcp_router::{CancelFlag, RequestHandler};

/// Implemented by host code that can service `sampling/createMessage`
/// requests from the server.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, params: Option<Value>, cancel: CancelFlag) -> Result<Value, RpcError>;
}

#[async_trait]
impl<F, Fut> SamplingHandler for F
where
    F: Fn(Option<Value>, CancelFlag) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    async fn create_message(&self, params: Option<Value>, cancel: CancelFlag) -> Result<Value, RpcError> {
        (self)(params, cancel).await
    }
}

pub(crate) struct Adapter(pub std::sync::Arc<dyn SamplingHandler>);

#[async_trait]
impl RequestHandler for Adapter {
    async fn handle(&self, params: Option<Value>, cancel: CancelFlag) -> Result<Value, RpcError> {
        self.0.create_message(params, cancel).await
    }
}
