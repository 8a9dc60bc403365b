//! `tools/list` and `tools/call` (§4.7, §6).

use serde_json::Value;
use tokio::sync::mpsc;

use mcp_core::methods::request;
use mcp_core::Result;
use mcp_router::ProgressUpdate;
use mcp_session::paging::{ListParams, Page};

use crate::Client;

impl Client {
    /// Lists one page of the tool catalog. Pass `cursor` from a prior
    /// [`Page::next_cursor`] to continue; `None` starts from the beginning.
    pub async fn list_tools(&self, cursor: Option<String>) -> Result<Page<Value>> {
        let params = ListParams { cursor };
        let value = self.call(request::TOOLS_LIST, Some(serde_json::to_value(params)?)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Invokes a tool by name with the given argument object.
    pub async fn call_tool(&self, name: impl Into<String>, arguments: Option<Value>) -> Result<Value> {
        let params = serde_json::json!({ "name": name.into(), "arguments": arguments });
        self.call(request::TOOLS_CALL, Some(params)).await
    }

    /// Like [`Client::call_tool`], relaying any `notifications/progress`
    /// bound to this call to `progress`.
    pub async fn call_tool_with_progress(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<Value> {
        let params = serde_json::json!({ "name": name.into(), "arguments": arguments });
        self.call_with_progress(request::TOOLS_CALL, Some(params), progress)
            .await
    }
}
