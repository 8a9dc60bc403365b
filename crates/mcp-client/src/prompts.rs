//! `prompts/list` and `prompts/get` (§4.7, §6).

use serde_json::Value;

use mcp_core::methods::request;
use mcp_core::Result;
use mcp_session::paging::{ListParams, Page};

use crate::Client;

impl Client {
    /// Lists one page of the prompt catalog.
    pub async fn list_prompts(&self, cursor: Option<String>) -> Result<Page<Value>> {
        let params = ListParams { cursor };
        let value = self
            .call(request::PROMPTS_LIST, Some(serde_json::to_value(params)?))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Retrieves a named prompt, rendering its template against `arguments`.
    pub async fn get_prompt(&self, name: impl Into<String>, arguments: Option<Value>) -> Result<Value> {
        let params = serde_json::json!({ "name": name.into(), "arguments": arguments });
        self.call(request::PROMPTS_GET, Some(params)).await
    }
}
