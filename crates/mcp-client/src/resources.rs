//! `resources/list`, `resources/templates/list`, and `resources/read`,
//! including chunked-read reassembly when the peer negotiated
//! `experimental.chunkedRead` (§4.5).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use mcp_core::methods::request;
use mcp_core::{Error, Result};
use mcp_session::chunked::{ChunkContent, ReadChunk, ReadParams};
use mcp_session::paging::{ListParams, Page};

use crate::Client;

impl Client {
    /// Lists one page of the resource catalog.
    pub async fn list_resources(&self, cursor: Option<String>) -> Result<Page<Value>> {
        let params = ListParams { cursor };
        let value = self
            .call(request::RESOURCES_LIST, Some(serde_json::to_value(params)?))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Lists one page of the resource template catalog.
    pub async fn list_resource_templates(&self, cursor: Option<String>) -> Result<Page<Value>> {
        let params = ListParams { cursor };
        let value = self
            .call(request::RESOURCES_TEMPLATES_LIST, Some(serde_json::to_value(params)?))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a resource in full. If the peer negotiated `chunkedRead`, issues
    /// successive `offset`-advancing reads and reassembles them; otherwise
    /// sends a single unparameterized read, per §4.5's "ignores offset/length
    /// and returns the entire resource" fallback.
    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<Value> {
        let uri = uri.into();
        let chunked = self
            .negotiated_capabilities()
            .is_some_and(|c| c.supports_chunked_read());

        if !chunked {
            let params = serde_json::json!({ "uri": uri });
            return self.call(request::RESOURCES_READ, Some(params)).await;
        }

        let mut offset: u64 = 0;
        let mut text_acc = String::new();
        let mut bytes_acc: Vec<u8> = Vec::new();
        let mut saw_blob = false;

        loop {
            let params = ReadParams {
                uri: uri.clone(),
                offset: Some(offset),
                length: None,
            };
            let value = self
                .call(request::RESOURCES_READ, Some(serde_json::to_value(params)?))
                .await?;
            let chunk: ReadChunk = serde_json::from_value(value)?;
            match chunk.content {
                ChunkContent::Text { text } => text_acc.push_str(&text),
                ChunkContent::Blob { blob } => {
                    saw_blob = true;
                    let decoded = STANDARD
                        .decode(&blob)
                        .map_err(|e| Error::Protocol(format!("malformed base64 resource chunk: {e}")))?;
                    bytes_acc.extend_from_slice(&decoded);
                }
            }
            match chunk.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }

        if saw_blob {
            Ok(serde_json::json!({ "uri": uri, "blob": STANDARD.encode(&bytes_acc) }))
        } else {
            Ok(serde_json::json!({ "uri": uri, "text": text_acc }))
        }
    }
}
