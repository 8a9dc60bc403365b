//! Shared types for the bidirectional JSON-RPC 2.0 / MCP runtime.
//!
//! This crate holds the wire-level data model (§3 of the design spec):
//! request/response/notification ids, the `Message` envelope, the shared
//! error taxonomy, capability records, and the well-known MCP method and
//! notification names. It has no transport, routing, or session logic —
//! those live in `mcp-transport*`, `mcp-router`, and `mcp-session`.

pub mod capabilities;
pub mod error;
pub mod id;
pub mod message;
pub mod methods;

pub use capabilities::{Capabilities, Implementation};
pub use error::{Error, ErrorCode, Result};
pub use id::{Id, IdGenerator};
pub use message::{Message, RpcError, JSONRPC_VERSION};
