//! Session semantics layered on top of [`mcp_router::Router`] (C5): the
//! `initialize` handshake, keepalive, resource subscriptions, paged listings,
//! and chunked resource reads.

pub mod chunked;
pub mod endpoint;
pub mod handshake;
pub mod keepalive;
pub mod paging;
mod session;
pub mod subscriptions;

pub use endpoint::{EndpointConfig, TransportKind};
pub use handshake::{InitializeParams, InitializeResult};
pub use keepalive::{Keepalive, KeepaliveConfig};
pub use session::{Role, Session};
