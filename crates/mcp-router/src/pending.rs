//! The pending outbound-request table (§5's "pending map" discipline: a
//! mutex held only across O(1) insert/remove/lookup, never across an await).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::oneshot;

use mcp_core::message::RpcError;

/// The outcome delivered to whoever is waiting on a sent request.
pub type ReplyOutcome = Result<serde_json::Value, RpcError>;

/// What a pending outbound call's completion sink is resolved with.
pub enum PendingResult {
    /// A matching `Response`/`ResponseError` arrived from the peer.
    Reply(ReplyOutcome),
    /// The caller (or a timeout) cancelled this request before a reply arrived.
    Cancelled,
    /// The connection failed before a reply arrived.
    Failed(mcp_core::Error),
}

/// One in-flight outbound request's bookkeeping.
pub struct PendingEntry {
    pub sink: oneshot::Sender<PendingResult>,
    pub cancel_flag: Arc<AtomicBool>,
}
