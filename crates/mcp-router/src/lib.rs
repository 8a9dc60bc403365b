//! The JSON-RPC message router (C4): request/response correlation,
//! notification dispatch, and cancellation over any [`mcp_transport::Transport`].

pub mod handler;
pub mod pending;
pub mod progress;
mod router;

pub use handler::{CancelFlag, NotificationHandler, RequestHandler};
pub use pending::{PendingResult, ReplyOutcome};
pub use progress::ProgressUpdate;
pub use router::{Router, RouterMetrics};
