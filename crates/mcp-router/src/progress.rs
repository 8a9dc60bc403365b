//! Progress relay for long-running requests (§4.5).

use serde::{Deserialize, Serialize};

/// One `notifications/progress` payload, delivered to the sink registered
/// when the originating request was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "progressToken")]
    pub progress_token: String,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}
