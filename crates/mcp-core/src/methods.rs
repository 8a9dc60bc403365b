//! Well-known MCP method and notification names (§6).

/// Request methods (non-exhaustive per §6; unknown methods are valid and
/// simply fail with `MethodNotFound` if no handler is registered).
pub mod request {
    /// Initialize handshake.
    pub const INITIALIZE: &str = "initialize";
    /// Liveness check.
    pub const PING: &str = "ping";
    /// List available tools.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invoke a tool.
    pub const TOOLS_CALL: &str = "tools/call";
    /// List available prompts.
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Retrieve a prompt.
    pub const PROMPTS_GET: &str = "prompts/get";
    /// List available resources.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// List resource templates.
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    /// Read a resource.
    pub const RESOURCES_READ: &str = "resources/read";
    /// Subscribe to a resource's update notifications.
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    /// Unsubscribe from a resource's update notifications.
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    /// Set the minimum log level the peer should emit.
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    /// Server-initiated request for a client-side LLM completion.
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
}

/// Notification methods (no reply expected).
pub mod notification {
    /// Client confirms the initialize handshake is complete.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// A pending request should be cancelled.
    pub const CANCELLED: &str = "notifications/cancelled";
    /// Progress update for an in-flight request.
    pub const PROGRESS: &str = "notifications/progress";
    /// Structured log message.
    pub const MESSAGE: &str = "notifications/message";
    /// A subscribed resource changed.
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    /// The resource catalog changed.
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    /// The tool catalog changed.
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    /// The prompt catalog changed.
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    /// Internal cancellation signal (§4.4); distinct from the public
    /// `notifications/cancelled` wire notification, this is the control
    /// message a caller sends to request cancellation of its own outbound
    /// call.
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
}

/// The MCP protocol version this runtime speaks, and the set it will accept
/// from a peer during negotiation (§4.5).
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05"];

/// The highest protocol version this runtime prefers.
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Picks the highest protocol version present in both the local and the
/// peer's supported sets, per §4.5's negotiation rule. Returns `None` if the
/// sets do not intersect.
pub fn negotiate_protocol_version(peer_supported: &[String]) -> Option<&'static str> {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|&&ours| peer_supported.iter().any(|theirs| theirs == ours))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_highest_common_version() {
        let peer = vec!["2024-11-05".to_string(), "2025-06-18".to_string()];
        assert_eq!(negotiate_protocol_version(&peer), Some("2025-06-18"));
    }

    #[test]
    fn returns_none_when_no_overlap() {
        let peer = vec!["1999-01-01".to_string()];
        assert_eq!(negotiate_protocol_version(&peer), None);
    }
}
