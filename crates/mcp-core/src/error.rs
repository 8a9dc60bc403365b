//! Shared error taxonomy (§7 of the design spec).
//!
//! Every crate in the workspace (`mcp-transport*`, `mcp-auth`, `mcp-router`,
//! `mcp-session`, ...) returns this one umbrella [`Error`] directly rather
//! than defining a narrow local enum per crate boundary — there is exactly
//! one error codespace here (the JSON-RPC error codes themselves), so a
//! local enum at each boundary would exist only to be converted back into
//! this type one call site later. See `DESIGN.md` for the reasoning.

use crate::id::Id;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The shared error taxonomy for the JSON-RPC/MCP runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A frame's header was malformed or the stream ended mid-frame.
    #[error("framing error: {0}")]
    Framing(String),

    /// A frame declared a `Content-Length` larger than the configured maximum.
    #[error("frame of {size} bytes exceeds the configured maximum of {max} bytes")]
    FrameTooLarge {
        /// Declared frame size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },

    /// The underlying transport failed to send or receive.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport was closed; no further messages can be sent or received.
    #[error("transport closed")]
    TransportClosed,

    /// A well-formed JSON-RPC message violated the protocol contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No handler is registered for the requested method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The request's params failed validation.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The call was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// The call's deadline elapsed before a reply arrived.
    #[error("request timed out")]
    Timeout,

    /// An authentication provider failed to produce usable credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The peer issued a `WWW-Authenticate` challenge in response to a request.
    #[error("authentication challenge: {0}")]
    AuthChallenge(String),

    /// The peer missed enough consecutive keepalive pings to be declared dead.
    #[error("keepalive timeout: no response after {missed} consecutive pings")]
    KeepaliveTimeout {
        /// Number of consecutive unanswered pings observed.
        missed: u32,
    },

    /// A requested resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A method other than `initialize`/`ping` was invoked before the
    /// initialize handshake completed.
    #[error("server not initialized")]
    ServerNotInitialized,

    /// An unexpected internal failure; always accompanied by a message, never
    /// bare `unwrap`/`expect` panics in non-test code.
    #[error("internal error: {0}")]
    Internal(String),

    /// A JSON-RPC error reply whose code does not map onto any other
    /// variant here (e.g. a peer's application-specific `-32000` error).
    #[error("remote error: {0}")]
    Remote(crate::message::RpcError),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

impl Error {
    /// Maps this error to its JSON-RPC 2.0 numeric error code (§6).
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Framing(_) | Self::FrameTooLarge { .. } => ErrorCode::ParseError.code(),
            Self::Protocol(_) => ErrorCode::InvalidRequest.code(),
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound.code(),
            Self::InvalidParams(_) => ErrorCode::InvalidParams.code(),
            Self::ServerNotInitialized => ErrorCode::ServerNotInitialized.code(),
            Self::Cancelled => ErrorCode::RequestCancelled.code(),
            Self::ResourceNotFound(_) => ErrorCode::ResourceNotFound.code(),
            Self::Transport(_)
            | Self::TransportClosed
            | Self::Timeout
            | Self::Auth(_)
            | Self::AuthChallenge(_)
            | Self::KeepaliveTimeout { .. }
            | Self::Internal(_) => ErrorCode::ServerError.code(),
            Self::Remote(err) => err.code,
        }
    }

    /// Reconstructs an [`Error`] from a JSON-RPC error reply received from a
    /// peer, mapping well-known codes back onto their typed variant and
    /// falling back to [`Error::Remote`] for anything else (application
    /// errors, unrecognized extension codes).
    pub fn from_rpc_error(err: crate::message::RpcError) -> Self {
        match err.code {
            c if c == ErrorCode::MethodNotFound.code() => Self::MethodNotFound(err.message),
            c if c == ErrorCode::InvalidParams.code() => Self::InvalidParams(err.message),
            c if c == ErrorCode::ServerNotInitialized.code() => Self::ServerNotInitialized,
            c if c == ErrorCode::RequestCancelled.code() => Self::Cancelled,
            c if c == ErrorCode::ResourceNotFound.code() => Self::ResourceNotFound(err.message),
            _ => Self::Remote(err),
        }
    }

    /// Builds the `crate::message::RpcError` wire representation for this error.
    pub fn to_rpc_error(&self) -> crate::message::RpcError {
        crate::message::RpcError::new(self.rpc_code(), self.to_string())
    }

    /// `true` if this error invalidates the whole connection (per §7,
    /// framing/transport/keepalive/protocol errors close the connection and
    /// resolve every pending request with [`Error::TransportClosed`]), as
    /// opposed to failing only the one call it is attached to.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Framing(_)
                | Self::FrameTooLarge { .. }
                | Self::Transport(_)
                | Self::TransportClosed
                | Self::Protocol(_)
                | Self::KeepaliveTimeout { .. }
        )
    }
}

/// Standard JSON-RPC 2.0 error codes, plus the MCP extensions from §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// `-32700` — the peer sent bytes that do not parse as JSON-RPC.
    ParseError,
    /// `-32600` — well-formed JSON that is not a valid JSON-RPC request.
    InvalidRequest,
    /// `-32601` — no handler registered for the method.
    MethodNotFound,
    /// `-32602` — the method's params failed validation.
    InvalidParams,
    /// `-32603` — the handler failed unexpectedly.
    InternalError,
    /// `-32000` — generic application-level server error.
    ServerError,
    /// `-32001` — the requested resource does not exist.
    ResourceNotFound,
    /// `-32002` — a method was called before `initialize` completed.
    ServerNotInitialized,
    /// `-32800` — the request was cancelled before or during dispatch.
    RequestCancelled,
    /// `-32801` — the request or response payload exceeded a size limit.
    ContentTooLarge,
}

impl ErrorCode {
    /// The numeric JSON-RPC error code.
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::ResourceNotFound => -32001,
            Self::ServerNotInitialized => -32002,
            Self::RequestCancelled => -32800,
            Self::ContentTooLarge => -32801,
        }
    }
}

/// Convenience constructors matching the JSON-RPC error codes in §6, used by
/// handlers that need to build a wire-level error response directly (e.g.
/// the router's pre-dispatch cancel path, or a session replying `-32002`
/// before the initialize handshake completes).
pub mod rpc {
    use super::ErrorCode;
    use crate::message::RpcError;

    /// Builds a `-32601 Method not found` error.
    pub fn method_not_found(method: &str) -> RpcError {
        RpcError::new(
            ErrorCode::MethodNotFound.code(),
            format!("Method not found: {method}"),
        )
    }

    /// Builds a `-32602 Invalid params` error.
    pub fn invalid_params(detail: impl Into<String>) -> RpcError {
        RpcError::new(ErrorCode::InvalidParams.code(), detail.into())
    }

    /// Builds a `-32002 Server not initialized` error.
    pub fn server_not_initialized() -> RpcError {
        RpcError::new(
            ErrorCode::ServerNotInitialized.code(),
            "Server not initialized",
        )
    }

    /// Builds a `-32800 Request cancelled` error.
    pub fn request_cancelled(id: &super::Id) -> RpcError {
        RpcError::new(
            ErrorCode::RequestCancelled.code(),
            format!("Request {id} was cancelled"),
        )
        .with_data(serde_json::json!({ "requestId": id.to_string() }))
    }

    /// Builds a `-32801 Content too large` error.
    pub fn content_too_large(size: usize, max: usize) -> RpcError {
        RpcError::new(
            ErrorCode::ContentTooLarge.code(),
            format!("content of {size} bytes exceeds the maximum of {max} bytes"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_spec() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::ServerError.code(), -32000);
        assert_eq!(ErrorCode::ResourceNotFound.code(), -32001);
        assert_eq!(ErrorCode::ServerNotInitialized.code(), -32002);
        assert_eq!(ErrorCode::RequestCancelled.code(), -32800);
        assert_eq!(ErrorCode::ContentTooLarge.code(), -32801);
    }

    #[test]
    fn connection_fatal_errors_are_flagged() {
        assert!(Error::TransportClosed.is_connection_fatal());
        assert!(Error::Protocol("bad".into()).is_connection_fatal());
        assert!(!Error::Cancelled.is_connection_fatal());
        assert!(!Error::Timeout.is_connection_fatal());
    }

    #[test]
    fn to_rpc_error_uses_mapped_code() {
        let err = Error::MethodNotFound("tools/call".into());
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32601);
    }

    #[test]
    fn from_rpc_error_maps_known_codes_back_to_typed_variants() {
        let rpc = crate::message::RpcError::new(-32601, "Method not found: tools/call");
        assert!(matches!(Error::from_rpc_error(rpc), Error::MethodNotFound(_)));
    }

    #[test]
    fn from_rpc_error_falls_back_to_remote_for_unmapped_codes() {
        let rpc = crate::message::RpcError::new(-32000, "application-specific failure");
        assert!(matches!(Error::from_rpc_error(rpc), Error::Remote(_)));
    }
}
