//! The [`AuthProvider`] capability trait (§4.3).

use async_trait::async_trait;

/// A descriptive failure raised by an [`AuthProvider`] when it cannot
/// produce credentials. Transports surface these as
/// [`mcp_core::Error::Auth`]; the provider's own error handler (if set)
/// receives the message too.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct AuthError(pub String);

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A handler invoked whenever credential acquisition fails.
pub type ErrorHandler = Box<dyn Fn(&AuthError) + Send + Sync>;

/// Attaches credentials to outbound HTTP requests.
///
/// `ensure_ready` is awaited before every request a transport makes; once it
/// returns, `headers()` supplies the key/value pairs to attach. A failed
/// `ensure_ready` leaves `headers()` returning an empty list and invokes the
/// registered error handler (if any) with a descriptive message.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Makes sure credentials are fresh, refreshing them if needed.
    /// Never fails the caller: failures are reported via the error handler
    /// and leave `headers()` empty until the next successful refresh.
    async fn ensure_ready(&self);

    /// Returns the header key/value pairs to attach to the next request.
    async fn headers(&self) -> Vec<(String, String)>;

    /// Registers a callback invoked on credential-acquisition failure.
    /// Replaces any previously registered handler.
    fn set_error_handler(&self, handler: ErrorHandler);
}
