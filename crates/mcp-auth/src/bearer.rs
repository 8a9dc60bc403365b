//! A static bearer token provider (§4.3's Bearer variant).

use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::provider::{AuthProvider, ErrorHandler};

/// Attaches `Authorization: Bearer <token>` using a token supplied at
/// construction time. `ensure_ready` is a no-op: there is nothing to
/// refresh.
pub struct BearerAuth {
    token: SecretString,
    error_handler: Mutex<Option<ErrorHandler>>,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            error_handler: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthProvider for BearerAuth {
    async fn ensure_ready(&self) {}

    async fn headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.token.expose_secret()),
        )]
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.lock().unwrap() = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn headers_carry_the_configured_token() {
        let auth = BearerAuth::new("abc123");
        auth.ensure_ready().await;
        let headers = auth.headers().await;
        assert_eq!(headers, vec![("Authorization".to_string(), "Bearer abc123".to_string())]);
    }
}
