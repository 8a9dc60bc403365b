//! OAuth2 client-credentials grant with single-flight token caching (§4.3).
//!
//! Hand-rolled against `reqwest` and `serde_json` rather than the `oauth2`
//! crate: the client-credentials grant is one POST and one JSON body, and
//! the runtime only ever needs that one flow, not the full authorization-
//! code/PKCE/device-flow typestate machinery.

use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex as AsyncMutex;

use crate::provider::{AuthError, AuthProvider, ErrorHandler};

/// Tokens are refreshed this many seconds before their declared expiry, to
/// absorb clock skew and in-flight request latency.
const REFRESH_SKEW: Duration = Duration::from_secs(10);

/// Used when the token endpoint omits `expires_in`.
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// RFC 3986 unreserved characters are kept literal; everything else
/// (including space, which becomes `+`) is percent-encoded.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn form_encode(value: &str) -> String {
    utf8_percent_encode(value, FORM_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}

#[derive(Debug, Clone, Default)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => Instant::now() + REFRESH_SKEW < expiry,
            None => true,
        }
    }
}

/// Configuration for an OAuth2 client-credentials provider.
pub struct OAuth2Config {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: Option<String>,
}

/// Acquires and caches a bearer token via RFC 6749 §4.4 client-credentials
/// grant. `ensure_ready` is single-flight: concurrent callers during a
/// refresh all observe the result of the one in-flight fetch.
pub struct OAuth2ClientCredentials {
    config: OAuth2Config,
    http: reqwest::Client,
    cached: StdMutex<CachedToken>,
    refresh_lock: AsyncMutex<()>,
    error_handler: StdMutex<Option<ErrorHandler>>,
}

impl OAuth2ClientCredentials {
    pub fn new(config: OAuth2Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            cached: StdMutex::new(CachedToken::default()),
            refresh_lock: AsyncMutex::new(()),
            error_handler: StdMutex::new(None),
        }
    }

    /// Visible for tests: lets a test point the token fetch at a mock server.
    pub fn with_client(config: OAuth2Config, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            cached: StdMutex::new(CachedToken::default()),
            refresh_lock: AsyncMutex::new(()),
            error_handler: StdMutex::new(None),
        }
    }

    fn report_error(&self, message: impl Into<String>) {
        let error = AuthError::new(message);
        if let Some(handler) = self.error_handler.lock().unwrap().as_ref() {
            handler(&error);
        }
        tracing::warn!(error = %error, "oauth2 token acquisition failed");
    }

    fn form_body(&self) -> String {
        let mut body = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            form_encode(&self.config.client_id),
            form_encode(self.config.client_secret.expose_secret()),
        );
        if let Some(scope) = &self.config.scope {
            body.push_str("&scope=");
            body.push_str(&form_encode(scope));
        }
        body
    }

    async fn fetch_token(&self) {
        let response = self
            .http
            .post(&self.config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .header("Connection", "close")
            .body(self.form_body())
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.report_error(format!("OAuth2: request to token endpoint failed: {e}"));
                return;
            }
        };

        if !response.status().is_success() {
            self.report_error(format!(
                "OAuth2: token endpoint returned status {}",
                response.status()
            ));
            return;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(_) => {
                self.report_error("OAuth2: empty response from token endpoint".to_string());
                return;
            }
        };

        let Some(access_token) = body.get("access_token").and_then(|v| v.as_str()) else {
            self.report_error("OAuth2: token response missing access_token".to_string());
            return;
        };
        if access_token.is_empty() {
            self.report_error("OAuth2: token response missing access_token".to_string());
            return;
        }

        let ttl = body
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .filter(|&secs| secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(DEFAULT_TTL);

        let mut cached = self.cached.lock().unwrap();
        cached.access_token = access_token.to_string();
        cached.expires_at = Some(Instant::now() + ttl);
    }
}

#[async_trait]
impl AuthProvider for OAuth2ClientCredentials {
    async fn ensure_ready(&self) {
        if self.cached.lock().unwrap().is_fresh() {
            return;
        }

        // Single-flight: only the first caller through this lock performs the
        // HTTP fetch; everyone else waits for it to finish, then rechecks the
        // cache it populated (or left untouched on failure).
        let _permit = self.refresh_lock.lock().await;
        if self.cached.lock().unwrap().is_fresh() {
            return;
        }
        self.fetch_token().await;
    }

    async fn headers(&self) -> Vec<(String, String)> {
        let cached = self.cached.lock().unwrap();
        if cached.is_fresh() {
            vec![("Authorization".to_string(), format!("Bearer {}", cached.access_token))]
        } else {
            Vec::new()
        }
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.lock().unwrap() = Some(handler);
    }
}
