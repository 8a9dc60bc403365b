//! Streaming-HTTP [`Transport`] (§4.2's HTTPTransport variant).
//!
//! Each outbound [`Message`] is one `POST` to the configured endpoint with
//! `Content-Type: application/json`; its response body carries one
//! `Content-Length`-framed JSON-RPC message (the synchronous reply, when
//! there is one). A long-lived `GET` against the same endpoint streams
//! server-originated messages, framed the same way, for as long as the
//! transport stays open. Both sources feed one inbound queue, since the
//! Router's read loop is the sole `recv()` caller and does not care which
//! HTTP leg a message arrived on.
//!
//! Grounded on the teacher's `turbomcp-http::HttpTransport` (SSE endpoint
//! discovery, auto-reconnect, session headers), narrowed to the framing and
//! auth contract this runtime actually specifies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use mcp_auth::AuthProvider;
use mcp_core::{Error, Message, Result};
use mcp_transport::framer::{self, FramerConfig};
use mcp_transport::metrics::AtomicMetrics;
use mcp_transport::{Transport, TransportMetrics};

/// Configuration for an [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub framer: FramerConfig,
    /// PEM-encoded CA certificate used to verify the peer, in place of the
    /// platform's default trust store (§4.3 step 3, §9's TLS Open Question —
    /// version pinning itself stays a caller concern via `rustls::ClientConfig`,
    /// but the CA to trust is this crate's to apply since it owns the
    /// `reqwest::Client` construction).
    pub tls_ca: Option<Vec<u8>>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            framer: FramerConfig::default(),
            tls_ca: None,
        }
    }
}

/// Client-side streaming-HTTP transport.
pub struct HttpTransport {
    http: reqwest::Client,
    config: HttpTransportConfig,
    auth: std::sync::Arc<dyn AuthProvider>,
    inbound_tx: mpsc::UnboundedSender<Result<Message>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<Result<Message>>>,
    metrics: AtomicMetrics,
    open: AtomicBool,
    stream_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Builds a transport and starts its background server-stream reader.
    pub fn connect(config: HttpTransportConfig, auth: std::sync::Arc<dyn AuthProvider>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(pem) = &config.tls_ca {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| Error::Transport(format!("invalid tls_ca certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            http,
            config,
            auth,
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            metrics: AtomicMetrics::new(),
            open: AtomicBool::new(true),
            stream_task: AsyncMutex::new(None),
        };
        transport.spawn_server_stream();
        Ok(transport)
    }

    fn spawn_server_stream(&self) {
        let http = self.http.clone();
        let endpoint = self.config.endpoint.clone();
        let auth = self.auth.clone();
        let framer_config = self.config.framer;
        let tx = self.inbound_tx.clone();

        let handle = tokio::spawn(async move {
            auth.ensure_ready().await;
            let headers = auth.headers().await;
            let mut request = http.get(&endpoint).header("Accept", "application/json");
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(Err(Error::Transport(format!("server stream connect failed: {e}"))));
                    return;
                }
            };

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                let challenge = response
                    .headers()
                    .get(reqwest::header::WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(mcp_auth::parse_www_authenticate);
                let message = match challenge {
                    Some(c) => format!("server stream unauthorized: {:?}", c.error),
                    None => "server stream unauthorized".to_string(),
                };
                let _ = tx.send(Err(Error::AuthChallenge(message)));
                return;
            }
            if !response.status().is_success() {
                let _ = tx.send(Err(Error::Transport(format!(
                    "server stream returned status {}",
                    response.status()
                ))));
                return;
            }

            let byte_stream = response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
            let mut reader = tokio::io::BufReader::new(tokio_util::io::StreamReader::new(byte_stream));

            loop {
                match framer::read_frame(&mut reader, &framer_config).await {
                    Ok(Some(payload)) => {
                        let parsed = serde_json::from_slice::<Message>(&payload)
                            .map_err(|e| Error::Protocol(format!("failed to parse server message: {e}")));
                        if tx.send(parsed).is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
            }
        });

        // `connect` has exclusive access to `self` at this point, so the lock
        // is always uncontended; stored only so `close()` can abort the task.
        *self
            .stream_task
            .try_lock()
            .expect("stream_task is uncontended during construction") = Some(handle);
    }

    async fn post_message(&self, message: &Message) -> Result<()> {
        self.auth.ensure_ready().await;
        let headers = self.auth.headers().await;

        let payload = serde_json::to_vec(message)
            .map_err(|e| Error::Protocol(format!("failed to serialize message: {e}")))?;

        let mut request = self
            .http
            .post(&self.config.endpoint)
            .timeout(self.config.read_timeout)
            .header("Content-Type", "application/json")
            .body(payload.clone());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("POST failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(reqwest::header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(mcp_auth::parse_www_authenticate);
            let detail = match challenge {
                Some(c) => format!("{:?}", c.error),
                None => "no challenge details".to_string(),
            };
            return Err(Error::AuthChallenge(format!("401 Unauthorized: {detail}")));
        }
        if !response.status().is_success() {
            return Err(Error::Transport(format!("POST returned status {}", response.status())));
        }

        self.metrics.record_sent(payload.len());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;
        if body.is_empty() {
            return Ok(());
        }

        let mut reader = std::io::Cursor::new(body.to_vec());
        match framer::read_frame(&mut reader, &self.config.framer).await? {
            Some(reply_payload) => {
                self.metrics.record_received(reply_payload.len());
                let reply = serde_json::from_slice(&reply_payload)
                    .map_err(|e| Error::Protocol(format!("failed to parse response body: {e}")))?;
                let _ = self.inbound_tx.send(Ok(reply));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: Message) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        self.post_message(&message).await
    }

    async fn recv(&self) -> Result<Message> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }
        let mut rx = self.inbound_rx.lock().await;
        match rx.recv().await {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(e),
            None => Err(Error::TransportClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert!(config.tls_ca.is_none());
    }

    #[tokio::test]
    async fn an_invalid_tls_ca_is_rejected_at_construction() {
        let config = HttpTransportConfig {
            endpoint: "https://example.invalid".to_string(),
            tls_ca: Some(b"not a certificate".to_vec()),
            ..HttpTransportConfig::default()
        };
        let err = HttpTransport::connect(config, std::sync::Arc::new(mcp_auth::BearerAuth::new("token")))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
