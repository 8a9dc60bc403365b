//! Aggregate endpoint configuration (§6's Configuration section): bundles
//! the transport choice, keepalive tuning, validation mode, and negotiation
//! inputs into one value, mirroring the teacher's `turbomcp-auth::config`
//! builder-style configuration structs rather than threading each piece
//! through a constructor separately.

use std::sync::Arc;
use std::time::Duration;

use mcp_auth::AuthProvider;
use mcp_core::{Capabilities, Implementation, Result};
use mcp_transport::Transport;
use mcp_validator::{NoopValidator, ValidationMode, Validator};

use crate::keepalive::KeepaliveConfig;

/// Which transport to build, and the parameters each variant needs.
pub enum TransportKind {
    /// Frames over the current process's stdin/stdout.
    Stdio,
    /// A streaming-HTTP connection (§4.2's HTTPTransport variant).
    Http {
        url: String,
        /// PEM-encoded CA certificate to verify the peer with, in place of
        /// the platform's default trust store.
        tls_ca: Option<Vec<u8>>,
        connect_timeout: Duration,
        read_timeout: Duration,
        auth: Arc<dyn AuthProvider>,
    },
    /// An already-constructed transport, for an in-memory pair (whose two
    /// halves must be built together by the caller via
    /// `InMemoryTransport::pair()`) or any other transport this crate
    /// doesn't know how to construct itself.
    Prebuilt(Arc<dyn Transport>),
}

impl TransportKind {
    /// Builds (or unwraps) the configured transport.
    pub fn build(self) -> Result<Arc<dyn Transport>> {
        match self {
            Self::Stdio => Ok(Arc::new(mcp_transport_stdio::StdioTransport::new())),
            Self::Prebuilt(transport) => Ok(transport),
            Self::Http {
                url,
                tls_ca,
                connect_timeout,
                read_timeout,
                auth,
            } => {
                let config = mcp_transport_http::HttpTransportConfig {
                    endpoint: url,
                    connect_timeout,
                    read_timeout,
                    tls_ca,
                    ..mcp_transport_http::HttpTransportConfig::default()
                };
                let transport = mcp_transport_http::HttpTransport::connect(config, auth)?;
                Ok(Arc::new(transport))
            }
        }
    }
}

/// Everything needed to build one endpoint of a connection — a `Client` or
/// a `Server`, depending which crate's `from_config` constructor consumes
/// it. Fields mirror `spec.md` §6's `EndpointConfig` illustration.
pub struct EndpointConfig {
    pub transport: TransportKind,
    /// `None` disables keepalive (the default — it is only run when both
    /// peers negotiate `experimental.keepalive`, per §4.5).
    pub keepalive: Option<KeepaliveConfig>,
    pub validator: Arc<dyn Validator>,
    pub validation: ValidationMode,
    pub local_info: Implementation,
    pub capabilities: Capabilities,
}

impl EndpointConfig {
    /// An endpoint with no validation and no keepalive — just a transport
    /// and the identity/capabilities to negotiate with.
    pub fn new(transport: TransportKind, local_info: Implementation, capabilities: Capabilities) -> Self {
        Self {
            transport,
            keepalive: None,
            validator: Arc::new(NoopValidator),
            validation: ValidationMode::Off,
            local_info,
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_transport_kind_builds_a_transport() {
        let built = TransportKind::Stdio.build().unwrap();
        assert!(built.is_open());
    }

    #[test]
    fn prebuilt_transport_kind_passes_the_transport_through_unchanged() {
        let (a, _b) = mcp_transport_memory::InMemoryTransport::pair();
        let a: Arc<dyn Transport> = Arc::new(a);
        let built = TransportKind::Prebuilt(Arc::clone(&a)).build().unwrap();
        assert!(Arc::ptr_eq(&a, &built));
    }
}
