//! Content-Length framing (C1) and the narrow [`Transport`] capability trait (C2).
//!
//! Concrete transports (`mcp-transport-stdio`, `mcp-transport-memory`,
//! `mcp-transport-http`) depend on this crate for the shared framing logic
//! and the trait they all implement. Per §9's design note, this avoids deep
//! inheritance in favor of one small trait with three implementations.

pub mod framer;
pub mod metrics;
pub mod traits;

pub use framer::{FramerConfig, DEFAULT_MAX_FRAME_BYTES};
pub use metrics::TransportMetrics;
pub use traits::Transport;
