//! Authentication providers for outbound connections (§4.3).
//!
//! `AuthProvider` is the capability trait transports consult before sending
//! and when a peer challenges a request with `401 Unauthorized`. Two
//! implementations are provided: [`BearerAuth`] for a static pre-issued
//! token, and [`OAuth2ClientCredentials`] for the RFC 6749 client-credentials
//! grant with single-flight token refresh.

pub mod bearer;
pub mod challenge;
pub mod oauth2;
pub mod provider;

pub use bearer::BearerAuth;
pub use challenge::{parse_www_authenticate, Challenge};
pub use oauth2::OAuth2ClientCredentials;
pub use provider::{AuthError, AuthProvider};
