//! Transport seam between the orchestrator and the overlay tunnel
//!
//! The orchestrator never talks to the overlay network directly. It asks a
//! [`TunnelAgent`] for a session, turns the session into a [`Dialer`] for one
//! organization, and then opens one [`TunnelStream`] per local connection.
//!
//! ```text
//! ┌──────────────────────┐   establish()        ┌──────────────────┐
//! │   dockbridge-lib     │ ───────────────────▶ │   TunnelAgent    │
//! │   (orchestrator)     │   connect_to_tunnel  │                  │
//! └──────────┬───────────┘ ◀─────────────────── └──────────────────┘
//!            │ dial(host, port)                    Arc<dyn Dialer>
//!            ↓
//!      Box<dyn TunnelStream>  (one per accepted local connection)
//! ```
//!
//! [`DirectAgent`] is the bundled implementation: it assumes the host already
//! routes the organization's private network (for example through a
//! WireGuard interface) and dials plain TCP.

mod direct;

pub use direct::{DirectAgent, DirectAgentConfig, TcpDialer};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Organization {0} is not reachable from this session")]
    OrganizationMismatch(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// A byte stream opened through the tunnel
///
/// Anything that is `AsyncRead + AsyncWrite` qualifies; the relay never looks
/// at the bytes.
pub trait TunnelStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> TunnelStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Boxed stream handed out by a [`Dialer`]
pub type BoxedStream = Box<dyn TunnelStream>;

/// Opens connections into one organization's private network
///
/// Implementations are shared across relay tasks and must tolerate
/// concurrent `dial` calls. Every call opens a fresh stream.
#[async_trait]
pub trait Dialer: Send + Sync + Debug {
    /// Open a stream to `host:port` inside the private network
    async fn dial(&self, host: &str, port: u16) -> TransportResult<BoxedStream>;
}

/// Authenticated handle to the tunnel subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSession {
    id: String,
}

impl TunnelSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Create a session with a random identifier
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Establishes tunnel sessions and hands out dialers
#[async_trait]
pub trait TunnelAgent: Send + Sync {
    /// Establish an authenticated session with the tunnel subsystem
    async fn establish(&self) -> TransportResult<TunnelSession>;

    /// Obtain a dialer for the private network of `org_slug`
    async fn connect_to_tunnel(
        &self,
        session: &TunnelSession,
        org_slug: &str,
    ) -> TransportResult<Arc<dyn Dialer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::OrganizationMismatch("acme".to_string());
        assert_eq!(
            err.to_string(),
            "Organization acme is not reachable from this session"
        );

        let err = TransportError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_generated_sessions_are_unique() {
        let a = TunnelSession::generate();
        let b = TunnelSession::generate();
        assert_ne!(a, b);
        assert_eq!(TunnelSession::new("s-1").id(), "s-1");
    }

    #[tokio::test]
    async fn test_duplex_is_a_tunnel_stream() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (a, mut b) = tokio::io::duplex(64);
        let mut boxed: BoxedStream = Box::new(a);
        boxed.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
