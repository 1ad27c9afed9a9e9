//! Direct TCP dialer for hosts that already route the private network

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use crate::{BoxedStream, Dialer, TransportError, TransportResult, TunnelAgent, TunnelSession};

#[derive(Debug, Clone)]
pub struct DirectAgentConfig {
    /// Timeout applied to every TCP connect
    pub connect_timeout: Duration,
    /// Organizations this host can reach. Empty means any.
    pub organizations: Vec<String>,
}

impl Default for DirectAgentConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            organizations: Vec::new(),
        }
    }
}

/// Tunnel agent that dials plain TCP
pub struct DirectAgent {
    config: DirectAgentConfig,
}

impl DirectAgent {
    pub fn new(config: DirectAgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TunnelAgent for DirectAgent {
    async fn establish(&self) -> TransportResult<TunnelSession> {
        let session = TunnelSession::generate();
        debug!(session = %session.id(), "Established direct tunnel session");
        Ok(session)
    }

    async fn connect_to_tunnel(
        &self,
        session: &TunnelSession,
        org_slug: &str,
    ) -> TransportResult<Arc<dyn Dialer>> {
        if !self.config.organizations.is_empty()
            && !self.config.organizations.iter().any(|org| org == org_slug)
        {
            return Err(TransportError::OrganizationMismatch(org_slug.to_string()));
        }

        debug!(session = %session.id(), org = %org_slug, "Created direct dialer");
        Ok(Arc::new(TcpDialer::new(self.config.connect_timeout)))
    }
}

/// Dials `host:port` over TCP with a connect timeout
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Format `host` and `port` as a connectable address, bracketing IPv6
    /// literals
    pub fn target(host: &str, port: u16) -> String {
        match host.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port).to_string(),
            Err(_) => format!("{}:{}", host, port),
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host: &str, port: u16) -> TransportResult<BoxedStream> {
        let target = Self::target(host, port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionError(format!("{}: {}", target, e)))?;

        // Docker API traffic is latency sensitive
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", target, e);
        }

        Ok(Box::new(stream))
    }
}
