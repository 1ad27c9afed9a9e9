//! Tunnel dialer adapter

use dockbridge_transport::{Dialer, TunnelAgent, TunnelSession};
use std::sync::Arc;
use tracing::debug;

use crate::error::RemoteError;

/// Establish a session with the tunnel agent
pub async fn establish_session(agent: &dyn TunnelAgent) -> Result<TunnelSession, RemoteError> {
    agent
        .establish()
        .await
        .map_err(|source| RemoteError::TunnelUnavailable {
            target: "tunnel agent".to_string(),
            source,
        })
}

/// Obtain a dialer into the private network of `org_slug`
pub async fn obtain_dialer(
    agent: &dyn TunnelAgent,
    session: &TunnelSession,
    org_slug: &str,
) -> Result<Arc<dyn Dialer>, RemoteError> {
    let dialer = agent
        .connect_to_tunnel(session, org_slug)
        .await
        .map_err(|source| RemoteError::TunnelUnavailable {
            target: format!("organization {}", org_slug),
            source,
        })?;

    debug!(session = %session.id(), org = %org_slug, "Tunnel dialer ready");
    Ok(dialer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dockbridge_transport::{DirectAgent, DirectAgentConfig, TransportError, TransportResult};

    struct RejectingAgent;

    #[async_trait]
    impl TunnelAgent for RejectingAgent {
        async fn establish(&self) -> TransportResult<TunnelSession> {
            Err(TransportError::AuthenticationFailed("token expired".to_string()))
        }

        async fn connect_to_tunnel(
            &self,
            _session: &TunnelSession,
            _org_slug: &str,
        ) -> TransportResult<Arc<dyn Dialer>> {
            Err(TransportError::ConnectionError("network unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_establish_failure_is_tunnel_unavailable() {
        let err = establish_session(&RejectingAgent).await.unwrap_err();
        match err {
            RemoteError::TunnelUnavailable { source, .. } => {
                assert!(matches!(source, TransportError::AuthenticationFailed(_)))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_wraps_upstream_cause() {
        let session = TunnelSession::new("s-1");
        let err = obtain_dialer(&RejectingAgent, &session, "personal")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tunnel unavailable (organization personal): Connection error: network unreachable"
        );
    }

    #[tokio::test]
    async fn test_obtain_dialer_from_direct_agent() {
        let agent = DirectAgent::new(DirectAgentConfig {
            organizations: vec!["personal".to_string()],
            ..Default::default()
        });
        let session = establish_session(&agent).await.unwrap();

        assert!(obtain_dialer(&agent, &session, "personal").await.is_ok());
        assert!(matches!(
            obtain_dialer(&agent, &session, "acme").await.unwrap_err(),
            RemoteError::TunnelUnavailable {
                source: TransportError::OrganizationMismatch(_),
                ..
            }
        ));
    }
}
