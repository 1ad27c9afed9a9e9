//! Orchestrator error taxonomy
//!
//! Every variant here is fatal for a run. Per-connection failures live in
//! [`crate::relay::RelayError`] and never reach this type.

use dockbridge_transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Failed to resolve remote builder for app '{app}': {reason}")]
    Resolution { app: String, reason: String },

    #[error("Could not find a private network address for instance {instance_id}")]
    NoPrivateAddress { instance_id: String },

    #[error("Failed to prepare socket endpoint {}: {source}", .path.display())]
    EndpointPrepare {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Tunnel unavailable ({target}): {source}")]
    TunnelUnavailable {
        target: String,
        source: TransportError,
    },

    #[error("Failed to bind socket {}: {source}\n\nTroubleshooting:\n  • Check that the parent directory exists and is writable\n  • Unix socket paths are limited to about 100 bytes", .path.display())]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Proxy stopped accepting connections: {0}")]
    FatalProxy(#[source] std::io::Error),
}
