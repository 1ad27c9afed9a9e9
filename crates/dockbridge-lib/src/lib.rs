//! Dockbridge - expose a remote builder's Docker socket locally
//!
//! A remote builder is a compute instance whose Docker Engine API listens on
//! a private overlay network. This crate resolves the builder for an app,
//! picks its private address, binds a local Unix socket and relays every
//! local connection through the tunnel to the remote engine.
//!
//! # Quick Start
//!
//! ```ignore
//! use dockbridge_lib::{InventoryProvisioner, RemoteSocket, RemoteSocketConfig};
//! use dockbridge_transport::{DirectAgent, DirectAgentConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = Arc::new(InventoryProvisioner::from_file("inventory.yaml".as_ref())?);
//! let agent = Arc::new(DirectAgent::new(DirectAgentConfig::default()));
//!
//! let remote = RemoteSocket::new(RemoteSocketConfig::new("my-app"), provisioner, agent)
//!     .on_ready(|ready| println!("Docker Engine @ {}", ready.docker_host));
//!
//! let shutdown = CancellationToken::new();
//! remote.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod dialer;
pub mod endpoint;
pub mod error;
pub mod orchestrator;
pub mod relay;
pub mod resolver;

pub use address::select_private_address;
pub use dialer::{establish_session, obtain_dialer};
pub use endpoint::SocketEndpoint;
pub use error::RemoteError;
pub use orchestrator::{ReadyInfo, RemoteSocket, RemoteSocketConfig, RunOutcome};
pub use relay::{ConnectionState, Direction, RelayConfig, RelayError, RelayServer, RelayStats};
pub use resolver::{
    BuilderEntry, Inventory, InventoryProvisioner, ProvisionError, Provisioner, Resolution,
    TargetResolver,
};

// Re-export the model and transport seam for convenience
pub use dockbridge_proto::{
    AddressKind, Application, ComputeInstance, NetworkAddress, Organization, DEFAULT_REMOTE_PORT,
    DEFAULT_SOCKET_FILENAME,
};
pub use dockbridge_transport::{
    BoxedStream, Dialer, DirectAgent, DirectAgentConfig, TransportError, TunnelAgent,
    TunnelSession,
};
pub use tokio_util::sync::CancellationToken;
