//! Dockbridge data model
//!
//! This crate defines the control-plane records the tunnel orchestrator works
//! with: organizations, applications, compute instances and their network
//! addresses.

pub mod model;

pub use model::{AddressKind, Application, ComputeInstance, NetworkAddress, Organization};

/// Port the Docker Engine API listens on inside a remote builder
pub const DEFAULT_REMOTE_PORT: u16 = 2375;

/// File name of the socket created inside an auto-allocated directory
pub const DEFAULT_SOCKET_FILENAME: &str = "docker.sock";

/// Kind tag of addresses reachable over the private overlay network
pub const PRIVATE_NET_KIND: &str = "privatenet";

/// Kind tag of publicly routable addresses
pub const PUBLIC_KIND: &str = "public";
