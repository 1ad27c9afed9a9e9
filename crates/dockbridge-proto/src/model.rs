//! Control-plane records

use serde::{Deserialize, Serialize};

use crate::{PRIVATE_NET_KIND, PUBLIC_KIND};

/// Organization that owns applications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    /// Organization identity used when dialing into its private network
    pub slug: String,
}

/// An application as known by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub organization: Organization,
}

impl Application {
    pub fn org_slug(&self) -> &str {
        &self.organization.slug
    }
}

/// Network address kind tag
///
/// Unknown tags are preserved verbatim so that they round-trip and never
/// match the private overlay marker by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressKind {
    /// Reachable only over the organization's private overlay network
    PrivateNet,
    /// Publicly routable
    Public,
    Other(String),
}

impl AddressKind {
    pub fn is_private_net(&self) -> bool {
        matches!(self, AddressKind::PrivateNet)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AddressKind::PrivateNet => PRIVATE_NET_KIND,
            AddressKind::Public => PUBLIC_KIND,
            AddressKind::Other(tag) => tag,
        }
    }
}

impl From<String> for AddressKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            PRIVATE_NET_KIND => AddressKind::PrivateNet,
            PUBLIC_KIND => AddressKind::Public,
            _ => AddressKind::Other(tag),
        }
    }
}

impl From<&str> for AddressKind {
    fn from(tag: &str) -> Self {
        AddressKind::from(tag.to_string())
    }
}

impl From<AddressKind> for String {
    fn from(kind: AddressKind) -> Self {
        match kind {
            AddressKind::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AddressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network address of a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub kind: AddressKind,
    pub address: String,
}

impl NetworkAddress {
    pub fn new(kind: impl Into<AddressKind>, address: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            address: address.into(),
        }
    }

    pub fn private_net(address: impl Into<String>) -> Self {
        Self::new(AddressKind::PrivateNet, address)
    }

    pub fn public(address: impl Into<String>) -> Self {
        Self::new(AddressKind::Public, address)
    }
}

/// A compute instance (the remote builder machine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub id: String,
    /// Addresses in the order the control plane reported them
    #[serde(default)]
    pub addresses: Vec<NetworkAddress>,
    /// Identifier of the owning application
    #[serde(default)]
    pub app_id: String,
}
