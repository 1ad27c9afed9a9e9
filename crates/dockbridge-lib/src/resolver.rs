//! Target resolution
//!
//! Decides which compute instance (and owning application) backs the tunnel
//! for an app, or that no tunnel is needed at all because an external
//! builder host was configured.

use async_trait::async_trait;
use dockbridge_proto::{Application, ComputeInstance};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::RemoteError;

/// Errors reported by a [`Provisioner`]
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Invalid app name: {0}")]
    InvalidAppName(String),

    #[error("No remote builder is configured for app {0}")]
    NotFound(String),

    #[error("Organization {0} is not allowed to use remote builders")]
    PermissionDenied(String),

    #[error("Inventory error: {0}")]
    Inventory(String),
}

/// Control-plane collaborator that looks up (or creates) the builder
/// instance for an app
///
/// Calls are idempotent from the caller's point of view.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn ensure_compute_instance(
        &self,
        app_name: &str,
    ) -> Result<(ComputeInstance, Application), ProvisionError>;
}

/// Outcome of target resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Tunnel through this instance, owned by `app`
    Instance {
        instance: ComputeInstance,
        app: Application,
    },
    /// An external builder host is already reachable; no tunnel is started
    Bypassed { remote_host: String },
}

pub struct TargetResolver {
    provisioner: Arc<dyn Provisioner>,
    remote_builder_host: Option<String>,
}

impl TargetResolver {
    pub fn new(provisioner: Arc<dyn Provisioner>, remote_builder_host: Option<String>) -> Self {
        Self {
            provisioner,
            remote_builder_host,
        }
    }

    pub async fn resolve(&self, app_name: &str) -> Result<Resolution, RemoteError> {
        if let Some(host) = self
            .remote_builder_host
            .as_deref()
            .filter(|host| !host.is_empty())
        {
            info!(remote_host = %host, "Remote builder host override set, skipping tunnel");
            return Ok(Resolution::Bypassed {
                remote_host: host.to_string(),
            });
        }

        let app_name = app_name.trim();
        if app_name.is_empty() {
            return Err(RemoteError::Resolution {
                app: String::new(),
                reason: "app name is required".to_string(),
            });
        }

        let (instance, app) = self
            .provisioner
            .ensure_compute_instance(app_name)
            .await
            .map_err(|e| RemoteError::Resolution {
                app: app_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            app = %app_name,
            builder = %app.name,
            instance = %instance.id,
            "Resolved remote builder"
        );

        Ok(Resolution::Instance { instance, app })
    }
}

/// One builder record of the inventory file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderEntry {
    /// App that builds through this builder
    pub app: String,
    /// Application that owns the builder instance
    pub builder: Application,
    pub instance: ComputeInstance,
}

/// Inventory of remote builders, loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Organizations permitted to use remote builders. Absent means all.
    #[serde(default)]
    pub allowed_organizations: Option<Vec<String>>,
    #[serde(default)]
    pub builders: Vec<BuilderEntry>,
}

/// [`Provisioner`] backed by a static inventory
///
/// Lookup only: an app without an inventory entry is reported as
/// [`ProvisionError::NotFound`].
pub struct InventoryProvisioner {
    inventory: Inventory,
}

impl InventoryProvisioner {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ProvisionError> {
        let inventory: Inventory =
            serde_yaml::from_str(yaml).map_err(|e| ProvisionError::Inventory(e.to_string()))?;
        Ok(Self::new(inventory))
    }

    pub fn from_file(path: &Path) -> Result<Self, ProvisionError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Inventory(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }
}

/// App names are lowercase letters, digits and dashes, not starting or
/// ending with a dash
fn validate_app_name(name: &str) -> Result<(), ProvisionError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if name.is_empty() || !valid_chars || name.starts_with('-') || name.ends_with('-') {
        return Err(ProvisionError::InvalidAppName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Provisioner for InventoryProvisioner {
    async fn ensure_compute_instance(
        &self,
        app_name: &str,
    ) -> Result<(ComputeInstance, Application), ProvisionError> {
        validate_app_name(app_name)?;

        let entry = self
            .inventory
            .builders
            .iter()
            .find(|entry| entry.app == app_name)
            .ok_or_else(|| ProvisionError::NotFound(app_name.to_string()))?;

        if let Some(allowed) = &self.inventory.allowed_organizations {
            let slug = entry.builder.org_slug();
            if !allowed.iter().any(|org| org == slug) {
                return Err(ProvisionError::PermissionDenied(slug.to_string()));
            }
        }

        let mut instance = entry.instance.clone();
        if instance.app_id.is_empty() {
            instance.app_id = entry.builder.id.clone();
        }

        Ok((instance, entry.builder.clone()))
    }
}
