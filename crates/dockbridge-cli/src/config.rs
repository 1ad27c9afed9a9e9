//! Global CLI configuration management
//!
//! Stores the default app and inventory location in ~/.dockbridge/config.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Global CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockbridgeConfig {
    /// App used when `--app` is not given
    #[serde(default)]
    pub default_app: Option<String>,

    /// Inventory file used when `--inventory` is not given
    #[serde(default)]
    pub inventory: Option<PathBuf>,
}

impl DockbridgeConfig {
    /// Pick the app to work with: explicit flag first, then the stored default
    pub fn resolve_app_name(&self, flag: Option<String>) -> Option<String> {
        flag.filter(|name| !name.trim().is_empty())
            .or_else(|| self.default_app.clone())
    }

    /// Pick the inventory file: explicit flag, stored path, then the default
    /// location
    pub fn resolve_inventory(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        match flag.or_else(|| self.inventory.clone()) {
            Some(path) => Ok(path),
            None => Ok(ConfigManager::config_dir()?.join("inventory.yaml")),
        }
    }
}

/// Configuration manager
pub struct ConfigManager;

impl ConfigManager {
    /// Directory holding all dockbridge state
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".dockbridge"))
    }

    /// Get the config file path
    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load the configuration from disk
    pub fn load() -> Result<DockbridgeConfig> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load the configuration from a specific file
    pub fn load_from(path: &Path) -> Result<DockbridgeConfig> {
        // Return default config if file doesn't exist
        if !path.exists() {
            return Ok(DockbridgeConfig::default());
        }

        let json =
            fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;

        let config: DockbridgeConfig = serde_json::from_str(&json)
            .context(format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Save the configuration to disk
    pub fn save(config: &DockbridgeConfig) -> Result<()> {
        Self::save_to(&Self::get_config_path()?, config)
    }

    /// Save the configuration to a specific file
    pub fn save_to(path: &Path, config: &DockbridgeConfig) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(path, json).context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Set the default app
    pub fn set_app(name: String) -> Result<()> {
        let mut config = Self::load()?;
        config.default_app = Some(name);
        Self::save(&config)
    }

    /// Get the default app
    pub fn get_app() -> Result<Option<String>> {
        let config = Self::load()?;
        Ok(config.default_app)
    }

    /// Clear the default app
    pub fn clear_app() -> Result<()> {
        let mut config = Self::load()?;
        config.default_app = None;
        Self::save(&config)
    }
}
