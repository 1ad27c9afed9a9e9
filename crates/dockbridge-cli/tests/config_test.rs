//! Config file tests

use dockbridge_cli::config::{ConfigManager, DockbridgeConfig};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_loads_defaults() {
    let temp = TempDir::new().unwrap();
    let config = ConfigManager::load_from(&temp.path().join("config.json")).unwrap();
    assert_eq!(config, DockbridgeConfig::default());
}

#[test]
fn test_save_creates_directory_and_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".dockbridge").join("config.json");

    let config = DockbridgeConfig {
        default_app: Some("my-app".to_string()),
        inventory: Some(PathBuf::from("/srv/inventory.yaml")),
    };
    ConfigManager::save_to(&path, &config).unwrap();

    assert!(path.exists());
    assert_eq!(ConfigManager::load_from(&path).unwrap(), config);
}

#[test]
fn test_corrupt_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = ConfigManager::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
