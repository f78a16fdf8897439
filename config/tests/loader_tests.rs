//! Tests for configuration file loading

use gtools_config::{load_file, save_toml, Config, ConfigError, ConfigLoader};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("gtools.toml");
    std::fs::write(
        &path,
        r#"
backup_dir = "/data/backups"
mcp_auth_token = "token-from-file"
operation_ttl_secs = 300
"#,
    )
    .unwrap();

    let config = ConfigLoader::new(&path).use_env(false).load().unwrap();

    assert_eq!(config.backup_dir, PathBuf::from("/data/backups"));
    assert_eq!(config.mcp_auth_token.as_deref(), Some("token-from-file"));
    assert_eq!(config.operation_ttl_secs, 300);
    // Unset keys keep their defaults
    assert_eq!(config.scopes, Config::default().scopes);
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("gtools.json");
    std::fs::write(
        &path,
        r#"{"scopes": ["https://www.googleapis.com/auth/drive"], "read_only": true}"#,
    )
    .unwrap();

    let config = load_file(&path).unwrap();

    assert_eq!(config.scopes, vec!["https://www.googleapis.com/auth/drive"]);
    assert!(config.read_only);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("gtools.ini");
    std::fs::write(&path, "backup_dir=/tmp").unwrap();

    assert!(matches!(
        load_file(&path),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_invalid_file_fails_validation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("gtools.toml");
    std::fs::write(&path, "scopes = []\n").unwrap();

    let result = ConfigLoader::new(&path).use_env(false).load();
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("gtools.toml");

    let config = Config {
        backup_dir: PathBuf::from("/var/lib/gtools/backups"),
        read_only: true,
        ..Config::default()
    };
    save_toml(&config, &path).unwrap();

    let reloaded = load_file(&path).unwrap();
    assert_eq!(reloaded.backup_dir, config.backup_dir);
    assert!(reloaded.read_only);
}
