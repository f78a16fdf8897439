//! Configuration loading utilities
//!
//! Reads the optional configuration file (TOML or JSON), then applies
//! environment overrides. Environment wins over the file, the file wins
//! over the built-in defaults.

use crate::{Config, ConfigError, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "MCP_CONFIG_FILE";

/// Environment variable names for individual overrides
pub mod env {
    pub const CLIENT_SECRETS_FILE: &str = "GOOGLE_CLIENT_SECRETS_FILE";
    pub const TOKEN_FILE: &str = "GOOGLE_TOKEN_FILE";
    pub const BACKUP_DIR: &str = "GOOGLE_BACKUP_DIR";
    pub const LOG_FILE: &str = "GOOGLE_LOG_FILE";
    pub const MCP_AUTH_TOKEN: &str = "MCP_AUTH_TOKEN";
    pub const READ_ONLY: &str = "GTOOLS_READ_ONLY";
}

/// Configuration loader
pub struct ConfigLoader {
    /// Configuration file, if any
    path: Option<PathBuf>,
    /// Whether a missing file falls back to defaults
    use_defaults: bool,
    /// Whether to apply environment overrides
    use_env: bool,
    /// Whether to validate configuration after loading
    validate: bool,
}

impl ConfigLoader {
    /// Create a loader reading the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            use_defaults: true,
            use_env: true,
            validate: true,
        }
    }

    /// Create a loader for the file named by `MCP_CONFIG_FILE`, if set
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from),
            use_defaults: true,
            use_env: true,
            validate: true,
        }
    }

    /// Set whether a missing file falls back to defaults
    pub fn use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    /// Set whether environment overrides are applied
    pub fn use_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    /// Set whether to validate configuration
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// The configuration file this loader reads
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the complete configuration
    pub fn load(&self) -> Result<Config> {
        let mut config = match &self.path {
            Some(path) if path.exists() => load_file(path)?,
            Some(path) if !self.use_defaults => {
                return Err(ConfigError::NotFound(path.clone()));
            }
            Some(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Config::default()
            }
            None => Config::default(),
        };

        if self.use_env {
            apply_overrides(&mut config, |key| std::env::var(key).ok());
        }

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse a configuration file, picking the format from its extension
pub fn load_file(path: &Path) -> Result<Config> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let content = std::fs::read_to_string(path)?;

    let config = match extension.as_str() {
        "toml" => toml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        other => return Err(ConfigError::UnsupportedFormat(format!(".{}", other))),
    };

    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply environment overrides through `lookup`
///
/// Empty values are ignored so that an exported-but-blank variable does not
/// wipe a value from the file.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(env::CLIENT_SECRETS_FILE) {
        config.client_secrets_file = PathBuf::from(v);
    }
    if let Some(v) = get(env::TOKEN_FILE) {
        config.token_file = PathBuf::from(v);
    }
    if let Some(v) = get(env::BACKUP_DIR) {
        config.backup_dir = PathBuf::from(v);
    }
    if let Some(v) = get(env::LOG_FILE) {
        config.log_file = Some(PathBuf::from(v));
    }
    if let Some(v) = get(env::MCP_AUTH_TOKEN) {
        config.mcp_auth_token = Some(v);
    }
    if let Some(v) = get(env::READ_ONLY) {
        config.read_only = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
}

/// Save configuration as TOML
pub fn save_toml(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = Config::default();
        let vars: HashMap<&str, &str> = [
            (env::BACKUP_DIR, "/srv/backups"),
            (env::MCP_AUTH_TOKEN, "abc"),
            (env::READ_ONLY, "true"),
        ]
        .into_iter()
        .collect();

        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.backup_dir, PathBuf::from("/srv/backups"));
        assert_eq!(config.mcp_auth_token.as_deref(), Some("abc"));
        assert!(config.read_only);
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = Config::default();
        let original = config.token_file.clone();

        apply_overrides(&mut config, |k| {
            (k == env::TOKEN_FILE).then(|| "  ".to_string())
        });

        assert_eq!(config.token_file, original);
    }

    #[test]
    fn test_missing_file_without_defaults() {
        let loader = ConfigLoader::new("/nonexistent/gtools.toml")
            .use_defaults(false)
            .use_env(false);
        assert!(matches!(loader.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_missing_file_with_defaults() {
        let loader = ConfigLoader::new("/nonexistent/gtools.toml").use_env(false);
        let config = loader.load().unwrap();
        assert_eq!(config, Config::default());
    }
}
