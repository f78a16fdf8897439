//! Server settings
//!
//! The settings model shared by the binary and the server library, with the
//! default locations under `~/.google`.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scopes requested when the configuration does not name any
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/script.projects",
    "https://www.googleapis.com/auth/script.deployments",
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/gmail.readonly",
];

/// Default validity window of a pending operation (10 minutes)
pub const DEFAULT_OPERATION_TTL_SECS: u64 = 600;

/// Default timeout for a single remote API request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth client secrets (installed-app credentials)
    pub client_secrets_file: PathBuf,

    /// Authorized-user token cache
    pub token_file: PathBuf,

    /// Directory receiving backup artifacts
    pub backup_dir: PathBuf,

    /// Operation log file (in addition to stderr)
    pub log_file: Option<PathBuf>,

    /// Access token that must be configured before any tool may run
    pub mcp_auth_token: Option<String>,

    /// OAuth scopes requested from the authorization server
    pub scopes: Vec<String>,

    /// Only expose read-only tools
    pub read_only: bool,

    /// Validity window of pending operations, in seconds
    pub operation_ttl_secs: u64,

    /// Timeout for a single remote API request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let base = google_dir();

        Self {
            client_secrets_file: base.join("oauth.keys.json"),
            token_file: base.join("token.json"),
            backup_dir: base.join("backups"),
            log_file: Some(base.join("mcp_operations.log")),
            mcp_auth_token: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            read_only: false,
            operation_ttl_secs: DEFAULT_OPERATION_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scopes.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one OAuth scope is required".to_string(),
            ));
        }

        if self.operation_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "operation_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the access token has been configured
    pub fn auth_configured(&self) -> bool {
        self.mcp_auth_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Copy of the configuration that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.mcp_auth_token.is_some() {
            config.mcp_auth_token = Some("********".to_string());
        }
        config
    }
}

/// `~/.google`, or `./.google` when no home directory is known
fn google_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".google")
}
