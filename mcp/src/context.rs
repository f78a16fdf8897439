//! MCP server context
//!
//! Shared state handed to every tool handler: configuration, access policy,
//! the remote façade, the pending operation store and the backup writer.

use crate::auth::OAuthCredentials;
use crate::backup::BackupWriter;
use crate::error::Result;
use crate::pending::PendingOperationStore;
use crate::permissions::AccessPolicy;
use crate::remote::{HttpRemote, RemoteApi};
use gtools_config::Config;
use std::sync::Arc;
use std::time::Duration;

/// MCP server context
pub struct McpServerContext {
    /// Effective configuration
    pub config: Config,

    /// Which tools may be called
    pub access: AccessPolicy,

    /// Remote API façade
    pub remote: Arc<dyn RemoteApi>,

    /// Two-phase operations awaiting execution
    pub operations: PendingOperationStore,

    /// Writer for pre-change snapshots
    pub backups: BackupWriter,
}

impl McpServerContext {
    /// Create a context over an arbitrary remote façade
    pub fn new(config: Config, remote: Arc<dyn RemoteApi>) -> Self {
        let access = AccessPolicy::from_config(&config);
        let operations =
            PendingOperationStore::new(Duration::from_secs(config.operation_ttl_secs));
        let backups = BackupWriter::new(config.backup_dir.clone());

        Self {
            config,
            access,
            remote,
            operations,
            backups,
        }
    }

    /// Create a context talking to the real APIs with OAuth credentials
    pub fn from_config(config: Config) -> Result<Self> {
        let credentials = Arc::new(OAuthCredentials::new(&config));
        let remote = HttpRemote::new(
            credentials,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self::new(config, Arc::new(remote)))
    }

    /// Remote façade as a trait object reference
    pub fn api(&self) -> &dyn RemoteApi {
        self.remote.as_ref()
    }
}
