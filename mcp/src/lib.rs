//! # gtools MCP Server
//!
//! Model Context Protocol (MCP) server exposing Google Drive, Sheets, Docs,
//! Gmail, Calendar and Apps Script operations as tools over a JSON-RPC 2.0
//! line protocol on stdio.
//!
//! ## Architecture
//!
//! - **Protocol Layer**: JSON-RPC 2.0 types and the newline-delimited transport
//! - **Server Layer**: request routing, tool registry, confirmation gate
//! - **Handler Layer**: one module of tool handlers per backend
//! - **Remote Layer**: typed request builders over an HTTP client with OAuth
//! - **Safety Layer**: pending operation store, backup writer, access policy
//!
//! Mutating tools either run behind the confirmation gate (a `confirm` or
//! `dry_run` argument) or, for script updates, through a two-phase
//! propose/execute protocol with a backup written before the change.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gtools_config::ConfigLoader;
//! use gtools_mcp::McpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::from_env().load()?;
//!     let server = McpServer::from_config(config)?;
//!     server.serve_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod backup;
pub mod context;
pub mod error;
pub mod handlers;
pub mod pending;
pub mod permissions;
pub mod protocol;
pub mod remote;
pub mod server;

// Re-export main types
pub use auth::{CredentialProvider, OAuthCredentials, StaticToken};
pub use backup::{Backup, BackupWriter};
pub use context::McpServerContext;
pub use error::{McpError, Result};
pub use handlers::ToolOutcome;
pub use pending::{OperationKind, PendingOperation, PendingOperationStore, Proposal};
pub use permissions::AccessPolicy;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, LineTransport, StdioTransport};
pub use remote::{ApiRequest, Backend, HttpRemote, RemoteApi};
pub use server::{McpServer, ServerConfig};
