//! Error types for the MCP server

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// MCP server errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Protocol error (invalid JSON-RPC)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Missing or malformed arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation, resource or backup absent (or expired)
    #[error("{0}")]
    NotFound(String),

    /// Failure reported by a remote API
    #[error("Remote API error ({status}): {message}")]
    Remote {
        /// HTTP status, 0 when the request never got a response
        status: u16,
        /// Detail reported by the API or the transport
        message: String,
    },

    /// Credentials missing or the authorization flow failed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool access not permitted by the server configuration
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to JSON-RPC error
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            McpError::Protocol(msg) => JsonRpcError::invalid_request(msg),
            McpError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            McpError::InvalidInput(msg) => JsonRpcError::invalid_params(msg),
            McpError::NotFound(msg) => JsonRpcError::not_found(msg),
            McpError::Remote { status, message } => JsonRpcError::remote_failure(*status, message),
            McpError::Configuration(msg) => JsonRpcError::configuration(msg),
            McpError::Unauthorized(msg) => JsonRpcError::unauthorized(msg),
            McpError::Io(e) => JsonRpcError::internal_error(e.to_string()),
            McpError::Json(e) => JsonRpcError::invalid_params(e.to_string()),
            McpError::Internal(msg) => JsonRpcError::internal_error(msg),
        }
    }

    /// Error for a required argument that was not supplied
    pub fn missing(field: &str) -> Self {
        McpError::InvalidInput(format!("{} is required", field))
    }

    /// Error for a transport-level failure talking to a remote API
    pub fn transport(err: impl std::fmt::Display) -> Self {
        McpError::Remote {
            status: 0,
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        McpError::Remote {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

impl From<gtools_config::ConfigError> for McpError {
    fn from(err: gtools_config::ConfigError) -> Self {
        McpError::Configuration(err.to_string())
    }
}
