//! MCP protocol implementation
//!
//! Core protocol types and the line-delimited transport used for Model
//! Context Protocol communication over JSON-RPC 2.0.

pub mod jsonrpc;
pub mod transport;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use transport::{Incoming, LineTransport, StdioTransport};
