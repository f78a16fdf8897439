//! MCP server implementation
//!
//! Routes JSON-RPC requests to the protocol methods and `tools/call` to the
//! tool handlers. Tool failures are folded into the text envelope here and
//! nowhere else.

pub mod confirmation;
pub mod tools;

use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::handlers::{calendar, docs, drive, gmail, script, sheets, ToolOutcome};
use crate::protocol::{
    Incoming, JsonRpcError, JsonRpcRequest, JsonRpcResponse, LineTransport, StdioTransport,
};
use gtools_config::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

pub use confirmation::{GateDecision, Preview, PreviewKind, Threshold};
pub use tools::ToolDefinition;

/// MCP protocol revision advertised by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gtools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// MCP server
pub struct McpServer {
    context: Arc<McpServerContext>,
    config: ServerConfig,
}

impl McpServer {
    /// Create a server over an existing context
    pub fn new(context: Arc<McpServerContext>, config: ServerConfig) -> Self {
        info!(
            server = %config.name,
            version = %config.version,
            access = %context.access.description(),
            "MCP server initialized"
        );

        Self { context, config }
    }

    /// Create a server talking to the real APIs
    pub fn from_config(config: Config) -> Result<Self> {
        let context = McpServerContext::from_config(config)?;
        Ok(Self::new(Arc::new(context), ServerConfig::default()))
    }

    /// Shared handler context
    pub fn context(&self) -> &Arc<McpServerContext> {
        &self.context
    }

    /// Serve requests over stdio
    pub async fn serve_stdio(&self) -> Result<()> {
        let mut transport = StdioTransport::stdio();
        info!("MCP server listening on stdio");
        self.serve(&mut transport).await
    }

    /// Serve requests until the peer closes the stream
    pub async fn serve<R, W>(&self, transport: &mut LineTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let response = match transport.read_request().await {
                Ok(Some(Incoming::Request(request))) => self.handle_request(request).await,
                Ok(Some(Incoming::Malformed(_))) => {
                    Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()))
                }
                Ok(None) => {
                    info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read request");
                    return Err(e.into());
                }
            };

            if let Some(response) = response {
                transport.write_response(&response).await?;
            }
        }

        transport.close().await?;
        Ok(())
    }

    /// Handle one JSON-RPC request; notifications get no response
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            info!(method = %request.method, "Notification received");
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tool_call(request.params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                warn!(method = %request.method, error = %e, "Request failed");
                JsonRpcResponse::error(Some(id), e.to_jsonrpc())
            }
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        info!(?params, "Received initialize request");

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": self.config.name,
                "version": self.config.version
            },
            "access": {
                "description": self.context.access.description(),
                "authConfigured": self.context.access.auth_configured,
                "readOnly": self.context.access.read_only
            }
        }))
    }

    fn handle_tools_list(&self) -> Result<Value> {
        let tools = tools::get_all_tools(&self.context.access);
        Ok(json!({ "tools": tools }))
    }

    async fn handle_tool_call(&self, params: Option<Value>) -> Result<Value> {
        let params = params.ok_or_else(|| McpError::InvalidInput("Missing parameters".to_string()))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidInput("Missing tool name".to_string()))?;
        if !tools::is_known(name) {
            return Err(McpError::MethodNotFound(format!("Unknown tool: {}", name)));
        }
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        info!(tool = name, "Calling tool");

        let outcome = match self.context.access.check(name) {
            Ok(()) => self.call_tool(name, arguments).await,
            Err(e) => Err(e),
        };

        Ok(tool_result(name, outcome))
    }

    /// Run a tool by name against the server context
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolOutcome> {
        let ctx = self.context.as_ref();

        match name {
            // Drive
            "find_files" => drive::handle_find(ctx, args).await,
            "create_folder" => drive::handle_create_folder(ctx, args).await,
            "move_file" => drive::handle_move(ctx, args).await,
            "share_file" => drive::handle_share(ctx, args).await,
            "drive_search_advanced" => drive::handle_search_advanced(ctx, args).await,
            "drive_list_permissions" => drive::handle_list_permissions(ctx, args).await,
            "drive_revoke_public" => drive::handle_revoke_public(ctx, args).await,
            "drive_copy_file" => drive::handle_copy(ctx, args).await,

            // Sheets
            "read_sheet" => sheets::handle_read(ctx, args).await,
            "append_row" => sheets::handle_append_row(ctx, args).await,
            "update_sheet" => sheets::handle_update(ctx, args).await,
            "create_spreadsheet" => sheets::handle_create(ctx, args).await,
            "add_sheet" => sheets::handle_add_sheet(ctx, args).await,
            "get_spreadsheet_meta" => sheets::handle_meta(ctx, args).await,
            "clear_range" => sheets::handle_clear_range(ctx, args).await,
            "sheet_create_filter_view" => sheets::handle_create_filter_view(ctx, args).await,
            "sheet_export_csv" => sheets::handle_export_csv(ctx, args).await,
            "sheet_find_replace" => sheets::handle_find_replace(ctx, args).await,
            "sheet_create_named_range" => sheets::handle_create_named_range(ctx, args).await,

            // Docs
            "read_doc" => docs::handle_read(ctx, args).await,
            "create_doc" => docs::handle_create(ctx, args).await,
            "append_to_doc" => docs::handle_append(ctx, args).await,
            "doc_fill_template" => docs::handle_fill_template(ctx, args).await,
            "doc_export_pdf" => docs::handle_export_pdf(ctx, args).await,

            // Gmail
            "send_email" => gmail::handle_send(ctx, args).await,
            "send_draft" => gmail::handle_send_draft(ctx, args).await,
            "get_gmail_profile" => gmail::handle_profile(ctx, args).await,
            "create_draft" => gmail::handle_create_draft(ctx, args).await,
            "list_emails" => gmail::handle_list(ctx, args).await,
            "read_email" => gmail::handle_read(ctx, args).await,
            "delete_email" => gmail::handle_delete(ctx, args).await,
            "batch_delete_emails" => gmail::handle_batch_delete(ctx, args).await,
            "gmail_search_and_summarize" => gmail::handle_search_and_summarize(ctx, args).await,
            "gmail_archive" => gmail::handle_archive(ctx, args).await,
            "gmail_label_apply" => gmail::handle_label_apply(ctx, args).await,

            // Calendar
            "list_events" => calendar::handle_list(ctx, args).await,
            "create_event" => calendar::handle_create(ctx, args).await,
            "calendar_find_free_slots" => calendar::handle_find_free_slots(ctx, args).await,
            "calendar_create_meeting" => calendar::handle_create_meeting(ctx, args).await,

            // Apps Script
            "create_script_project" => script::handle_create_project(ctx, args).await,
            "get_script_content" => script::handle_get_content(ctx, args).await,
            "prepare_script_update" => script::handle_prepare_update(ctx, args).await,
            "execute_operation" => script::handle_execute(ctx, args).await,
            "cancel_operation" => script::handle_cancel(ctx, args).await,
            "restore_script_backup" => script::handle_restore(ctx, args).await,

            _ => Err(McpError::MethodNotFound(format!("Unknown tool: {}", name))),
        }
    }
}

/// Wrap a tool outcome in the `tools/call` result envelope
pub fn tool_result(tool: &str, outcome: Result<ToolOutcome>) -> Value {
    match outcome {
        Ok(ToolOutcome::Completed(text)) => json!({
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }),
        Ok(ToolOutcome::Blocked(preview)) => json!({
            "content": [{ "type": "text", "text": preview.to_string() }],
            "structuredContent": preview.to_structured(),
            "isError": false
        }),
        Err(e) => {
            warn!(tool, error = %e, "Tool failed");
            json!({
                "content": [{ "type": "text", "text": format!("Error: {}", e) }],
                "isError": true
            })
        }
    }
}
