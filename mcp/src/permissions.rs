//! Access policy
//!
//! Classifies tools as read-only or mutating and decides, from the server
//! configuration, which of them may be called.

use crate::error::{McpError, Result};
use gtools_config::Config;
use tracing::info;

/// Effect class of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// Only reads remote state
    ReadOnly,
    /// May change remote or local state
    Mutating,
}

/// Tools that never change anything
const READ_ONLY_TOOLS: &[&str] = &[
    "find_files",
    "drive_search_advanced",
    "drive_list_permissions",
    "read_sheet",
    "get_spreadsheet_meta",
    "sheet_export_csv",
    "read_doc",
    "doc_export_pdf",
    "get_gmail_profile",
    "list_emails",
    "read_email",
    "gmail_search_and_summarize",
    "list_events",
    "calendar_find_free_slots",
    "get_script_content",
];

/// Classify a tool by name; unknown names count as mutating
pub fn classify(tool: &str) -> ToolClass {
    if READ_ONLY_TOOLS.contains(&tool) {
        ToolClass::ReadOnly
    } else {
        ToolClass::Mutating
    }
}

/// Who may call what, derived from the configuration
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Whether an access token is configured for the server
    pub auth_configured: bool,

    /// Whether mutating tools are disabled
    pub read_only: bool,
}

impl AccessPolicy {
    /// Derive the policy from configuration
    pub fn from_config(config: &Config) -> Self {
        let policy = Self {
            auth_configured: config.auth_configured(),
            read_only: config.read_only,
        };

        info!(
            auth_configured = policy.auth_configured,
            read_only = policy.read_only,
            "Access policy"
        );

        policy
    }

    /// Check whether a tool call may proceed
    pub fn check(&self, tool: &str) -> Result<()> {
        if !self.auth_configured {
            return Err(McpError::Unauthorized(
                "MCP_AUTH_TOKEN is not set. Set environment variable MCP_AUTH_TOKEN to enable MCP access."
                    .to_string(),
            ));
        }

        let (available, reason) = self.tool_available(tool);
        if !available {
            return Err(McpError::Unauthorized(reason.unwrap_or_else(|| {
                format!("Tool '{}' not available", tool)
            })));
        }

        Ok(())
    }

    /// Whether a tool is available, with the reason when it is not
    pub fn tool_available(&self, tool: &str) -> (bool, Option<String>) {
        match classify(tool) {
            ToolClass::ReadOnly => (true, None),
            ToolClass::Mutating if self.read_only => (
                false,
                Some(format!(
                    "Server is in read-only mode: '{}' modifies data.\n\
                     Unset GTOOLS_READ_ONLY (or read_only in the config file) to enable it.",
                    tool
                )),
            ),
            ToolClass::Mutating => (true, None),
        }
    }

    /// Description of the current policy for clients
    pub fn description(&self) -> String {
        match (self.auth_configured, self.read_only) {
            (false, _) => "MCP_AUTH_TOKEN is not set: tool calls are rejected".to_string(),
            (true, true) => "Read-only mode: only read-only tools are available".to_string(),
            (true, false) => "All tools available".to_string(),
        }
    }
}
