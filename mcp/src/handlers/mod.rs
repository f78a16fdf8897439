//! Tool handlers
//!
//! One module per backend. Every handler takes the server context and the
//! raw argument object, deserializes it into its own request struct and
//! returns a [`ToolOutcome`]. Handlers never format errors; the dispatcher
//! turns an `Err` into the text envelope.

pub mod calendar;
pub mod docs;
pub mod drive;
pub mod gmail;
pub mod script;
pub mod sheets;

use crate::error::{McpError, Result};
use crate::server::confirmation::{GateDecision, Preview};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

/// Result of a tool call that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The operation ran; text for the caller
    Completed(String),
    /// The confirmation gate declined; nothing was changed
    Blocked(Preview),
}

impl ToolOutcome {
    /// Completed outcome from anything printable
    pub fn done(text: impl Into<String>) -> Self {
        ToolOutcome::Completed(text.into())
    }

    /// Whether the gate declined the operation
    pub fn is_blocked(&self) -> bool {
        matches!(self, ToolOutcome::Blocked(_))
    }

    /// Text shown to the caller
    pub fn text(&self) -> String {
        match self {
            ToolOutcome::Completed(text) => text.clone(),
            ToolOutcome::Blocked(preview) => preview.to_string(),
        }
    }
}

impl From<Preview> for ToolOutcome {
    fn from(preview: Preview) -> Self {
        ToolOutcome::Blocked(preview)
    }
}

/// Deserialize tool arguments; a missing argument object counts as empty
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    serde_json::from_value(args).map_err(|e| McpError::InvalidInput(e.to_string()))
}

/// Reject an empty required string argument
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(McpError::missing(field));
    }
    Ok(())
}

/// Unwrap an allowed gate decision, or hand back the preview
pub(crate) fn gate(decision: GateDecision) -> std::result::Result<(), ToolOutcome> {
    match decision {
        GateDecision::Allow => Ok(()),
        GateDecision::Blocked(preview) => Err(ToolOutcome::Blocked(preview)),
    }
}

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Whether an address looks like a deliverable email address
pub fn validate_email(address: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();

    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .map_or(false, |re| re.is_match(address))
}

/// First `max` characters of `text`, with an ellipsis when cut
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
