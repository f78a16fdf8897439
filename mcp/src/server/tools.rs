//! MCP tool definitions and registry

use crate::permissions::AccessPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool definition for MCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// Whether the tool is available under the current policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,

    /// Reason if not available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Every tool the server dispatches, in listing order
pub const TOOL_NAMES: &[&str] = &[
    "find_files",
    "create_folder",
    "move_file",
    "share_file",
    "drive_search_advanced",
    "drive_list_permissions",
    "drive_revoke_public",
    "drive_copy_file",
    "read_sheet",
    "append_row",
    "update_sheet",
    "create_spreadsheet",
    "add_sheet",
    "get_spreadsheet_meta",
    "clear_range",
    "sheet_create_filter_view",
    "sheet_export_csv",
    "sheet_find_replace",
    "sheet_create_named_range",
    "read_doc",
    "create_doc",
    "append_to_doc",
    "doc_fill_template",
    "doc_export_pdf",
    "send_email",
    "send_draft",
    "get_gmail_profile",
    "create_draft",
    "list_emails",
    "read_email",
    "delete_email",
    "batch_delete_emails",
    "gmail_search_and_summarize",
    "gmail_archive",
    "gmail_label_apply",
    "list_events",
    "create_event",
    "calendar_find_free_slots",
    "calendar_create_meeting",
    "create_script_project",
    "get_script_content",
    "prepare_script_update",
    "execute_operation",
    "cancel_operation",
    "restore_script_backup",
];

/// Whether the server has a handler for this tool
pub fn is_known(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

/// Get all tools with their availability under `access`
pub fn get_all_tools(access: &AccessPolicy) -> Vec<ToolDefinition> {
    TOOL_NAMES
        .iter()
        .map(|name| {
            let (description, input_schema) = describe(name);
            let (available, reason) = check_availability(name, access);
            ToolDefinition {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
                available,
                reason,
            }
        })
        .collect()
}

fn check_availability(tool_name: &str, access: &AccessPolicy) -> (Option<bool>, Option<String>) {
    let (available, reason) = access.tool_available(tool_name);
    if available {
        (None, None) // implicit true
    } else {
        (
            Some(false),
            Some(reason.unwrap_or_else(|| "Not available".to_string())),
        )
    }
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn integer(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

fn flag(description: &str, default: bool) -> Value {
    json!({ "type": "boolean", "description": description, "default": default })
}

fn strings(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn describe(name: &str) -> (&'static str, Value) {
    match name {
        "find_files" => (
            "Search Drive files by name, or with a raw Drive query.",
            object(
                json!({ "query": string("File name fragment or Drive query (e.g. \"mimeType = 'application/pdf'\")") }),
                &["query"],
            ),
        ),
        "create_folder" => (
            "Create a Drive folder.",
            object(
                json!({
                    "name": string("Folder name"),
                    "parent_id": string("Parent folder ID")
                }),
                &["name"],
            ),
        ),
        "move_file" => (
            "Move a Drive file into another folder.",
            object(
                json!({
                    "file_id": string("File ID"),
                    "folder_id": string("Destination folder ID")
                }),
                &["file_id", "folder_id"],
            ),
        ),
        "share_file" => (
            "Share a Drive file. Public sharing (type='anyone') is blocked unless allow_public=true.",
            object(
                json!({
                    "file_id": string("File ID"),
                    "role": { "type": "string", "enum": ["reader", "commenter", "writer"], "description": "Granted role" },
                    "type": { "type": "string", "enum": ["user", "group", "domain", "anyone"], "default": "user", "description": "Grantee type" },
                    "email_address": string("Grantee address for user or group"),
                    "allow_public": flag("Allow sharing with anyone who has the link", false)
                }),
                &["file_id", "role"],
            ),
        ),
        "drive_search_advanced" => (
            "Search Drive with a raw query, listing owner and modification time.",
            object(
                json!({
                    "query": string("Drive query"),
                    "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 50, "description": "Maximum results" }
                }),
                &["query"],
            ),
        ),
        "drive_list_permissions" => (
            "List the permissions of a Drive file.",
            object(json!({ "file_id": string("File ID") }), &["file_id"]),
        ),
        "drive_revoke_public" => (
            "Remove public (anyone) permissions from a Drive file. Requires confirm=true.",
            object(
                json!({
                    "file_id": string("File ID"),
                    "confirm": flag("Confirm the revocation", false)
                }),
                &["file_id"],
            ),
        ),
        "drive_copy_file" => (
            "Copy a Drive file.",
            object(
                json!({
                    "file_id": string("File ID"),
                    "name": string("Name of the copy"),
                    "parent_id": string("Folder for the copy")
                }),
                &["file_id"],
            ),
        ),
        "read_sheet" => (
            "Read values from a spreadsheet range.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range (e.g. 'Sheet1!A1:D10')")
                }),
                &["spreadsheet_id", "range_name"],
            ),
        ),
        "append_row" => (
            "Append one row after the data in a range.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range"),
                    "values": strings("Cell values of the row")
                }),
                &["spreadsheet_id", "range_name", "values"],
            ),
        ),
        "update_sheet" => (
            "Overwrite a range with a grid of values.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range"),
                    "values": { "type": "array", "items": { "type": "array", "items": { "type": "string" } }, "description": "Rows of cell values" }
                }),
                &["spreadsheet_id", "range_name", "values"],
            ),
        ),
        "create_spreadsheet" => (
            "Create a spreadsheet.",
            object(json!({ "title": string("Spreadsheet title") }), &["title"]),
        ),
        "add_sheet" => (
            "Add a sheet to a spreadsheet.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "title": string("Sheet title")
                }),
                &["spreadsheet_id", "title"],
            ),
        ),
        "get_spreadsheet_meta" => (
            "Show a spreadsheet's title and sheets.",
            object(json!({ "spreadsheet_id": string("Spreadsheet ID") }), &["spreadsheet_id"]),
        ),
        "clear_range" => (
            "Clear the values of a range. Ranges over 100 cells require confirm=true.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range"),
                    "confirm": flag("Confirm clearing a large range", false)
                }),
                &["spreadsheet_id", "range_name"],
            ),
        ),
        "sheet_create_filter_view" => (
            "Create a filter view over a grid range; missing end bounds cover the whole sheet.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "sheet_id": integer("Numeric sheet ID"),
                    "title": string("Filter view title"),
                    "start_row": integer("First row (0-based)"),
                    "end_row": integer("End row (exclusive)"),
                    "start_col": integer("First column (0-based)"),
                    "end_col": integer("End column (exclusive)")
                }),
                &["spreadsheet_id", "sheet_id", "title"],
            ),
        ),
        "sheet_export_csv" => (
            "Export a range as CSV text.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range"),
                    "max_rows": { "type": "integer", "minimum": 1, "default": 5000, "description": "Maximum rows to export" }
                }),
                &["spreadsheet_id", "range_name"],
            ),
        ),
        "sheet_find_replace" => (
            "Find and replace text in a range. Dry run by default; set dry_run=false to apply.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "range_name": string("A1 range"),
                    "find_text": string("Text to find"),
                    "replace_text": string("Replacement text"),
                    "dry_run": flag("Only preview the matches", true),
                    "match_case": flag("Case-sensitive matching", false)
                }),
                &["spreadsheet_id", "range_name", "find_text", "replace_text"],
            ),
        ),
        "sheet_create_named_range" => (
            "Create a named range.",
            object(
                json!({
                    "spreadsheet_id": string("Spreadsheet ID"),
                    "name": string("Range name"),
                    "sheet_id": integer("Numeric sheet ID"),
                    "start_row": integer("First row (0-based)"),
                    "end_row": integer("End row (exclusive)"),
                    "start_col": integer("First column (0-based)"),
                    "end_col": integer("End column (exclusive)")
                }),
                &["spreadsheet_id", "name", "sheet_id", "start_row", "end_row", "start_col", "end_col"],
            ),
        ),
        "read_doc" => (
            "Read the text of a document.",
            object(json!({ "document_id": string("Document ID") }), &["document_id"]),
        ),
        "create_doc" => (
            "Create a document.",
            object(json!({ "title": string("Document title") }), &["title"]),
        ),
        "append_to_doc" => (
            "Append text at the end of a document.",
            object(
                json!({
                    "document_id": string("Document ID"),
                    "text": string("Text to append")
                }),
                &["document_id", "text"],
            ),
        ),
        "doc_fill_template" => (
            "Replace placeholders throughout a document. Requires confirm=true.",
            object(
                json!({
                    "document_id": string("Document ID"),
                    "replacements": { "type": "object", "additionalProperties": { "type": "string" }, "description": "Placeholder to replacement text" },
                    "confirm": flag("Confirm the replacement", false)
                }),
                &["document_id", "replacements"],
            ),
        ),
        "doc_export_pdf" => (
            "Export a document as base64-encoded PDF.",
            object(json!({ "document_id": string("Document ID") }), &["document_id"]),
        ),
        "send_email" => (
            "Send an email. Creates a draft unless draft_mode=false.",
            object(
                json!({
                    "to": string("Recipient address"),
                    "subject": string("Subject"),
                    "body_text": string("Plain-text body"),
                    "draft_mode": flag("Save as draft instead of sending", true)
                }),
                &["to", "subject", "body_text"],
            ),
        ),
        "send_draft" => (
            "Send an existing draft.",
            object(json!({ "draft_id": string("Draft ID") }), &["draft_id"]),
        ),
        "get_gmail_profile" => (
            "Show the authenticated Gmail address.",
            object(json!({}), &[]),
        ),
        "create_draft" => (
            "Create an email draft.",
            object(
                json!({
                    "to": string("Recipient address"),
                    "subject": string("Subject"),
                    "body_text": string("Plain-text body")
                }),
                &["to", "subject", "body_text"],
            ),
        ),
        "list_emails" => (
            "List recent messages with snippets.",
            object(
                json!({
                    "max_results": { "type": "integer", "minimum": 1, "default": 10, "description": "Maximum messages" },
                    "query": string("Gmail search query")
                }),
                &[],
            ),
        ),
        "read_email" => (
            "Show sender, subject and snippet of a message.",
            object(json!({ "message_id": string("Message ID") }), &["message_id"]),
        ),
        "delete_email" => (
            "Permanently delete a message. Requires confirm=true.",
            object(
                json!({
                    "message_id": string("Message ID"),
                    "confirm": flag("Confirm the deletion", false)
                }),
                &["message_id"],
            ),
        ),
        "batch_delete_emails" => (
            "Permanently delete several messages. Dry run by default; set dry_run=false to delete.",
            object(
                json!({
                    "message_ids": strings("Message IDs"),
                    "dry_run": flag("Only preview the deletion", true)
                }),
                &["message_ids"],
            ),
        ),
        "gmail_search_and_summarize" => (
            "Search Gmail and summarize the top results (date, sender, subject).",
            object(
                json!({
                    "query": string("Gmail search query"),
                    "max_results": { "type": "integer", "minimum": 1, "maximum": 100, "default": 50, "description": "Maximum messages" }
                }),
                &["query"],
            ),
        ),
        "gmail_archive" => (
            "Archive a message (remove it from the inbox). Requires confirm=true.",
            object(
                json!({
                    "message_id": string("Message ID"),
                    "confirm": flag("Confirm archiving", false)
                }),
                &["message_id"],
            ),
        ),
        "gmail_label_apply" => (
            "Apply a label to messages. Dry run by default; set dry_run=false to apply.",
            object(
                json!({
                    "message_ids": strings("Message IDs"),
                    "label_name": string("Label name"),
                    "dry_run": flag("Only preview the change", true),
                    "create_if_missing": flag("Create the label if it does not exist", true)
                }),
                &["message_ids", "label_name"],
            ),
        ),
        "list_events" => (
            "List upcoming events of a calendar.",
            object(
                json!({
                    "calendar_id": { "type": "string", "default": "primary", "description": "Calendar ID" },
                    "max_results": { "type": "integer", "minimum": 1, "default": 10, "description": "Maximum events" }
                }),
                &[],
            ),
        ),
        "create_event" => (
            "Create an event in the primary calendar.",
            object(
                json!({
                    "summary": string("Event title"),
                    "start_time": string("Start (RFC 3339)"),
                    "end_time": string("End (RFC 3339)"),
                    "description": string("Description")
                }),
                &["summary", "start_time", "end_time"],
            ),
        ),
        "calendar_find_free_slots" => (
            "Find free slots of at least duration_minutes between two times.",
            object(
                json!({
                    "calendar_id": { "type": "string", "default": "primary", "description": "Calendar ID" },
                    "start_time": string("Window start (RFC 3339)"),
                    "end_time": string("Window end (RFC 3339)"),
                    "duration_minutes": { "type": "integer", "minimum": 1, "default": 30, "description": "Minimum slot length" },
                    "max_results": { "type": "integer", "minimum": 1, "default": 5, "description": "Maximum slots" }
                }),
                &["start_time", "end_time"],
            ),
        ),
        "calendar_create_meeting" => (
            "Create a meeting and send invitations. Requires confirm=true.",
            object(
                json!({
                    "summary": string("Meeting title"),
                    "start_time": string("Start (RFC 3339)"),
                    "end_time": string("End (RFC 3339)"),
                    "attendees": strings("Attendee addresses"),
                    "description": string("Description"),
                    "location": string("Location"),
                    "confirm": flag("Confirm creating the meeting", false)
                }),
                &["summary", "start_time", "end_time"],
            ),
        ),
        "create_script_project" => (
            "Create an Apps Script project.",
            object(
                json!({
                    "title": string("Project title"),
                    "parent_id": string("Drive file the script is bound to")
                }),
                &["title"],
            ),
        ),
        "get_script_content" => (
            "Show the files of an Apps Script project.",
            object(json!({ "script_id": string("Script ID") }), &["script_id"]),
        ),
        "prepare_script_update" => (
            "Prepare a script update. Returns an operation ID to execute or cancel; nothing changes yet.",
            object(
                json!({
                    "script_id": string("Script ID"),
                    "files": {
                        "type": "array",
                        "description": "Complete new file set",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string", "enum": ["SERVER_JS", "HTML", "JSON"] },
                                "source": { "type": "string" }
                            },
                            "required": ["name", "type", "source"]
                        }
                    }
                }),
                &["script_id", "files"],
            ),
        ),
        "execute_operation" => (
            "Execute a prepared operation. A backup is written before the change.",
            object(json!({ "operation_id": string("Operation ID") }), &["operation_id"]),
        ),
        "cancel_operation" => (
            "Cancel a prepared operation.",
            object(json!({ "operation_id": string("Operation ID") }), &["operation_id"]),
        ),
        "restore_script_backup" => (
            "Restore a script from a backup file written by execute_operation.",
            object(json!({ "backup_path": string("Backup file path") }), &["backup_path"]),
        ),
        _ => ("", object(json!({}), &[])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn policy(read_only: bool) -> AccessPolicy {
        AccessPolicy {
            auth_configured: true,
            read_only,
        }
    }

    #[test]
    fn test_every_tool_is_described() {
        let tools = get_all_tools(&policy(false));
        assert_eq!(tools.len(), TOOL_NAMES.len());

        for tool in &tools {
            assert!(!tool.description.is_empty(), "{} has no description", tool.name);
            assert_eq!(tool.input_schema["type"], "object");
            assert!(tool.available.is_none());
        }
    }

    #[test]
    fn test_tool_names_unique() {
        let unique: HashSet<_> = TOOL_NAMES.iter().collect();
        assert_eq!(unique.len(), TOOL_NAMES.len());
    }

    #[test]
    fn test_required_fields_are_declared() {
        for tool in get_all_tools(&policy(false)) {
            let properties = &tool.input_schema["properties"];
            for field in tool.input_schema["required"].as_array().unwrap() {
                let field = field.as_str().unwrap();
                assert!(
                    properties.get(field).is_some(),
                    "{} requires undeclared {}",
                    tool.name,
                    field
                );
            }
        }
    }

    #[test]
    fn test_read_only_marks_mutating_tools() {
        let tools = get_all_tools(&policy(true));
        let find = |name: &str| tools.iter().find(|t| t.name == name).unwrap();

        assert!(find("read_sheet").available.is_none());
        assert_eq!(find("clear_range").available, Some(false));
        assert!(find("clear_range").reason.as_ref().unwrap().contains("read-only"));
    }

    #[test]
    fn test_is_known() {
        assert!(is_known("prepare_script_update"));
        assert!(!is_known("package_install"));
    }
}
