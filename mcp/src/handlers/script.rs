//! Apps Script handlers
//!
//! Script updates are two-phase: `prepare_script_update` captures the
//! current files and proposes the change, `execute_operation` writes the
//! backup and applies it, `cancel_operation` drops it. A backup can be
//! replayed later with `restore_script_backup`.

use super::{parse_args, require, ToolOutcome};
use crate::backup::BackupWriter;
use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::pending::OperationKind;
use crate::remote::script::{self, ScriptFile};
use crate::remote::str_field;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct CreateProjectArgs {
    title: String,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptIdArgs {
    script_id: String,
}

#[derive(Debug, Deserialize)]
struct PrepareUpdateArgs {
    script_id: String,
    files: Vec<ScriptFile>,
}

#[derive(Debug, Deserialize)]
struct OperationArgs {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct RestoreArgs {
    backup_path: String,
}

/// One entry of a script update summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File only in the proposed set
    Added(String),
    /// File in both sets; delta of newline counts
    Modified { name: String, line_delta: i64 },
    /// File only in the current set
    Deleted(String),
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileChange::Added(name) => write!(f, "  + NEW: {}", name),
            FileChange::Modified { name, line_delta } => {
                write!(f, "  ~ MODIFIED: {} ({:+} lines)", name, line_delta)
            }
            FileChange::Deleted(name) => write!(f, "  - DELETED: {}", name),
        }
    }
}

/// Compare current project files with a proposed set
///
/// Proposed files come first in their given order (new or modified), then
/// the current files missing from the proposal. Every file present in both
/// sets is reported as modified, even with an unchanged line count.
pub fn diff_files(current: &[Value], proposed: &[ScriptFile]) -> Vec<FileChange> {
    let current_lines = |name: &str| {
        current
            .iter()
            .find(|f| str_field(f, "name") == name)
            .map(|f| line_count(str_field(f, "source")))
    };

    let mut changes = Vec::new();
    let mut seen = HashSet::new();

    for file in proposed {
        if !seen.insert(file.name.as_str()) {
            continue;
        }
        match current_lines(&file.name) {
            None => changes.push(FileChange::Added(file.name.clone())),
            Some(old) => changes.push(FileChange::Modified {
                name: file.name.clone(),
                line_delta: line_count(&file.source) - old,
            }),
        }
    }

    let mut deleted = HashSet::new();
    for file in current {
        let name = str_field(file, "name");
        if !seen.contains(name) && deleted.insert(name) {
            changes.push(FileChange::Deleted(name.to_string()));
        }
    }

    changes
}

fn line_count(source: &str) -> i64 {
    source.matches('\n').count() as i64
}

fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (n, unit) = if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}

/// Handle create_script_project tool
pub async fn handle_create_project(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateProjectArgs = parse_args(args)?;
    require("title", &args.title)?;

    let project = script::create_project(ctx.api(), &args.title, args.parent_id.as_deref()).await?;
    let script_id = str_field(&project, "scriptId");

    info!(script_id, title = %args.title, "Script project created");
    Ok(ToolOutcome::done(format!(
        "Script created: {} (ID: {})\nURL: https://script.google.com/d/{}/edit",
        str_field(&project, "title"),
        script_id,
        script_id
    )))
}

/// Handle get_script_content tool
pub async fn handle_get_content(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ScriptIdArgs = parse_args(args)?;
    require("script_id", &args.script_id)?;

    let files = script::get_content(ctx.api(), &args.script_id).await?;

    let mut output = format!("Script Content ({}):\n", args.script_id);
    for file in &files {
        output.push_str(&format!(
            "\n--- File: {} ({}) ---\n{}",
            str_field(file, "name"),
            str_field(file, "type"),
            str_field(file, "source")
        ));
    }

    Ok(ToolOutcome::done(output))
}

/// Handle prepare_script_update tool
///
/// Captures the current files as the backup and proposes the new set. No
/// remote state changes here.
pub async fn handle_prepare_update(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: PrepareUpdateArgs = parse_args(args)?;
    require("script_id", &args.script_id)?;

    let current = script::get_content(ctx.api(), &args.script_id).await?;
    let changes = diff_files(&current, &args.files);
    let file_count = current.len();

    let proposal = ctx
        .operations
        .propose(
            OperationKind::ScriptUpdate,
            args.script_id.as_str(),
            Value::Array(current),
            serde_json::to_value(&args.files)?,
        )
        .await?;

    info!(operation = %proposal.id, script_id = %args.script_id, changes = changes.len(), "Script update prepared");

    let summary = if changes.is_empty() {
        "  (no files)".to_string()
    } else {
        changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(ToolOutcome::done(format!(
        "Script Update Prepared (Operation ID: {id})\n\n\
         Script ID: {script}\n\
         Backup captured: {files} file(s)\n\n\
         Changes:\n{summary}\n\n\
         Operation expires in: {ttl} (at {expires})\n\n\
         To execute: execute_operation(operation_id='{id}')\n\
         To cancel: cancel_operation(operation_id='{id}')",
        id = proposal.id,
        script = args.script_id,
        files = file_count,
        summary = summary,
        ttl = format_ttl(ctx.operations.ttl()),
        expires = proposal.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )))
}

/// Handle execute_operation tool
///
/// The record is consumed before any side effect. A failed backup write puts
/// it back for a retry. If the remote update fails after the backup was
/// written, the backup file stays on disk and the operation must be prepared
/// again.
pub async fn handle_execute(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: OperationArgs = parse_args(args)?;
    require("operation_id", &args.operation_id)?;

    let operation = ctx.operations.execute(&args.operation_id).await?;

    match operation.kind {
        OperationKind::ScriptUpdate => {
            let written = ctx.backups.write(
                &operation.backup,
                operation.kind.backup_tag(),
                &operation.subject_id,
            );
            let backup_path = match written {
                Ok(path) => path,
                Err(e) => {
                    error!(
                        operation = %operation.id,
                        script_id = %operation.subject_id,
                        error = %e,
                        "Backup write failed, operation kept for retry"
                    );
                    ctx.operations.requeue(operation).await;
                    return Err(e);
                }
            };

            if let Err(e) =
                script::update_content(ctx.api(), &operation.subject_id, &operation.proposed).await
            {
                error!(
                    operation = %operation.id,
                    script_id = %operation.subject_id,
                    backup = %backup_path.display(),
                    error = %e,
                    "Script update failed after backup"
                );
                return Err(e);
            }

            let files = operation.proposed.as_array().map_or(0, Vec::len);
            info!(
                operation = %operation.id,
                script_id = %operation.subject_id,
                backup = %backup_path.display(),
                "Script updated"
            );

            Ok(ToolOutcome::done(format!(
                "Script updated successfully!\n\n\
                 Results:\n\
                 \x20 - Files updated: {files}\n\
                 \x20 - Script ID: {script}\n\n\
                 Backup saved to:\n\
                 \x20  {path}\n\n\
                 To rollback: restore_script_backup(backup_path='{path}')",
                files = files,
                script = operation.subject_id,
                path = backup_path.display(),
            )))
        }
    }
}

/// Handle cancel_operation tool
pub async fn handle_cancel(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: OperationArgs = parse_args(args)?;
    require("operation_id", &args.operation_id)?;

    if ctx.operations.cancel(&args.operation_id).await {
        info!(operation = %args.operation_id, "Operation cancelled");
        Ok(ToolOutcome::done(format!(
            "Operation {} cancelled",
            args.operation_id
        )))
    } else {
        Err(McpError::NotFound(format!(
            "Operation {} not found or expired",
            args.operation_id
        )))
    }
}

/// Handle restore_script_backup tool
pub async fn handle_restore(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: RestoreArgs = parse_args(args)?;
    require("backup_path", &args.backup_path)?;

    let path = Path::new(&args.backup_path);
    let backup = BackupWriter::read(path)?;

    if backup.kind != OperationKind::ScriptUpdate.backup_tag() {
        return Err(McpError::InvalidInput(format!(
            "{} is a '{}' backup, not a script backup",
            path.display(),
            backup.kind
        )));
    }
    if !backup.payload.is_array() {
        return Err(McpError::InvalidInput(format!(
            "Backup {} does not contain a file list",
            path.display()
        )));
    }

    script::update_content(ctx.api(), &backup.subject_id, &backup.payload).await?;

    info!(script_id = %backup.subject_id, backup = %path.display(), "Script restored from backup");
    Ok(ToolOutcome::done(format!(
        "Script {} restored from backup successfully!",
        backup.subject_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(name: &str, lines: usize) -> ScriptFile {
        ScriptFile {
            name: name.to_string(),
            file_type: "SERVER_JS".to_string(),
            source: "x\n".repeat(lines),
        }
    }

    fn raw(name: &str, lines: usize) -> Value {
        json!({"name": name, "type": "SERVER_JS", "source": "x\n".repeat(lines)})
    }

    #[test]
    fn test_diff_reports_added_modified_deleted() {
        let current = vec![raw("A", 5), raw("B", 3)];
        let proposed = vec![file("A", 8), file("C", 1)];

        let changes = diff_files(&current, &proposed);
        assert_eq!(
            changes,
            vec![
                FileChange::Modified {
                    name: "A".to_string(),
                    line_delta: 3
                },
                FileChange::Added("C".to_string()),
                FileChange::Deleted("B".to_string()),
            ]
        );
    }

    #[test]
    fn test_diff_formatting() {
        let changes = diff_files(&[raw("A", 5), raw("B", 1)], &[file("A", 2), file("C", 0)]);
        let lines: Vec<String> = changes.iter().map(ToString::to_string).collect();

        assert_eq!(
            lines,
            vec![
                "  ~ MODIFIED: A (-3 lines)",
                "  + NEW: C",
                "  - DELETED: B",
            ]
        );
    }

    #[test]
    fn test_unchanged_file_is_modified_by_zero() {
        let changes = diff_files(&[raw("A", 2)], &[file("A", 2)]);
        assert_eq!(changes[0].to_string(), "  ~ MODIFIED: A (+0 lines)");
    }

    #[test]
    fn test_duplicate_proposed_names_reported_once() {
        let changes = diff_files(&[], &[file("A", 1), file("A", 2)]);
        assert_eq!(changes, vec![FileChange::Added("A".to_string())]);
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(Duration::from_secs(600)), "10 minutes");
        assert_eq!(format_ttl(Duration::from_secs(90)), "90 seconds");
        assert_eq!(format_ttl(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_ttl(Duration::from_secs(1)), "1 second");
    }
}
