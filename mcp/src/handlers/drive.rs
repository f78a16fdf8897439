//! Drive handlers

use super::{gate, parse_args, require, validate_email, ToolOutcome};
use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::remote::{array_field, drive, str_field};
use crate::server::confirmation::{evaluate, Preview, PreviewKind, Threshold, SHORT_PREVIEW_LIMIT};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

const PUBLIC_TYPE: &str = "anyone";

fn default_share_type() -> String {
    "user".to_string()
}

fn default_search_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct CreateFolderArgs {
    name: String,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoveFileArgs {
    file_id: String,
    folder_id: String,
}

#[derive(Debug, Deserialize)]
struct ShareFileArgs {
    file_id: String,
    role: String,
    #[serde(rename = "type", default = "default_share_type")]
    share_type: String,
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    allow_public: bool,
}

#[derive(Debug, Deserialize)]
struct SearchAdvancedArgs {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct FileArgs {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct RevokePublicArgs {
    file_id: String,
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Deserialize)]
struct CopyFileArgs {
    file_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

/// Turn a bare search term into a name search; Drive query syntax passes through
pub fn normalize_query(query: &str) -> String {
    if query.contains("contains") || query.contains('=') {
        query.to_string()
    } else {
        format!(
            "name contains '{}' and trashed = false",
            query.replace('\\', "\\\\").replace('\'', "\\'")
        )
    }
}

/// File size in megabytes; Drive reports sizes as decimal strings
fn size_mb(file: &Value) -> f64 {
    let bytes = match file.get("size") {
        Some(Value::String(s)) => s.parse::<u64>().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };
    bytes as f64 / (1024.0 * 1024.0)
}

/// Handle find_files tool
pub async fn handle_find(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: QueryArgs = parse_args(args)?;
    require("query", &args.query)?;

    let files = drive::list_files(
        ctx.api(),
        &normalize_query(&args.query),
        10,
        "nextPageToken, files(id, name, mimeType)",
    )
    .await?;
    if files.is_empty() {
        return Ok(ToolOutcome::done("No files found."));
    }

    let mut output = String::from("Found files:\n");
    for file in &files {
        output.push_str(&format!(
            "- {} (ID: {}) [{}]\n",
            str_field(file, "name"),
            str_field(file, "id"),
            str_field(file, "mimeType")
        ));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle create_folder tool
pub async fn handle_create_folder(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateFolderArgs = parse_args(args)?;
    require("name", &args.name)?;

    let mut metadata = json!({
        "name": args.name,
        "mimeType": drive::FOLDER_MIME_TYPE,
    });
    if let Some(parent) = args.parent_id.as_deref().filter(|p| !p.is_empty()) {
        metadata["parents"] = json!([parent]);
    }

    let folder = drive::create_file(ctx.api(), metadata, "id").await?;

    info!(folder = str_field(&folder, "id"), name = %args.name, "Folder created");
    Ok(ToolOutcome::done(format!(
        "Folder created: {} (ID: {})",
        args.name,
        str_field(&folder, "id")
    )))
}

/// Handle move_file tool
pub async fn handle_move(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: MoveFileArgs = parse_args(args)?;
    require("file_id", &args.file_id)?;
    require("folder_id", &args.folder_id)?;

    let file = drive::get_file(ctx.api(), &args.file_id, "parents").await?;
    let previous: Vec<&str> = array_field(&file, "parents")
        .iter()
        .filter_map(Value::as_str)
        .collect();

    drive::update_parents(ctx.api(), &args.file_id, &args.folder_id, &previous.join(",")).await?;

    info!(file = %args.file_id, folder = %args.folder_id, "File moved");
    Ok(ToolOutcome::done(format!(
        "File moved to folder ID {}.",
        args.folder_id
    )))
}

/// Handle share_file tool
///
/// Sharing with `anyone` is refused unless `allow_public=true`.
pub async fn handle_share(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ShareFileArgs = parse_args(args)?;
    require("file_id", &args.file_id)?;
    require("role", &args.role)?;

    let public = args.share_type == PUBLIC_TYPE;
    if public {
        // details only feed the preview
        let file = if args.allow_public {
            Value::Null
        } else {
            match drive::get_file(ctx.api(), &args.file_id, "name,size,mimeType,owners").await {
                Ok(file) => file,
                Err(e) => {
                    warn!(file = %args.file_id, error = %e, "File details unavailable");
                    Value::Null
                }
            }
        };

        let decision = evaluate(1, args.allow_public, Threshold::Always, || {
            let name = match str_field(&file, "name") {
                "" => "Unknown",
                name => name,
            };
            Preview::new(
                PreviewKind::PublicAccessBlocked,
                "You are trying to make this file PUBLIC",
                "share_file",
                "allow_public",
                true,
            )
            .fact("File", name)
            .fact("Size", format!("{:.2} MB", size_mb(&file)))
            .fact("Will be accessible to", "ANYONE with the link")
            .warning("File may be indexed by search engines")
            .warning("Anyone can view, download and share it")
            .warning("You cannot track who accessed it")
            .suggestion("Share with specific users using type='user'")
        });
        if let Err(blocked) = gate(decision) {
            warn!(file = %args.file_id, "Public sharing blocked");
            return Ok(blocked);
        }
    }

    let email = args.email_address.as_deref().filter(|e| !e.is_empty());
    if let Some(email) = email {
        if matches!(args.share_type.as_str(), "user" | "group") && !validate_email(email) {
            return Err(McpError::InvalidInput(format!(
                "Invalid email format: {}",
                email
            )));
        }
    }

    let mut permission = Map::new();
    permission.insert("type".to_string(), json!(args.share_type));
    permission.insert("role".to_string(), json!(args.role));
    if let Some(email) = email {
        permission.insert("emailAddress".to_string(), json!(email));
    }
    drive::create_permission(ctx.api(), &args.file_id, Value::Object(permission)).await?;

    info!(
        file = %args.file_id,
        share_type = %args.share_type,
        target = email.unwrap_or(PUBLIC_TYPE),
        role = %args.role,
        "File shared"
    );

    let mut output = format!(
        "File shared successfully\n\nFile ID: {}\nAccess: {}\nRole: {}\n",
        args.file_id, args.share_type, args.role
    );
    if public {
        output.push_str("\nWARNING: This file is now PUBLIC");
    }
    Ok(ToolOutcome::done(output))
}

/// Handle drive_search_advanced tool
pub async fn handle_search_advanced(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: SearchAdvancedArgs = parse_args(args)?;
    require("query", &args.query)?;

    let files = drive::list_files(
        ctx.api(),
        &args.query,
        args.limit.clamp(1, 100),
        "files(id, name, mimeType, owners, modifiedTime)",
    )
    .await?;
    if files.is_empty() {
        return Ok(ToolOutcome::done("No files found."));
    }

    let mut output = String::from("Found files:\n");
    for file in &files {
        let owner = array_field(file, "owners")
            .first()
            .map(|o| str_field(o, "emailAddress"))
            .unwrap_or("Unknown");
        output.push_str(&format!(
            "- {} (ID: {}) [{}] owner={} modified={}\n",
            str_field(file, "name"),
            str_field(file, "id"),
            str_field(file, "mimeType"),
            owner,
            str_field(file, "modifiedTime")
        ));
    }

    info!(query = %args.query, results = files.len(), "Drive search");
    Ok(ToolOutcome::done(output))
}

/// Handle drive_list_permissions tool
pub async fn handle_list_permissions(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: FileArgs = parse_args(args)?;
    require("file_id", &args.file_id)?;

    let permissions = drive::list_permissions(
        ctx.api(),
        &args.file_id,
        "permissions(id,type,role,emailAddress,domain,allowFileDiscovery)",
    )
    .await?;
    if permissions.is_empty() {
        return Ok(ToolOutcome::done("No permissions found."));
    }

    let mut output = format!("Permissions for file {}:\n", args.file_id);
    for p in &permissions {
        let target = [str_field(p, "emailAddress"), str_field(p, "domain")]
            .into_iter()
            .find(|t| !t.is_empty())
            .unwrap_or(PUBLIC_TYPE);
        output.push_str(&format!(
            "- id={} type={} role={} target={}\n",
            str_field(p, "id"),
            str_field(p, "type"),
            str_field(p, "role"),
            target
        ));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle drive_revoke_public tool
pub async fn handle_revoke_public(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: RevokePublicArgs = parse_args(args)?;
    require("file_id", &args.file_id)?;

    let permissions = drive::list_permissions(
        ctx.api(),
        &args.file_id,
        "permissions(id,type,role,allowFileDiscovery)",
    )
    .await?;
    let public: Vec<&Value> = permissions
        .iter()
        .filter(|p| str_field(p, "type") == PUBLIC_TYPE)
        .collect();
    if public.is_empty() {
        return Ok(ToolOutcome::done("No public permissions found."));
    }

    let decision = evaluate(public.len() as u64, args.confirm, Threshold::Always, || {
        Preview::new(
            PreviewKind::ConfirmationRequired,
            format!("Public access permissions found: {}", public.len()),
            "drive_revoke_public",
            "confirm",
            true,
        )
        .fact("File", args.file_id.clone())
        .samples(
            public
                .iter()
                .map(|p| format!("id={} role={}", str_field(p, "id"), str_field(p, "role"))),
            SHORT_PREVIEW_LIMIT,
        )
    });
    if let Err(blocked) = gate(decision) {
        warn!(file = %args.file_id, count = public.len(), "Public revoke attempted without confirm");
        return Ok(blocked);
    }

    for permission in &public {
        drive::delete_permission(ctx.api(), &args.file_id, str_field(permission, "id")).await?;
    }

    info!(file = %args.file_id, count = public.len(), "Public access revoked");
    Ok(ToolOutcome::done(format!(
        "Public access revoked for file {}.",
        args.file_id
    )))
}

/// Handle drive_copy_file tool
pub async fn handle_copy(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CopyFileArgs = parse_args(args)?;
    require("file_id", &args.file_id)?;

    let mut body = Map::new();
    if let Some(name) = args.name.as_deref().filter(|n| !n.is_empty()) {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(parent) = args.parent_id.as_deref().filter(|p| !p.is_empty()) {
        body.insert("parents".to_string(), json!([parent]));
    }

    let copied = drive::copy_file(ctx.api(), &args.file_id, Value::Object(body)).await?;

    info!(file = %args.file_id, copy = str_field(&copied, "id"), "File copied");
    Ok(ToolOutcome::done(format!(
        "File copied: {} (ID: {})",
        str_field(&copied, "name"),
        str_field(&copied, "id")
    )))
}
