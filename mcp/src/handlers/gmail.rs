//! Gmail handlers

use super::{gate, parse_args, require, truncate, validate_email, ToolOutcome};
use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::remote::gmail::{self, header, MessageFormat};
use crate::remote::{str_field, RemoteApi};
use crate::server::confirmation::{
    evaluate, Preview, PreviewKind, Threshold, LONG_PREVIEW_LIMIT, SHORT_PREVIEW_LIMIT,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

const SEARCH_LIMIT: u32 = 100;
const INBOX_LABEL: &str = "INBOX";

fn default_true() -> bool {
    true
}

fn default_list_size() -> u32 {
    10
}

fn default_search_size() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
struct SendEmailArgs {
    to: String,
    subject: String,
    body_text: String,
    #[serde(default = "default_true")]
    draft_mode: bool,
}

#[derive(Debug, Deserialize)]
struct DraftIdArgs {
    draft_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateDraftArgs {
    to: String,
    subject: String,
    body_text: String,
}

#[derive(Debug, Deserialize)]
struct ListEmailsArgs {
    #[serde(default = "default_list_size")]
    max_results: u32,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageArgs {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmMessageArgs {
    message_id: String,
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Deserialize)]
struct BatchDeleteArgs {
    message_ids: Vec<String>,
    #[serde(default = "default_true")]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_search_size")]
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct LabelApplyArgs {
    message_ids: Vec<String>,
    label_name: String,
    #[serde(default = "default_true")]
    dry_run: bool,
    #[serde(default = "default_true")]
    create_if_missing: bool,
}

/// Snippet of a message, or a placeholder when it cannot be fetched
async fn snippet_or_placeholder(api: &dyn RemoteApi, message_id: &str, max: usize) -> String {
    match gmail::get_message(api, message_id, MessageFormat::Minimal, &[]).await {
        Ok(message) => {
            let snippet = str_field(&message, "snippet");
            if snippet.is_empty() {
                "(no preview)".to_string()
            } else {
                truncate(snippet, max)
            }
        }
        Err(e) => {
            warn!(message = message_id, error = %e, "Preview unavailable");
            "(unable to load preview)".to_string()
        }
    }
}

/// Id of the label with exactly this name
async fn find_label(api: &dyn RemoteApi, name: &str) -> Result<Option<String>> {
    let labels = gmail::list_labels(api).await?;
    Ok(labels
        .iter()
        .find(|label| str_field(label, "name") == name)
        .map(|label| str_field(label, "id").to_string()))
}

fn require_ids(ids: &[String]) -> Result<()> {
    if ids.iter().all(|id| id.trim().is_empty()) {
        return Err(McpError::missing("message_ids"));
    }
    Ok(())
}

/// Handle send_email tool
///
/// Saves a draft unless `draft_mode=false`.
pub async fn handle_send(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: SendEmailArgs = parse_args(args)?;
    if !validate_email(&args.to) {
        return Err(McpError::InvalidInput(format!(
            "Invalid email format: {}",
            args.to
        )));
    }

    let raw = gmail::build_raw_message(&args.to, &args.subject, &args.body_text);

    if args.draft_mode {
        let draft = gmail::create_draft(ctx.api(), raw).await?;
        let draft_id = str_field(&draft, "id");

        info!(draft = draft_id, to = %args.to, "Email draft created");
        return Ok(ToolOutcome::done(format!(
            "EMAIL DRAFT CREATED (ID: {id})\n\n\
             To: {to}\n\
             Subject: {subject}\n\
             Body: {body}\n\n\
             Email saved as DRAFT, not sent yet.\n\n\
             To send: send_email(..., draft_mode=false)\n\
             Or send draft: send_draft(draft_id='{id}')",
            id = draft_id,
            to = args.to,
            subject = args.subject,
            body = truncate(&args.body_text, 100),
        )));
    }

    let sent = gmail::send_message(ctx.api(), raw).await?;
    let message_id = str_field(&sent, "id");

    info!(message = message_id, to = %args.to, "Email sent");
    Ok(ToolOutcome::done(format!(
        "Email sent. Message Id: {}",
        message_id
    )))
}

/// Handle send_draft tool
pub async fn handle_send_draft(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: DraftIdArgs = parse_args(args)?;
    require("draft_id", &args.draft_id)?;

    let sent = gmail::send_draft(ctx.api(), &args.draft_id).await?;

    info!(draft = %args.draft_id, "Draft sent");
    Ok(ToolOutcome::done(format!(
        "Draft sent successfully. Message Id: {}",
        str_field(&sent, "id")
    )))
}

/// Handle get_gmail_profile tool
pub async fn handle_profile(ctx: &McpServerContext, _args: Value) -> Result<ToolOutcome> {
    let profile = gmail::get_profile(ctx.api()).await?;
    let address = match str_field(&profile, "emailAddress") {
        "" => "Unknown",
        address => address,
    };

    Ok(ToolOutcome::done(format!(
        "Authenticated Gmail address: {}",
        address
    )))
}

/// Handle create_draft tool
pub async fn handle_create_draft(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateDraftArgs = parse_args(args)?;
    if !validate_email(&args.to) {
        return Err(McpError::InvalidInput(format!(
            "Invalid email format: {}",
            args.to
        )));
    }

    let raw = gmail::build_raw_message(&args.to, &args.subject, &args.body_text);
    let draft = gmail::create_draft(ctx.api(), raw).await?;

    info!(draft = str_field(&draft, "id"), "Draft created");
    Ok(ToolOutcome::done(format!(
        "Draft created. Draft Id: {}",
        str_field(&draft, "id")
    )))
}

/// Handle list_emails tool
pub async fn handle_list(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ListEmailsArgs = parse_args(args)?;

    let ids = gmail::list_messages(ctx.api(), args.max_results, args.query.as_deref()).await?;
    if ids.is_empty() {
        return Ok(ToolOutcome::done("No messages found."));
    }

    let mut output = String::from("Messages:\n");
    for id in &ids {
        let message = gmail::get_message(ctx.api(), id, MessageFormat::Minimal, &[]).await?;
        output.push_str(&format!(
            "- ID: {} | Snippet: {}\n",
            id,
            str_field(&message, "snippet")
        ));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle read_email tool
pub async fn handle_read(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: MessageArgs = parse_args(args)?;
    require("message_id", &args.message_id)?;

    let message = gmail::get_message(ctx.api(), &args.message_id, MessageFormat::Full, &[]).await?;
    Ok(ToolOutcome::done(format!(
        "From: {}\nSubject: {}\nSnippet: {}\n",
        header(&message, "From"),
        header(&message, "Subject"),
        str_field(&message, "snippet")
    )))
}

/// Handle delete_email tool
pub async fn handle_delete(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ConfirmMessageArgs = parse_args(args)?;
    require("message_id", &args.message_id)?;

    // the snippet only feeds the preview
    let snippet = if args.confirm {
        None
    } else {
        Some(snippet_or_placeholder(ctx.api(), &args.message_id, 100).await)
    };
    let decision = evaluate(1, args.confirm, Threshold::Always, || {
        Preview::new(
            PreviewKind::ConfirmationRequired,
            format!("This will permanently delete email {}", args.message_id),
            "delete_email",
            "confirm",
            true,
        )
        .fact("Email preview", snippet.unwrap_or_default())
    });
    if let Err(blocked) = gate(decision) {
        warn!(message = %args.message_id, "Delete email attempted without confirm");
        return Ok(blocked);
    }

    gmail::delete_message(ctx.api(), &args.message_id).await?;

    info!(message = %args.message_id, "Email deleted");
    Ok(ToolOutcome::done(format!(
        "Email {} deleted successfully.",
        args.message_id
    )))
}

/// Handle batch_delete_emails tool
pub async fn handle_batch_delete(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: BatchDeleteArgs = parse_args(args)?;
    require_ids(&args.message_ids)?;

    let count = args.message_ids.len() as u64;
    let mut samples = Vec::new();
    if args.dry_run {
        for id in args.message_ids.iter().take(SHORT_PREVIEW_LIMIT) {
            let snippet = snippet_or_placeholder(ctx.api(), id, 80).await;
            samples.push(format!("{}: {}", id, snippet));
        }
    }
    let omitted = args.message_ids.len().saturating_sub(samples.len());

    let decision = evaluate(count, !args.dry_run, Threshold::Always, || {
        Preview::new(
            PreviewKind::DryRun,
            format!("Would delete {} email(s)", count),
            "batch_delete_emails",
            "dry_run",
            false,
        )
        .samples(samples, SHORT_PREVIEW_LIMIT)
        .omitted(omitted)
        .warning("Deleted emails are removed permanently and cannot be recovered")
    });
    if let Err(blocked) = gate(decision) {
        info!(count, "Batch delete dry run");
        return Ok(blocked);
    }

    gmail::batch_delete(ctx.api(), &args.message_ids).await?;

    info!(count, "Emails batch deleted");
    Ok(ToolOutcome::done(format!(
        "Successfully deleted {} email(s).",
        count
    )))
}

/// Handle gmail_search_and_summarize tool
pub async fn handle_search_and_summarize(
    ctx: &McpServerContext,
    args: Value,
) -> Result<ToolOutcome> {
    let args: SearchArgs = parse_args(args)?;
    require("query", &args.query)?;

    let limit = args.max_results.min(SEARCH_LIMIT);
    let ids = gmail::list_messages(ctx.api(), limit, Some(&args.query)).await?;
    if ids.is_empty() {
        return Ok(ToolOutcome::done("No messages found."));
    }

    let mut lines = Vec::new();
    for id in ids.iter().take(LONG_PREVIEW_LIMIT) {
        let message = gmail::get_message(
            ctx.api(),
            id,
            MessageFormat::Metadata,
            &["From", "Subject", "Date"],
        )
        .await?;
        lines.push(format!(
            "- {} | {} | {}",
            header(&message, "Date"),
            header(&message, "From"),
            header(&message, "Subject")
        ));
    }

    info!(query = %args.query, results = ids.len(), "Gmail search");
    Ok(ToolOutcome::done(format!(
        "Found {} message(s) for query: {}\nTop results:\n{}",
        ids.len(),
        args.query,
        lines.join("\n")
    )))
}

/// Handle gmail_archive tool
pub async fn handle_archive(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ConfirmMessageArgs = parse_args(args)?;
    require("message_id", &args.message_id)?;

    let decision = evaluate(1, args.confirm, Threshold::Always, || {
        Preview::new(
            PreviewKind::ConfirmationRequired,
            format!(
                "This will archive message {} (remove from INBOX)",
                args.message_id
            ),
            "gmail_archive",
            "confirm",
            true,
        )
    });
    if let Err(blocked) = gate(decision) {
        warn!(message = %args.message_id, "Archive attempted without confirm");
        return Ok(blocked);
    }

    gmail::modify_labels(ctx.api(), &args.message_id, &[], &[INBOX_LABEL]).await?;

    info!(message = %args.message_id, "Email archived");
    Ok(ToolOutcome::done(format!(
        "Message archived: {}",
        args.message_id
    )))
}

/// Handle gmail_label_apply tool
///
/// The dry run only looks the label up; a missing label is created when
/// the change is applied.
pub async fn handle_label_apply(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: LabelApplyArgs = parse_args(args)?;
    require_ids(&args.message_ids)?;
    require("label_name", &args.label_name)?;

    let existing = find_label(ctx.api(), &args.label_name).await?;
    if existing.is_none() && !args.create_if_missing {
        return Err(McpError::NotFound(format!(
            "Label not found: {}",
            args.label_name
        )));
    }

    let count = args.message_ids.len() as u64;
    let decision = evaluate(count, !args.dry_run, Threshold::Always, || {
        let label = if existing.is_some() {
            args.label_name.clone()
        } else {
            format!("{} (will be created)", args.label_name)
        };
        Preview::new(
            PreviewKind::DryRun,
            format!(
                "Would apply label '{}' to {} message(s)",
                args.label_name, count
            ),
            "gmail_label_apply",
            "dry_run",
            false,
        )
        .fact("Label", label)
        .samples(args.message_ids.iter().cloned(), SHORT_PREVIEW_LIMIT)
    });
    if let Err(blocked) = gate(decision) {
        info!(label = %args.label_name, count, "Label apply dry run");
        return Ok(blocked);
    }

    let label_id = match existing {
        Some(id) => id,
        None => {
            let created = gmail::create_label(ctx.api(), &args.label_name).await?;
            info!(label = %args.label_name, "Label created");
            str_field(&created, "id").to_string()
        }
    };

    for id in &args.message_ids {
        gmail::modify_labels(ctx.api(), id, &[label_id.as_str()], &[]).await?;
    }

    info!(label = %args.label_name, count, "Label applied");
    Ok(ToolOutcome::done(format!(
        "Label '{}' applied to {} message(s).",
        args.label_name, count
    )))
}
