//! Docs handlers

use super::{gate, parse_args, require, ToolOutcome};
use crate::context::McpServerContext;
use crate::error::Result;
use crate::remote::{docs, drive, str_field};
use crate::server::confirmation::{evaluate, Preview, PreviewKind, Threshold, LONG_PREVIEW_LIMIT};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Deserialize)]
struct DocumentArgs {
    document_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateDocArgs {
    title: String,
}

#[derive(Debug, Deserialize)]
struct AppendArgs {
    document_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct FillTemplateArgs {
    document_id: String,
    replacements: BTreeMap<String, String>,
    #[serde(default)]
    confirm: bool,
}

/// `replaceAllText` requests for each placeholder, case-sensitive
pub fn replacement_requests(replacements: &BTreeMap<String, String>) -> Vec<Value> {
    replacements
        .iter()
        .map(|(key, value)| {
            json!({
                "replaceAllText": {
                    "containsText": { "text": key, "matchCase": true },
                    "replaceText": value,
                }
            })
        })
        .collect()
}

/// Handle read_doc tool
pub async fn handle_read(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: DocumentArgs = parse_args(args)?;
    require("document_id", &args.document_id)?;

    let document = docs::get(ctx.api(), &args.document_id).await?;
    Ok(ToolOutcome::done(format!(
        "Document Content ({}):\n{}",
        str_field(&document, "title"),
        docs::plain_text(&document)
    )))
}

/// Handle create_doc tool
pub async fn handle_create(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: CreateDocArgs = parse_args(args)?;
    require("title", &args.title)?;

    let document = docs::create(ctx.api(), &args.title).await?;
    let id = str_field(&document, "documentId");

    info!(document = id, "Document created");
    Ok(ToolOutcome::done(format!("Created document with ID: {}", id)))
}

/// Handle append_to_doc tool
pub async fn handle_append(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: AppendArgs = parse_args(args)?;
    require("document_id", &args.document_id)?;

    let request = json!({
        "insertText": {
            "endOfSegmentLocation": {},
            "text": args.text,
        }
    });
    docs::batch_update(ctx.api(), &args.document_id, vec![request]).await?;

    info!(document = %args.document_id, chars = args.text.chars().count(), "Text appended");
    Ok(ToolOutcome::done("Successfully appended text to document."))
}

/// Handle doc_fill_template tool
pub async fn handle_fill_template(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: FillTemplateArgs = parse_args(args)?;
    require("document_id", &args.document_id)?;

    let count = args.replacements.len() as u64;
    let decision = evaluate(count, args.confirm, Threshold::Always, || {
        Preview::new(
            PreviewKind::ConfirmationRequired,
            format!("Template fill will replace {} placeholder(s)", count),
            "doc_fill_template",
            "confirm",
            true,
        )
        .fact("Document", args.document_id.clone())
        .samples(
            args.replacements
                .iter()
                .map(|(key, value)| format!("{} -> {}", key, value)),
            LONG_PREVIEW_LIMIT,
        )
    });
    if let Err(blocked) = gate(decision) {
        warn!(document = %args.document_id, placeholders = count, "Template fill blocked");
        return Ok(blocked);
    }

    let response = docs::batch_update(
        ctx.api(),
        &args.document_id,
        replacement_requests(&args.replacements),
    )
    .await?;

    let occurrences: u64 = response
        .get("replies")
        .and_then(Value::as_array)
        .map(|replies| {
            replies
                .iter()
                .filter_map(|r| r.pointer("/replaceAllText/occurrencesChanged"))
                .filter_map(Value::as_u64)
                .sum()
        })
        .unwrap_or(0);

    info!(document = %args.document_id, placeholders = count, occurrences, "Template filled");
    Ok(ToolOutcome::done(format!(
        "Template filled: {} placeholder(s), {} occurrence(s) replaced.",
        count, occurrences
    )))
}

/// Handle doc_export_pdf tool
pub async fn handle_export_pdf(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: DocumentArgs = parse_args(args)?;
    require("document_id", &args.document_id)?;

    let pdf = drive::export(ctx.api(), &args.document_id, PDF_MIME_TYPE).await?;

    info!(document = %args.document_id, bytes = pdf.len(), "Document exported");
    Ok(ToolOutcome::done(format!("PDF (base64): {}", STANDARD.encode(pdf))))
}
