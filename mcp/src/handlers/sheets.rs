//! Sheets handlers

use super::{gate, parse_args, require, ToolOutcome};
use crate::context::McpServerContext;
use crate::error::{McpError, Result};
use crate::remote::sheets::{self, cell_text, grid_range, Grid};
use crate::remote::{array_field, str_field};
use crate::server::confirmation::{
    evaluate, filled_percent, format_count, Preview, PreviewKind, Threshold,
    LONG_PREVIEW_LIMIT, RANGE_CLEAR_THRESHOLD,
};
use regex::{NoExpand, Regex};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const DEFAULT_EXPORT_ROWS: usize = 5000;
const DEFAULT_GRID_ROWS: i64 = 1000;
const DEFAULT_GRID_COLUMNS: i64 = 26;

#[derive(Debug, Deserialize)]
struct RangeArgs {
    spreadsheet_id: String,
    range_name: String,
}

#[derive(Debug, Deserialize)]
struct AppendRowArgs {
    spreadsheet_id: String,
    range_name: String,
    values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateSheetArgs {
    spreadsheet_id: String,
    range_name: String,
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TitleArgs {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetArgs {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct AddSheetArgs {
    spreadsheet_id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ClearRangeArgs {
    spreadsheet_id: String,
    range_name: String,
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Deserialize)]
struct FilterViewArgs {
    spreadsheet_id: String,
    sheet_id: i64,
    title: String,
    #[serde(default)]
    start_row: i64,
    #[serde(default)]
    end_row: Option<i64>,
    #[serde(default)]
    start_col: i64,
    #[serde(default)]
    end_col: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExportCsvArgs {
    spreadsheet_id: String,
    range_name: String,
    #[serde(default = "default_export_rows")]
    max_rows: usize,
}

fn default_export_rows() -> usize {
    DEFAULT_EXPORT_ROWS
}

#[derive(Debug, Deserialize)]
struct FindReplaceArgs {
    spreadsheet_id: String,
    range_name: String,
    find_text: String,
    replace_text: String,
    #[serde(default = "default_true")]
    dry_run: bool,
    #[serde(default)]
    match_case: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct NamedRangeArgs {
    spreadsheet_id: String,
    name: String,
    sheet_id: i64,
    start_row: i64,
    end_row: i64,
    start_col: i64,
    end_col: i64,
}

/// Occupied extent of a range: `rows × widest row`, and non-empty cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeExtent {
    pub total: u64,
    pub filled: u64,
}

impl RangeExtent {
    /// Measure the current values of a range
    pub fn of(values: &Grid) -> Self {
        let rows = values.len() as u64;
        let cols = values.iter().map(Vec::len).max().unwrap_or(0) as u64;
        let filled = values
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count() as u64;

        Self {
            total: rows * cols,
            filled,
        }
    }
}

/// A single find/replace hit, 1-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatch {
    pub row: usize,
    pub col: usize,
    pub before: String,
    pub after: String,
}

/// Apply a find/replace to a grid, returning the hits and the new grid
pub fn find_replace(
    values: &Grid,
    find_text: &str,
    replace_text: &str,
    match_case: bool,
) -> Result<(Vec<CellMatch>, Grid)> {
    let pattern = Regex::new(&format!("(?i){}", regex::escape(find_text)))
        .map_err(|e| McpError::InvalidInput(format!("Invalid find_text: {}", e)))?;

    let mut matches = Vec::new();
    let updated = values
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, cell)| {
                    let after = if match_case {
                        if !cell.contains(find_text) {
                            return cell.clone();
                        }
                        cell.replace(find_text, replace_text)
                    } else {
                        if !pattern.is_match(cell) {
                            return cell.clone();
                        }
                        pattern.replace_all(cell, NoExpand(replace_text)).into_owned()
                    };
                    matches.push(CellMatch {
                        row: r + 1,
                        col: c + 1,
                        before: cell.clone(),
                        after: after.clone(),
                    });
                    after
                })
                .collect()
        })
        .collect();

    Ok((matches, updated))
}

/// Quote a CSV field when it contains a separator, quote or line break
pub fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Handle read_sheet tool
pub async fn handle_read(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: RangeArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;

    let values = sheets::get_values(ctx.api(), &args.spreadsheet_id, &args.range_name).await?;
    if values.is_empty() {
        return Ok(ToolOutcome::done("No data found."));
    }

    let mut output = format!("Data from sheet (range {}):\n", args.range_name);
    for row in &values {
        output.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle append_row tool
pub async fn handle_append_row(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: AppendRowArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;

    let row: Vec<String> = args.values.iter().map(cell_text).collect();
    let response =
        sheets::append_values(ctx.api(), &args.spreadsheet_id, &args.range_name, &[row]).await?;
    let cells = response
        .pointer("/updates/updatedCells")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    info!(spreadsheet = %args.spreadsheet_id, range = %args.range_name, cells, "Row appended");
    Ok(ToolOutcome::done(format!(
        "Successfully appended {} cells.",
        cells
    )))
}

/// Handle update_sheet tool
pub async fn handle_update(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: UpdateSheetArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;

    let grid: Grid = args
        .values
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    let response =
        sheets::update_values(ctx.api(), &args.spreadsheet_id, &args.range_name, &grid).await?;
    let cells = response
        .get("updatedCells")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    info!(spreadsheet = %args.spreadsheet_id, range = %args.range_name, cells, "Range updated");
    Ok(ToolOutcome::done(format!("Successfully updated {} cells.", cells)))
}

/// Handle create_spreadsheet tool
pub async fn handle_create(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: TitleArgs = parse_args(args)?;
    require("title", &args.title)?;

    let created = sheets::create(ctx.api(), &args.title).await?;
    let id = str_field(&created, "spreadsheetId");

    info!(spreadsheet = id, "Spreadsheet created");
    Ok(ToolOutcome::done(format!(
        "Created spreadsheet with ID: {}",
        id
    )))
}

/// Handle add_sheet tool
pub async fn handle_add_sheet(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: AddSheetArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("title", &args.title)?;

    let request = json!({ "addSheet": { "properties": { "title": args.title } } });
    sheets::batch_update(ctx.api(), &args.spreadsheet_id, vec![request]).await?;

    Ok(ToolOutcome::done(format!(
        "Added sheet '{}' to spreadsheet.",
        args.title
    )))
}

/// Handle get_spreadsheet_meta tool
pub async fn handle_meta(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: SpreadsheetArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;

    let meta = sheets::get_metadata(ctx.api(), &args.spreadsheet_id, None).await?;
    let title = meta
        .pointer("/properties/title")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut output = format!(
        "Spreadsheet: {} (ID: {})\nSheets:\n",
        title, args.spreadsheet_id
    );
    for sheet in array_field(&meta, "sheets") {
        let props = sheet.get("properties").cloned().unwrap_or(Value::Null);
        output.push_str(&format!(
            "- {} (ID: {})\n",
            str_field(&props, "title"),
            props.get("sheetId").cloned().unwrap_or(Value::Null)
        ));
    }
    Ok(ToolOutcome::done(output))
}

/// Handle clear_range tool
///
/// Impact is the occupied extent of the range as it is now; anything above
/// the threshold needs `confirm=true`.
pub async fn handle_clear_range(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ClearRangeArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;

    let values = sheets::get_values(ctx.api(), &args.spreadsheet_id, &args.range_name).await?;
    let extent = RangeExtent::of(&values);

    let decision = evaluate(
        extent.total,
        args.confirm,
        Threshold::Above(RANGE_CLEAR_THRESHOLD),
        || {
            Preview::new(
                PreviewKind::DryRun,
                format!("Large range detected ({} cells)", format_count(extent.total)),
                "clear_range",
                "confirm",
                true,
            )
            .fact("Would clear range", args.range_name.clone())
            .fact("Total cells", format_count(extent.total))
            .fact(
                "Filled cells",
                format!(
                    "{} ({:.1}%)",
                    format_count(extent.filled),
                    filled_percent(extent.filled, extent.total)
                ),
            )
            .fact("Empty cells", format_count(extent.total - extent.filled))
            .warning(format!(
                "This will delete all data in {} cells",
                format_count(extent.filled)
            ))
            .suggestion("Clear specific columns instead of the entire sheet")
        },
    );
    if let Err(blocked) = gate(decision) {
        warn!(range = %args.range_name, cells = extent.total, "Large range clear blocked");
        return Ok(blocked);
    }

    sheets::clear_values(ctx.api(), &args.spreadsheet_id, &args.range_name).await?;

    info!(
        spreadsheet = %args.spreadsheet_id,
        range = %args.range_name,
        cells = extent.filled,
        "Range cleared"
    );
    Ok(ToolOutcome::done(format!(
        "Cleared range {} ({} cells removed).",
        args.range_name,
        format_count(extent.filled)
    )))
}

/// Handle sheet_create_filter_view tool
pub async fn handle_create_filter_view(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: FilterViewArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("title", &args.title)?;

    let (end_row, end_col) = match (args.end_row, args.end_col) {
        (Some(r), Some(c)) => (r, c),
        (end_row, end_col) => {
            let meta =
                sheets::get_metadata(ctx.api(), &args.spreadsheet_id, Some("sheets.properties"))
                    .await?;
            let grid = array_field(&meta, "sheets")
                .iter()
                .filter_map(|s| s.get("properties"))
                .find(|p| p.get("sheetId").and_then(Value::as_i64) == Some(args.sheet_id))
                .and_then(|p| p.get("gridProperties"))
                .cloned()
                .unwrap_or(Value::Null);

            (
                end_row.unwrap_or_else(|| {
                    grid.get("rowCount")
                        .and_then(Value::as_i64)
                        .unwrap_or(DEFAULT_GRID_ROWS)
                }),
                end_col.unwrap_or_else(|| {
                    grid.get("columnCount")
                        .and_then(Value::as_i64)
                        .unwrap_or(DEFAULT_GRID_COLUMNS)
                }),
            )
        }
    };

    let range = grid_range(args.sheet_id, args.start_row, end_row, args.start_col, end_col);
    let request = json!({ "addFilterView": { "filter": { "title": args.title, "range": range } } });
    sheets::batch_update(ctx.api(), &args.spreadsheet_id, vec![request]).await?;

    info!(spreadsheet = %args.spreadsheet_id, sheet = args.sheet_id, title = %args.title, "Filter view created");
    Ok(ToolOutcome::done(format!("Filter view created: {}", args.title)))
}

/// Handle sheet_export_csv tool
pub async fn handle_export_csv(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: ExportCsvArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;

    let values = sheets::get_values(ctx.api(), &args.spreadsheet_id, &args.range_name).await?;
    if values.is_empty() {
        return Ok(ToolOutcome::done("No data found."));
    }

    let lines: Vec<String> = values
        .iter()
        .take(args.max_rows)
        .map(|row| {
            row.iter()
                .map(|cell| escape_csv(cell))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    info!(range = %args.range_name, rows = lines.len(), "CSV export");
    Ok(ToolOutcome::done(format!("CSV Export:\n{}", lines.join("\n"))))
}

/// Handle sheet_find_replace tool
///
/// Defaults to a dry run listing the matches; `dry_run=false` writes the
/// whole range back with the replacements applied.
pub async fn handle_find_replace(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: FindReplaceArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("range_name", &args.range_name)?;
    if args.find_text.is_empty() {
        return Err(McpError::missing("find_text"));
    }

    let values = sheets::get_values(ctx.api(), &args.spreadsheet_id, &args.range_name).await?;
    if values.is_empty() {
        return Ok(ToolOutcome::done("No data found."));
    }

    let (matches, updated) =
        find_replace(&values, &args.find_text, &args.replace_text, args.match_case)?;
    if matches.is_empty() {
        return Ok(ToolOutcome::done(format!(
            "No matches found for '{}'.",
            args.find_text
        )));
    }

    let decision = evaluate(matches.len() as u64, !args.dry_run, Threshold::Always, || {
        Preview::new(
            PreviewKind::DryRun,
            format!("Found {} matches", matches.len()),
            "sheet_find_replace",
            "dry_run",
            false,
        )
        .fact("Range", args.range_name.clone())
        .samples(
            matches
                .iter()
                .map(|m| format!("({}, {}) {} -> {}", m.row, m.col, m.before, m.after)),
            LONG_PREVIEW_LIMIT,
        )
    });
    if let Err(blocked) = gate(decision) {
        info!(range = %args.range_name, matches = matches.len(), "Find/replace dry run");
        return Ok(blocked);
    }

    sheets::update_values(ctx.api(), &args.spreadsheet_id, &args.range_name, &updated).await?;

    info!(range = %args.range_name, matches = matches.len(), "Find/replace applied");
    Ok(ToolOutcome::done(format!(
        "Replaced {} occurrence(s).",
        matches.len()
    )))
}

/// Handle sheet_create_named_range tool
pub async fn handle_create_named_range(ctx: &McpServerContext, args: Value) -> Result<ToolOutcome> {
    let args: NamedRangeArgs = parse_args(args)?;
    require("spreadsheet_id", &args.spreadsheet_id)?;
    require("name", &args.name)?;

    let range = grid_range(
        args.sheet_id,
        args.start_row,
        args.end_row,
        args.start_col,
        args.end_col,
    );
    let request = json!({ "addNamedRange": { "namedRange": { "name": args.name, "range": range } } });
    sheets::batch_update(ctx.api(), &args.spreadsheet_id, vec![request]).await?;

    info!(name = %args.name, sheet = args.sheet_id, "Named range created");
    Ok(ToolOutcome::done(format!("Named range created: {}", args.name)))
}
