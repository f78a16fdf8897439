//! Sheets API helpers

use super::{array_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use serde_json::{json, Value};

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Cell grid of a range; rows may be ragged, trailing empty cells are omitted
pub type Grid = Vec<Vec<String>>;

/// Read the values of a range
pub async fn get_values(api: &dyn RemoteApi, spreadsheet_id: &str, range: &str) -> Result<Grid> {
    let response = api
        .call(ApiRequest::get(
            Backend::Sheets,
            ["spreadsheets", spreadsheet_id, "values", range],
        ))
        .await?;

    Ok(array_field(&response, "values")
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect())
                .unwrap_or_default()
        })
        .collect())
}

/// Append rows after the last row of a table
pub async fn append_values(
    api: &dyn RemoteApi,
    spreadsheet_id: &str,
    range: &str,
    values: &[Vec<String>],
) -> Result<Value> {
    let target = format!("{}:append", range);
    api.call(
        ApiRequest::post(
            Backend::Sheets,
            ["spreadsheets", spreadsheet_id, "values", target.as_str()],
        )
        .query("valueInputOption", VALUE_INPUT_OPTION)
        .json(json!({ "values": values })),
    )
    .await
}

/// Overwrite the values of a range
pub async fn update_values(
    api: &dyn RemoteApi,
    spreadsheet_id: &str,
    range: &str,
    values: &[Vec<String>],
) -> Result<Value> {
    api.call(
        ApiRequest::put(
            Backend::Sheets,
            ["spreadsheets", spreadsheet_id, "values", range],
        )
        .query("valueInputOption", VALUE_INPUT_OPTION)
        .json(json!({ "values": values })),
    )
    .await
}

/// Clear the values of a range, keeping formatting
pub async fn clear_values(api: &dyn RemoteApi, spreadsheet_id: &str, range: &str) -> Result<Value> {
    let target = format!("{}:clear", range);
    api.call(
        ApiRequest::post(
            Backend::Sheets,
            ["spreadsheets", spreadsheet_id, "values", target.as_str()],
        )
        .json(json!({})),
    )
    .await
}

/// Create a spreadsheet and return its id
pub async fn create(api: &dyn RemoteApi, title: &str) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Sheets, ["spreadsheets"])
            .query("fields", "spreadsheetId")
            .json(json!({ "properties": { "title": title } })),
    )
    .await
}

/// Spreadsheet metadata, optionally restricted to `fields`
pub async fn get_metadata(
    api: &dyn RemoteApi,
    spreadsheet_id: &str,
    fields: Option<&str>,
) -> Result<Value> {
    api.call(
        ApiRequest::get(Backend::Sheets, ["spreadsheets", spreadsheet_id]).query_opt("fields", fields),
    )
    .await
}

/// Apply structural requests (add sheet, filter view, named range)
pub async fn batch_update(
    api: &dyn RemoteApi,
    spreadsheet_id: &str,
    requests: Vec<Value>,
) -> Result<Value> {
    let target = format!("{}:batchUpdate", spreadsheet_id);
    api.call(
        ApiRequest::post(Backend::Sheets, ["spreadsheets", target.as_str()])
            .json(json!({ "requests": requests })),
    )
    .await
}

/// Grid range object used by batch update requests
pub fn grid_range(sheet_id: i64, start_row: i64, end_row: i64, start_col: i64, end_col: i64) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": start_row,
        "endRowIndex": end_row,
        "startColumnIndex": start_col,
        "endColumnIndex": end_col,
    })
}

/// Text of a cell value
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
