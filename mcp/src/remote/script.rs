//! Apps Script API helpers

use super::{array_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A file of an Apps Script project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFile {
    pub name: String,

    #[serde(rename = "type")]
    pub file_type: String,

    #[serde(default)]
    pub source: String,
}

/// Current files of a project, as returned by the API
///
/// Files are kept as raw JSON so that a backup preserves every field the
/// API reports, not just the ones this crate models.
pub async fn get_content(api: &dyn RemoteApi, script_id: &str) -> Result<Vec<Value>> {
    let content = api
        .call(ApiRequest::get(
            Backend::Script,
            ["projects", script_id, "content"],
        ))
        .await?;

    Ok(array_field(&content, "files").to_vec())
}

/// Replace every file of a project
pub async fn update_content(api: &dyn RemoteApi, script_id: &str, files: &Value) -> Result<Value> {
    api.call(
        ApiRequest::put(Backend::Script, ["projects", script_id, "content"])
            .json(json!({ "files": files })),
    )
    .await
}

/// Create a standalone or container-bound project
pub async fn create_project(
    api: &dyn RemoteApi,
    title: &str,
    parent_id: Option<&str>,
) -> Result<Value> {
    let mut body = json!({ "title": title });
    if let Some(parent) = parent_id {
        body["parentId"] = json!(parent);
    }

    api.call(ApiRequest::post(Backend::Script, ["projects"]).json(body))
        .await
}
