//! Docs API helpers

use super::{array_field, str_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use serde_json::{json, Value};

/// Fetch a document
pub async fn get(api: &dyn RemoteApi, document_id: &str) -> Result<Value> {
    api.call(ApiRequest::get(Backend::Docs, ["documents", document_id]))
        .await
}

/// Create an empty document
pub async fn create(api: &dyn RemoteApi, title: &str) -> Result<Value> {
    api.call(ApiRequest::post(Backend::Docs, ["documents"]).json(json!({ "title": title })))
        .await
}

/// Apply edit requests to a document
pub async fn batch_update(api: &dyn RemoteApi, document_id: &str, requests: Vec<Value>) -> Result<Value> {
    let target = format!("{}:batchUpdate", document_id);
    api.call(
        ApiRequest::post(Backend::Docs, ["documents", target.as_str()])
            .json(json!({ "requests": requests })),
    )
    .await
}

/// Concatenated text runs of the document body's paragraphs
pub fn plain_text(document: &Value) -> String {
    let content = document
        .get("body")
        .map(|body| array_field(body, "content"))
        .unwrap_or_default();

    content
        .iter()
        .filter_map(|element| element.get("paragraph"))
        .flat_map(|paragraph| array_field(paragraph, "elements").iter())
        .filter_map(|element| element.get("textRun"))
        .map(|run| str_field(run, "content"))
        .collect()
}
