//! Gmail API helpers
//!
//! All calls act on the authenticated user (`users/me`).

use super::{array_field, str_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde_json::{json, Value};

const USER: &str = "me";

/// Message detail level for `messages.get`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Minimal,
    Metadata,
    Full,
}

impl MessageFormat {
    fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Minimal => "minimal",
            MessageFormat::Metadata => "metadata",
            MessageFormat::Full => "full",
        }
    }
}

/// Encode a plain-text message as the base64url `raw` field
///
/// Line breaks are stripped from header values so that a recipient or
/// subject cannot inject extra headers.
pub fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         to: {}\r\n\
         from: me\r\n\
         subject: {}\r\n\
         \r\n\
         {}",
        header_value(to),
        encode_header(&header_value(subject)),
        body
    );
    URL_SAFE.encode(message.as_bytes())
}

fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Authenticated user's profile
pub async fn get_profile(api: &dyn RemoteApi) -> Result<Value> {
    api.call(ApiRequest::get(Backend::Gmail, ["users", USER, "profile"]))
        .await
}

/// Ids of messages matching a query
pub async fn list_messages(
    api: &dyn RemoteApi,
    max_results: u32,
    query: Option<&str>,
) -> Result<Vec<String>> {
    let response = api
        .call(
            ApiRequest::get(Backend::Gmail, ["users", USER, "messages"])
                .query("maxResults", max_results)
                .query_opt("q", query.filter(|q| !q.is_empty())),
        )
        .await?;

    Ok(array_field(&response, "messages")
        .iter()
        .map(|m| str_field(m, "id").to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Fetch one message
pub async fn get_message(
    api: &dyn RemoteApi,
    message_id: &str,
    format: MessageFormat,
    metadata_headers: &[&str],
) -> Result<Value> {
    let mut request = ApiRequest::get(Backend::Gmail, ["users", USER, "messages", message_id])
        .query("format", format.as_str());
    for header in metadata_headers {
        request = request.query("metadataHeaders", header);
    }

    api.call(request).await
}

/// Send a message immediately
pub async fn send_message(api: &dyn RemoteApi, raw: String) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "messages", "send"])
            .json(json!({ "raw": raw })),
    )
    .await
}

/// Save a message as a draft
pub async fn create_draft(api: &dyn RemoteApi, raw: String) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "drafts"])
            .json(json!({ "message": { "raw": raw } })),
    )
    .await
}

/// Send an existing draft
pub async fn send_draft(api: &dyn RemoteApi, draft_id: &str) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "drafts", "send"])
            .json(json!({ "id": draft_id })),
    )
    .await
}

/// Permanently delete one message
pub async fn delete_message(api: &dyn RemoteApi, message_id: &str) -> Result<()> {
    api.call(ApiRequest::delete(
        Backend::Gmail,
        ["users", USER, "messages", message_id],
    ))
    .await?;
    Ok(())
}

/// Permanently delete several messages
pub async fn batch_delete(api: &dyn RemoteApi, message_ids: &[String]) -> Result<()> {
    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "messages", "batchDelete"])
            .json(json!({ "ids": message_ids })),
    )
    .await?;
    Ok(())
}

/// Add and remove labels on a message
pub async fn modify_labels(
    api: &dyn RemoteApi,
    message_id: &str,
    add: &[&str],
    remove: &[&str],
) -> Result<Value> {
    let mut body = json!({});
    if !add.is_empty() {
        body["addLabelIds"] = json!(add);
    }
    if !remove.is_empty() {
        body["removeLabelIds"] = json!(remove);
    }

    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "messages", message_id, "modify"]).json(body),
    )
    .await
}

/// All labels of the mailbox
pub async fn list_labels(api: &dyn RemoteApi) -> Result<Vec<Value>> {
    let response = api
        .call(ApiRequest::get(Backend::Gmail, ["users", USER, "labels"]))
        .await?;
    Ok(array_field(&response, "labels").to_vec())
}

/// Create a visible user label
pub async fn create_label(api: &dyn RemoteApi, name: &str) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Gmail, ["users", USER, "labels"]).json(json!({
            "name": name,
            "labelListVisibility": "labelShow",
            "messageListVisibility": "show",
        })),
    )
    .await
}

/// Value of a message header, empty when absent
pub fn header<'a>(message: &'a Value, name: &str) -> &'a str {
    message
        .get("payload")
        .map(|payload| array_field(payload, "headers"))
        .unwrap_or_default()
        .iter()
        .find(|h| str_field(h, "name") == name)
        .map(|h| str_field(h, "value"))
        .unwrap_or_default()
}
