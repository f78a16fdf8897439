//! Drive API helpers

use super::{array_field, ApiRequest, Backend, RemoteApi};
use crate::error::Result;
use serde_json::Value;

/// MIME type of Drive folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Files matching a Drive query
pub async fn list_files(
    api: &dyn RemoteApi,
    query: &str,
    page_size: u32,
    fields: &str,
) -> Result<Vec<Value>> {
    let response = api
        .call(
            ApiRequest::get(Backend::Drive, ["files"])
                .query("q", query)
                .query("pageSize", page_size)
                .query("fields", fields),
        )
        .await?;

    Ok(array_field(&response, "files").to_vec())
}

/// Metadata of one file
pub async fn get_file(api: &dyn RemoteApi, file_id: &str, fields: &str) -> Result<Value> {
    api.call(ApiRequest::get(Backend::Drive, ["files", file_id]).query("fields", fields))
        .await
}

/// Create a metadata-only file (e.g. a folder)
pub async fn create_file(api: &dyn RemoteApi, metadata: Value, fields: &str) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Drive, ["files"])
            .query("fields", fields)
            .json(metadata),
    )
    .await
}

/// Re-parent a file
pub async fn update_parents(
    api: &dyn RemoteApi,
    file_id: &str,
    add: &str,
    remove: &str,
) -> Result<Value> {
    api.call(
        ApiRequest::patch(Backend::Drive, ["files", file_id])
            .query("addParents", add)
            .query("removeParents", remove)
            .query("fields", "id, parents")
            .json(Value::Object(Default::default())),
    )
    .await
}

/// Copy a file
pub async fn copy_file(api: &dyn RemoteApi, file_id: &str, body: Value) -> Result<Value> {
    api.call(
        ApiRequest::post(Backend::Drive, ["files", file_id, "copy"])
            .query("fields", "id,name")
            .json(body),
    )
    .await
}

/// Export a Google Workspace document to another format
pub async fn export(api: &dyn RemoteApi, file_id: &str, mime_type: &str) -> Result<Vec<u8>> {
    api.download(
        ApiRequest::get(Backend::Drive, ["files", file_id, "export"]).query("mimeType", mime_type),
    )
    .await
}

/// Permissions of a file
pub async fn list_permissions(api: &dyn RemoteApi, file_id: &str, fields: &str) -> Result<Vec<Value>> {
    let response = api
        .call(ApiRequest::get(Backend::Drive, ["files", file_id, "permissions"]).query("fields", fields))
        .await?;

    Ok(array_field(&response, "permissions").to_vec())
}

/// Grant a permission
pub async fn create_permission(api: &dyn RemoteApi, file_id: &str, permission: Value) -> Result<Value> {
    api.call(ApiRequest::post(Backend::Drive, ["files", file_id, "permissions"]).json(permission))
        .await
}

/// Remove a permission
pub async fn delete_permission(api: &dyn RemoteApi, file_id: &str, permission_id: &str) -> Result<()> {
    api.call(ApiRequest::delete(
        Backend::Drive,
        ["files", file_id, "permissions", permission_id],
    ))
    .await?;
    Ok(())
}
