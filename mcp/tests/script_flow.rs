//! Two-phase script update: prepare, execute, cancel, expiry and restore

mod common;

use common::{call, is_error, operation_id, server, server_with, test_config, text, MockRemote};
use gtools_mcp::BackupWriter;
use reqwest::Method;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const SCRIPT: &str = "abc123";
const CONTENT: &str = "projects/abc123/content";

fn current_files() -> Value {
    json!({
        "files": [
            { "name": "Code", "type": "SERVER_JS", "source": "a\nb\n" },
            { "name": "appsscript", "type": "JSON", "source": "{}" }
        ]
    })
}

fn proposed_files() -> Value {
    json!([
        { "name": "Code", "type": "SERVER_JS", "source": "a\nb\nc\nd\n" },
        { "name": "Helpers", "type": "SERVER_JS", "source": "x\n" }
    ])
}

fn remote() -> std::sync::Arc<MockRemote> {
    let remote = MockRemote::new();
    remote.on(Method::GET, CONTENT, current_files());
    remote.on(Method::PUT, CONTENT, json!({ "scriptId": SCRIPT }));
    remote
}

fn backups_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn backup_path_from(text: &str) -> String {
    let marker = "restore_script_backup(backup_path='";
    let start = text.find(marker).expect("rollback hint") + marker.len();
    let end = text[start..].find('\'').expect("closing quote") + start;
    text[start..end].to_string()
}

#[tokio::test]
async fn test_prepare_does_not_touch_remote_or_disk() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let result = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;

    assert!(!is_error(&result));
    let out = text(&result);
    assert!(out.contains("Script Update Prepared"));
    assert!(out.contains("  ~ MODIFIED: Code (+2 lines)"));
    assert!(out.contains("  + NEW: Helpers"));
    assert!(out.contains("  - DELETED: appsscript"));
    assert!(out.contains("Operation expires in: 10 minutes"));
    assert!(out.contains(&format!(
        "execute_operation(operation_id='{}')",
        operation_id(&result)
    )));

    assert!(remote.mutations().is_empty());
    assert!(backups_in(dir.path()).is_empty());
    assert_eq!(server.context().operations.len().await, 1);
}

#[tokio::test]
async fn test_execute_writes_backup_then_updates() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let id = operation_id(&prepared);

    let result = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(!is_error(&result), "{}", text(&result));
    let out = text(&result);
    assert!(out.contains("Script updated successfully!"));
    assert!(out.contains("Files updated: 2"));

    let updates = remote.calls_to(Method::PUT, CONTENT);
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].body.as_ref().unwrap()["files"],
        proposed_files()
    );

    let backup_path = backup_path_from(&out);
    assert!(Path::new(&backup_path).is_absolute());
    let backup = BackupWriter::read(Path::new(&backup_path)).unwrap();
    assert_eq!(backup.kind, "script");
    assert_eq!(backup.subject_id, SCRIPT);
    assert_eq!(backup.payload, current_files()["files"]);

    assert!(server.context().operations.is_empty().await);
}

#[tokio::test]
async fn test_execute_is_single_shot() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let id = operation_id(&prepared);

    let first = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(!is_error(&first));

    let second = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&second));
    assert_eq!(
        text(&second),
        format!("Error: Operation {} not found or expired", id)
    );

    assert_eq!(remote.calls_to(Method::PUT, CONTENT).len(), 1);
    assert_eq!(backups_in(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_cancel_discards_operation() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let id = operation_id(&prepared);

    let cancelled = call(&server, "cancel_operation", json!({ "operation_id": id })).await;
    assert!(!is_error(&cancelled));
    assert_eq!(text(&cancelled), format!("Operation {} cancelled", id));

    let executed = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&executed));

    let again = call(&server, "cancel_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&again));
    assert!(text(&again).contains("not found or expired"));

    assert!(remote.mutations().is_empty());
    assert!(backups_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_operation() {
    let dir = TempDir::new().unwrap();
    let server = server(remote(), dir.path());

    let result = call(
        &server,
        "execute_operation",
        json!({ "operation_id": "deadbeef" }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(
        text(&result),
        "Error: Operation deadbeef not found or expired"
    );
}

#[tokio::test]
async fn test_expired_operation_cannot_execute() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let config = gtools_config::Config {
        operation_ttl_secs: 1,
        ..test_config(dir.path())
    };
    let server = server_with(remote.clone(), config);

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    assert!(text(&prepared).contains("Operation expires in: 1 second "));
    let id = operation_id(&prepared);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let result = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&result));
    assert!(text(&result).contains("not found or expired"));
    assert!(remote.mutations().is_empty());
    assert!(backups_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_remote_failure_after_backup_keeps_backup() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    remote.fail(Method::PUT, CONTENT, 500, "Backend unavailable");
    let server = server(remote.clone(), dir.path());

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let id = operation_id(&prepared);

    let result = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&result));
    assert!(text(&result).contains("Backend unavailable"));

    // record consumed, backup left on disk
    assert_eq!(backups_in(dir.path()).len(), 1);
    let retry = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(text(&retry).contains("not found or expired"));
}

#[tokio::test]
async fn test_backup_failure_keeps_operation_live() {
    let dir = TempDir::new().unwrap();
    let backup_dir = dir.path().join("backups");
    std::fs::write(&backup_dir, b"not a directory").unwrap();

    let remote = remote();
    let server = server(remote.clone(), &backup_dir);

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let id = operation_id(&prepared);

    let first = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(is_error(&first));
    assert!(!text(&first).contains("not found or expired"));
    assert!(remote.mutations().is_empty());
    assert_eq!(server.context().operations.len().await, 1);

    std::fs::remove_file(&backup_dir).unwrap();

    let retry = call(&server, "execute_operation", json!({ "operation_id": id })).await;
    assert!(!is_error(&retry), "{}", text(&retry));
    assert!(text(&retry).contains("Script updated successfully!"));
    assert_eq!(remote.calls_to(Method::PUT, CONTENT).len(), 1);
    assert_eq!(backups_in(&backup_dir).len(), 1);
    assert!(server.context().operations.is_empty().await);
}

#[tokio::test]
async fn test_backup_name_collision_is_retryable() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let mut ids = Vec::new();
    for _ in 0..2 {
        let prepared = call(
            &server,
            "prepare_script_update",
            json!({ "script_id": SCRIPT, "files": proposed_files() }),
        )
        .await;
        ids.push(operation_id(&prepared));
    }

    let first = call(&server, "execute_operation", json!({ "operation_id": ids[0] })).await;
    assert!(!is_error(&first), "{}", text(&first));

    // both backups land in the same second unless the clock ticked over
    let second = call(&server, "execute_operation", json!({ "operation_id": ids[1] })).await;
    if is_error(&second) {
        assert!(text(&second).contains("already exists"));
        assert_eq!(server.context().operations.len().await, 1);
        assert_eq!(remote.calls_to(Method::PUT, CONTENT).len(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let retry = call(&server, "execute_operation", json!({ "operation_id": ids[1] })).await;
        assert!(!is_error(&retry), "{}", text(&retry));
    }

    assert_eq!(remote.calls_to(Method::PUT, CONTENT).len(), 2);
    assert_eq!(backups_in(dir.path()).len(), 2);
    assert!(server.context().operations.is_empty().await);
}

#[tokio::test]
async fn test_restore_replays_backup() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let prepared = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": SCRIPT, "files": proposed_files() }),
    )
    .await;
    let executed = call(
        &server,
        "execute_operation",
        json!({ "operation_id": operation_id(&prepared) }),
    )
    .await;
    let backup_path = backup_path_from(&text(&executed));

    let restored = call(
        &server,
        "restore_script_backup",
        json!({ "backup_path": backup_path }),
    )
    .await;
    assert!(!is_error(&restored), "{}", text(&restored));
    assert_eq!(
        text(&restored),
        "Script abc123 restored from backup successfully!"
    );

    let updates = remote.calls_to(Method::PUT, CONTENT);
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[1].body.as_ref().unwrap()["files"],
        current_files()["files"]
    );
}

#[tokio::test]
async fn test_restore_missing_backup() {
    let dir = TempDir::new().unwrap();
    let remote = remote();
    let server = server(remote.clone(), dir.path());

    let missing = dir.path().join("backup_script_abc123_20240101_120000.json");
    let result = call(
        &server,
        "restore_script_backup",
        json!({ "backup_path": missing }),
    )
    .await;

    assert!(is_error(&result));
    assert!(text(&result).contains("Backup file not found"));
    assert!(remote.mutations().is_empty());
}

#[tokio::test]
async fn test_prepare_requires_script_id() {
    let dir = TempDir::new().unwrap();
    let server = server(remote(), dir.path());

    let result = call(
        &server,
        "prepare_script_update",
        json!({ "script_id": "", "files": [] }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(
        text(&result),
        "Error: Invalid input: script_id is required"
    );
}
