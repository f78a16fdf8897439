//! Backup artifacts
//!
//! Pre-change snapshots are written as pretty-printed JSON files named
//! `backup_<kind>_<subject>_<YYYYmmdd>_<HHMMSS>.json`. The file name is the
//! only index: restoring needs nothing but the path.

use crate::error::{McpError, Result};
use chrono::Local;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const BACKUP_PREFIX: &str = "backup";
const BACKUP_EXTENSION: &str = "json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A backup read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    /// Kind token from the file name (e.g. `script`)
    pub kind: String,

    /// Identifier of the backed-up resource
    pub subject_id: String,

    /// Snapshot content
    pub payload: Value,
}

/// Writes and reads backup artifacts under one directory
#[derive(Debug, Clone)]
pub struct BackupWriter {
    dir: PathBuf,
}

impl BackupWriter {
    /// Create a writer for `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backup directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `payload` as a new backup and return its absolute path
    ///
    /// Never overwrites: a name collision is reported as an error.
    pub fn write(&self, payload: &Value, kind: &str, subject_id: &str) -> Result<PathBuf> {
        validate_token("kind", kind)?;
        validate_token("subject id", subject_id)?;

        std::fs::create_dir_all(&self.dir)?;
        let dir = std::fs::canonicalize(&self.dir)?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let filename = format!(
            "{}_{}_{}_{}.{}",
            BACKUP_PREFIX, kind, subject_id, timestamp, BACKUP_EXTENSION
        );
        let path = dir.join(filename);

        let content = serde_json::to_string_pretty(payload)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    McpError::Internal(format!(
                        "Backup {} already exists, refusing to overwrite",
                        path.display()
                    ))
                } else {
                    McpError::Io(e)
                }
            })?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        info!(path = %path.display(), kind, subject = subject_id, "Backup created");
        Ok(path)
    }

    /// Read a backup back, recovering its kind and subject from the name
    pub fn read(path: &Path) -> Result<Backup> {
        if !path.is_file() {
            return Err(McpError::NotFound(format!(
                "Backup file not found: {}",
                path.display()
            )));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| McpError::InvalidInput("Invalid backup filename format".to_string()))?;
        let (kind, subject_id) = parse_backup_name(&filename)?;

        let content = std::fs::read_to_string(path)?;
        let payload: Value = serde_json::from_str(&content).map_err(|e| {
            McpError::InvalidInput(format!(
                "Backup {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Backup {
            kind,
            subject_id,
            payload,
        })
    }
}

/// Split a backup file name into its kind and subject tokens
///
/// The subject is the third `_`-separated token. When the name ends in the
/// two-token timestamp, every token between the kind and the timestamp
/// belongs to the subject, so ids containing `_` survive the round trip.
pub fn parse_backup_name(filename: &str) -> Result<(String, String)> {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let tokens: Vec<&str> = stem.split('_').collect();

    if tokens.len() < 3 || tokens[0] != BACKUP_PREFIX || tokens[2].is_empty() {
        return Err(McpError::InvalidInput(
            "Invalid backup filename format".to_string(),
        ));
    }

    let kind = tokens[1].to_string();
    let n = tokens.len();
    let has_timestamp = n >= 5 && is_digits(tokens[n - 2], 8) && is_digits(tokens[n - 1], 6);

    let subject_id = if has_timestamp {
        tokens[2..n - 2].join("_")
    } else {
        tokens[2].to_string()
    };

    Ok((kind, subject_id))
}

fn is_digits(token: &str, len: usize) -> bool {
    token.len() == len && token.bytes().all(|b| b.is_ascii_digit())
}

fn validate_token(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(McpError::InvalidInput(format!("Backup {} is empty", what)));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(McpError::InvalidInput(format!(
            "Backup {} contains a path separator: {}",
            what, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let writer = BackupWriter::new(dir.path().join("backups"));
        let payload = json!([
            {"name": "Code", "type": "SERVER_JS", "source": "function main() {}\n"},
            {"name": "appsscript", "type": "JSON", "source": "{\"timeZone\": \"Europe/Zürich\"}"}
        ]);

        let path = writer.write(&payload, "script", "S1").unwrap();
        assert!(path.is_absolute());

        let backup = BackupWriter::read(&path).unwrap();
        assert_eq!(backup.payload, payload);
        assert_eq!(backup.subject_id, "S1");
        assert_eq!(backup.kind, "script");
    }

    #[test]
    fn test_file_name_layout() {
        let dir = TempDir::new().unwrap();
        let writer = BackupWriter::new(dir.path());

        let path = writer.write(&json!([]), "script", "S1").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("backup_script_S1_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.split('_').count(), 5);
    }

    #[test]
    fn test_content_is_indented_and_unicode_preserving() {
        let dir = TempDir::new().unwrap();
        let writer = BackupWriter::new(dir.path());

        let path = writer.write(&json!({"title": "Übersicht"}), "script", "S1").unwrap();
        let content = std::fs::read_to_string(path).unwrap();

        assert!(content.contains("Übersicht"));
        assert!(content.contains("\n  \"title\""));
    }

    #[test]
    fn test_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let writer = BackupWriter::new(dir.path());

        let first = writer.write(&json!(["first"]), "script", "S1");
        let second = writer.write(&json!(["second"]), "script", "S1");

        // Both calls may land in the same second: the second must then fail
        // and leave the first file untouched.
        let first = first.unwrap();
        match second {
            Ok(path) => assert_ne!(path, first),
            Err(e) => assert!(matches!(e, McpError::Internal(_))),
        }
        let backup = BackupWriter::read(&first).unwrap();
        assert_eq!(backup.payload, json!(["first"]));
    }

    #[test]
    fn test_rejects_path_separators() {
        let dir = TempDir::new().unwrap();
        let writer = BackupWriter::new(dir.path());

        assert!(matches!(
            writer.write(&json!([]), "script", "../escape"),
            Err(McpError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let result = BackupWriter::read(Path::new("/nonexistent/backup_script_S1_20240101_120000.json"));
        assert!(matches!(result, Err(McpError::NotFound(_))));
    }

    #[test]
    fn test_read_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup_script_S1_20240101_120000.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            BackupWriter::read(&path),
            Err(McpError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_bad_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "[]").unwrap();

        assert!(matches!(
            BackupWriter::read(&path),
            Err(McpError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_name_with_underscored_subject() {
        let (kind, subject) =
            parse_backup_name("backup_script_1AbC_dEf-9_20240131_235959.json").unwrap();
        assert_eq!(kind, "script");
        assert_eq!(subject, "1AbC_dEf-9");
    }

    #[test]
    fn test_parse_name_without_timestamp() {
        let (_, subject) = parse_backup_name("backup_script_S1.json").unwrap();
        assert_eq!(subject, "S1");

        assert!(parse_backup_name("backup_script.json").is_err());
        assert!(parse_backup_name("backup_script_.json").is_err());
    }
}
