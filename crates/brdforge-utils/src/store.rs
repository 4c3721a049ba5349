//! Atomic JSON persistence
//!
//! Durable documents (checkpoints, run outputs) are written through a
//! temp-file-then-rename discipline: content goes to a sibling temporary
//! file in the target directory, is fsynced, and is renamed into place.
//! A concurrent reader observes either the fully-previous or the
//! fully-new content, never a torn write.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde_json::Value;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Atomically write a JSON document to `path`.
///
/// The parent directory is created if missing. Any I/O failure is
/// propagated to the caller; a failed write must never be treated as
/// flushed state.
pub fn write_json_atomic(path: &Utf8Path, value: &Value) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize document for {path}"))?;

    // Temp file must live in the target directory so the rename stays on
    // one filesystem and remains atomic.
    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;
    temp_file
        .write_all(content.as_bytes())
        .with_context(|| format!("Failed to write temporary file for {path}"))?;
    temp_file
        .as_file()
        .sync_all()
        .with_context(|| format!("Failed to fsync temporary file for {path}"))?;
    temp_file
        .persist(path.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| format!("Failed to atomically replace {path}"))?;

    Ok(())
}

/// Read a JSON document from `path`.
///
/// Returns `Ok(None)` when the path does not exist. Unreadable or
/// unparseable content is an error, not an absence.
pub fn read_json(path: &Utf8Path) -> Result<Option<Value>> {
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {path}")),
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON document at {path}"))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "doc.json");
        let doc = json!({"run_id": "r-1", "status": "running"});

        write_json_atomic(&path, &doc).unwrap();
        assert_eq!(read_json(&path).unwrap(), Some(doc));
    }

    #[test]
    fn read_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "absent.json");
        assert_eq!(read_json(&path).unwrap(), None);
    }

    #[test]
    fn read_corrupted_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "bad.json");
        fs::write(path.as_std_path(), "{ not json").unwrap();
        assert!(read_json(&path).is_err());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "nested/deeper/doc.json");
        write_json_atomic(&path, &json!({"k": 1})).unwrap();
        assert!(path.as_std_path().exists());
    }

    #[test]
    fn write_replaces_existing_content_fully() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "doc.json");
        write_json_atomic(&path, &json!({"version": 1})).unwrap();
        write_json_atomic(&path, &json!({"version": 2})).unwrap();
        assert_eq!(read_json(&path).unwrap(), Some(json!({"version": 2})));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "doc.json");
        write_json_atomic(&path, &json!({"k": 1})).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
