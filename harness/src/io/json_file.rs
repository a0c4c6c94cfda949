//! Pretty JSON files written atomically.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Read and deserialize a JSON file. `Ok(None)` when the file is missing.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

/// Serialize as pretty JSON with a trailing newline, via temp file + rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn missing_file_reads_as_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let value: Option<Value> = read_json(&temp.path().join("nope.json")).expect("read");
        assert!(value.is_none());
    }

    /// Verifies nested parents are created and no temp file is left behind.
    #[test]
    fn write_creates_parents_and_cleans_up() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a").join("b").join("state.json");
        write_json(&path, &json!({"k": 1})).expect("write");

        let raw = fs::read_to_string(&path).expect("read raw");
        assert!(raw.ends_with("}\n"));
        assert!(!path.with_extension("json.tmp").exists());
        let value: Option<Value> = read_json(&path).expect("read");
        assert_eq!(value, Some(json!({"k": 1})));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.json");
        fs::write(&path, "{not json").expect("write");
        let err = read_json::<Value>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }
}
