//! Human-readable progress log (`harness-progress.txt`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::types::{ActionKind, param_str, prefix};

/// Destination for progress lines.
pub trait ProgressSink {
    fn append(&self, message: &str) -> Result<()>;
}

/// Appends timestamped lines to a file.
#[derive(Debug, Clone)]
pub struct FileProgress {
    path: PathBuf,
}

impl FileProgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressSink for FileProgress {
    fn append(&self, message: &str) -> Result<()> {
        let line = format!("[{}] {message}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        debug!(path = %self.path.display(), message, "appending progress");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open progress log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append progress log {}", self.path.display()))
    }
}

/// Discards everything. Used when progress logging is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn append(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Progress line for an automatically logged change.
pub fn auto_log_entry(kind: &ActionKind, parameters: &Map<String, Value>, reason: &str) -> String {
    match kind {
        ActionKind::Write => format!(
            "AUTO: Created {} ({reason})",
            file_name(param_str(parameters, "file_path"))
        ),
        ActionKind::Edit => format!(
            "AUTO: Modified {} ({reason})",
            file_name(param_str(parameters, "file_path"))
        ),
        ActionKind::Bash => {
            let command = param_str(parameters, "command");
            let shown = prefix(command, 40);
            let ellipsis = if shown.len() < command.len() { "..." } else { "" };
            format!("AUTO: Ran '{shown}{ellipsis}' ({reason})")
        }
        other => format!("AUTO: {other} ({reason})"),
    }
}
