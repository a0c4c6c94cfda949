//! Initialization helpers for `.harness/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{HarnessConfig, write_config};
use crate::core::artifact::ArtifactKind;

/// All canonical paths within `.harness/` for a project root.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    pub root: PathBuf,
    pub harness_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub context_state_path: PathBuf,
    pub preserved_path: PathBuf,
    /// Human-readable progress log at the project root.
    pub progress_path: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let harness_dir = root.join(".harness");
        Self {
            root: root.clone(),
            harness_dir: harness_dir.clone(),
            artifacts_dir: harness_dir.join("artifacts"),
            sessions_dir: harness_dir.join("sessions"),
            gitignore_path: harness_dir.join(".gitignore"),
            config_path: harness_dir.join("config.toml"),
            context_state_path: harness_dir.join("context_state.json"),
            preserved_path: harness_dir.join("preserved_context.json"),
            progress_path: root.join("harness-progress.txt"),
        }
    }

    pub fn artifact_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.artifacts_dir.join(kind.as_str())
    }

    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", file_safe(session_id)))
    }

    /// Hooks do nothing until `harness init` has run.
    pub fn is_initialized(&self) -> bool {
        self.harness_dir.is_dir()
    }
}

/// Session ids come from the event source; keep them to one path segment.
fn file_safe(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "default".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Options for `init_harness`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing harness-owned files.
    pub force: bool,
}

/// Create `.harness/` scaffolding in `root`.
///
/// Fails if `.harness/` already exists unless `options.force` is set. Forcing
/// rewrites the config and `.gitignore`; artifacts are never touched.
pub fn init_harness(root: &Path, options: &InitOptions) -> Result<HarnessPaths> {
    let paths = HarnessPaths::new(root);
    if paths.harness_dir.exists() && !paths.harness_dir.is_dir() {
        return Err(anyhow!(
            "harness init: .harness exists but is not a directory"
        ));
    }
    if paths.harness_dir.exists() && !options.force {
        return Err(anyhow!(
            "harness init: .harness already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.harness_dir)?;
    for kind in ArtifactKind::ALL {
        create_dir(&paths.artifact_dir(kind))?;
    }
    create_dir(&paths.sessions_dir)?;

    write_file(&paths.gitignore_path, HARNESS_GITIGNORE)?;
    write_config(&paths.config_path, &HarnessConfig::default())?;

    info!(root = %root.display(), force = options.force, "harness initialized");
    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const HARNESS_GITIGNORE: &str = "context_state.json\npreserved_context.json\nsessions/\n";
