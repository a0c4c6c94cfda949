//! Preservation snapshot written before a memory reset.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::json_file::{read_json, write_json};
use crate::core::context::EssentialDiscovery;
use crate::core::phase::Phase;

/// What the agent needs to resume after its working memory is compacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedContext {
    pub timestamp: String,
    pub session_id: String,
    pub phase: Phase,
    #[serde(default)]
    pub phase_details: Map<String, Value>,
    pub focus_directive: String,
    #[serde(default)]
    pub essential_discoveries: Vec<EssentialDiscovery>,
    #[serde(default)]
    pub token_estimate_at_compact: u64,
    #[serde(default)]
    pub utilization_at_compact: f64,
}

#[derive(Debug, Clone)]
pub struct PreservedStore {
    path: PathBuf,
}

impl PreservedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, preserved: &PreservedContext) -> Result<()> {
        debug!(
            path = %self.path.display(),
            phase = %preserved.phase,
            discoveries = preserved.essential_discoveries.len(),
            "saving preserved context"
        );
        write_json(&self.path, preserved)
    }

    /// The last snapshot, if one exists and is readable.
    pub fn load(&self) -> Option<PreservedContext> {
        match read_json(&self.path) {
            Ok(preserved) => preserved,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{err:#}"),
                    "unreadable preserved context"
                );
                None
            }
        }
    }
}
