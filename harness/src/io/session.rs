//! Per-session change ledger used for checkpoint suggestions.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::init::HarnessPaths;
use super::json_file::{read_json, write_json};
use crate::core::classifier::{ChangeLevel, should_suggest_checkpoint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantChange {
    pub time: String,
    pub level: ChangeLevel,
    pub reason: String,
}

/// Changes observed since the last checkpoint suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLedger {
    pub session_id: String,
    #[serde(default)]
    pub changes_since_checkpoint: u32,
    #[serde(default)]
    pub last_checkpoint_time: Option<String>,
    #[serde(default)]
    pub significant_changes: Vec<SignificantChange>,
}

impl SessionLedger {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            changes_since_checkpoint: 0,
            last_checkpoint_time: None,
            significant_changes: Vec::new(),
        }
    }

    /// Checkpoint weight of one change.
    pub fn score(level: ChangeLevel) -> u32 {
        match level {
            ChangeLevel::Trivial => 0,
            ChangeLevel::Significant => 1,
            ChangeLevel::Major => 3,
        }
    }

    /// Add a classified change to the running score.
    pub fn observe(&mut self, level: ChangeLevel, reason: &str, now: &str) {
        self.changes_since_checkpoint += Self::score(level);
        if level > ChangeLevel::Trivial {
            self.significant_changes.push(SignificantChange {
                time: now.to_string(),
                level,
                reason: reason.to_string(),
            });
        }
    }

    /// Reason to suggest a checkpoint after observing `level`, if any.
    ///
    /// A suggestion resets the running score.
    pub fn checkpoint_due(
        &mut self,
        level: ChangeLevel,
        reason: &str,
        threshold: u32,
        now: &str,
    ) -> Option<String> {
        let due = if should_suggest_checkpoint(level) {
            format!("Major change: {reason}")
        } else if self.changes_since_checkpoint >= threshold {
            format!(
                "{} significant changes accumulated",
                self.changes_since_checkpoint
            )
        } else {
            return None;
        };
        self.changes_since_checkpoint = 0;
        self.last_checkpoint_time = Some(now.to_string());
        Some(due)
    }
}

/// Ledger files under `.harness/sessions/`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    paths: HarnessPaths,
}

impl SessionStore {
    pub fn new(paths: HarnessPaths) -> Self {
        Self { paths }
    }

    fn path(&self, session_id: &str) -> PathBuf {
        self.paths.session_path(session_id)
    }

    pub fn load(&self, session_id: &str) -> SessionLedger {
        let path = self.path(session_id);
        match read_json::<SessionLedger>(&path) {
            Ok(Some(ledger)) => ledger,
            Ok(None) => SessionLedger::new(session_id),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "resetting unreadable session ledger"
                );
                SessionLedger::new(session_id)
            }
        }
    }

    pub fn save(&self, ledger: &SessionLedger) -> Result<()> {
        let path = self.path(&ledger.session_id);
        debug!(
            path = %path.display(),
            score = ledger.changes_since_checkpoint,
            "saving session ledger"
        );
        write_json(&path, ledger)
    }
}
