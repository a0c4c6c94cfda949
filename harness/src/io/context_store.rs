//! Persistence for the per-project context state (`.harness/context_state.json`).

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use super::json_file::{read_json, write_json};
use crate::core::context::ContextState;

/// One context state per project, keyed by session id.
///
/// A stored state belonging to another session is replaced by a fresh one.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state for `session_id`, or start a fresh one.
    ///
    /// Unreadable state is discarded with a warning; tracking restarts.
    pub fn load(&self, session_id: &str, now: &str) -> ContextState {
        match read_json::<ContextState>(&self.path) {
            Ok(Some(state)) if state.session_id == session_id => {
                debug!(session_id, entries = state.entries.len(), "context state loaded");
                state
            }
            Ok(Some(state)) => {
                debug!(
                    previous = %state.session_id,
                    session_id,
                    "context state belongs to another session; starting fresh"
                );
                ContextState::fresh(session_id, now)
            }
            Ok(None) => ContextState::fresh(session_id, now),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{err:#}"),
                    "discarding unreadable context state"
                );
                ContextState::fresh(session_id, now)
            }
        }
    }

    /// Load whatever state is stored, regardless of session.
    pub fn load_any(&self) -> Option<ContextState> {
        match read_json::<ContextState>(&self.path) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{err:#}"),
                    "unreadable context state"
                );
                None
            }
        }
    }

    pub fn save(&self, state: &ContextState) -> Result<()> {
        debug!(
            path = %self.path.display(),
            session_id = %state.session_id,
            entries = state.entries.len(),
            utilization = state.utilization,
            "saving context state"
        );
        write_json(&self.path, state)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::context::{ContextSettings, record};
    use crate::test_support::{FIXED_NOW, read_event};

    fn store() -> (tempfile::TempDir, ContextStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ContextStore::new(temp.path().join("context_state.json"));
        (temp, store)
    }

    #[test]
    fn missing_file_starts_fresh() {
        let (_temp, store) = store();
        let state = store.load("s1", FIXED_NOW);
        assert_eq!(state, ContextState::fresh("s1", FIXED_NOW));
        assert!(store.load_any().is_none());
    }

    /// Verifies state is resumed for the same session and reset for another.
    #[test]
    fn state_is_keyed_by_session() {
        let (_temp, store) = store();
        let mut state = store.load("s1", FIXED_NOW);
        record(
            &mut state,
            &read_event("s1", "src/config.rs", "key = 1"),
            &ContextSettings::default(),
            FIXED_NOW,
        );
        store.save(&state).expect("save");

        assert_eq!(store.load("s1", FIXED_NOW), state);
        assert!(store.load("s2", FIXED_NOW).entries.is_empty());
        assert_eq!(store.load_any().map(|s| s.session_id), Some("s1".to_string()));
    }

    #[test]
    fn corrupt_state_is_discarded() {
        let (_temp, store) = store();
        fs::write(store.path(), "[1, 2").expect("write");
        let state = store.load("s1", FIXED_NOW);
        assert!(state.entries.is_empty());
        assert_eq!(state.session_id, "s1");
    }
}
