//! Per-invocation environment shared by the hook handlers.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::gate::{ArtifactSource, UnavailableArtifacts};
use crate::io::artifact_store::ArtifactStore;
use crate::io::config::{HarnessConfig, load_config};
use crate::io::context_store::ContextStore;
use crate::io::init::HarnessPaths;
use crate::io::preserved::PreservedStore;
use crate::io::progress::{FileProgress, NullProgress, ProgressSink};
use crate::io::session::SessionStore;

/// Paths, config, and capabilities resolved once at startup.
///
/// Missing capabilities are replaced by permissive stand-ins so handlers never
/// branch on availability.
pub struct HookEnv {
    pub paths: HarnessPaths,
    pub config: HarnessConfig,
    store: Option<ArtifactStore>,
    unavailable: UnavailableArtifacts,
    progress: Box<dyn ProgressSink>,
}

impl HookEnv {
    /// `Ok(None)` when `root` has no `.harness/` directory.
    pub fn open(root: &Path) -> Result<Option<Self>> {
        let paths = HarnessPaths::new(root);
        if !paths.is_initialized() {
            debug!(root = %root.display(), "harness not initialized");
            return Ok(None);
        }
        let config = load_config(&paths.config_path)?;
        Ok(Some(Self::with_config(paths, config)))
    }

    pub fn with_config(paths: HarnessPaths, config: HarnessConfig) -> Self {
        let (store, unavailable) = match ArtifactStore::open(paths.clone()) {
            Ok(store) => (Some(store), UnavailableArtifacts::default()),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "artifact store unavailable");
                (None, UnavailableArtifacts::new(format!("{err:#}")))
            }
        };
        let progress: Box<dyn ProgressSink> = if config.progress.auto_log {
            Box::new(FileProgress::new(paths.progress_path.clone()))
        } else {
            Box::new(NullProgress)
        };
        Self {
            paths,
            config,
            store,
            unavailable,
            progress,
        }
    }

    /// Replace the progress sink.
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Snapshot source for gates; fails when no store could be opened.
    pub fn artifacts(&self) -> &dyn ArtifactSource {
        match &self.store {
            Some(store) => store,
            None => &self.unavailable,
        }
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress.as_ref()
    }

    pub fn context_store(&self) -> ContextStore {
        ContextStore::new(self.paths.context_state_path.clone())
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(self.paths.clone())
    }

    pub fn preserved_store(&self) -> PreservedStore {
        PreservedStore::new(self.paths.preserved_path.clone())
    }
}
