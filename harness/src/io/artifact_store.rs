//! File-per-record artifact persistence under `.harness/artifacts/<kind>/`.
//!
//! Writes are last-writer-wins with no locking. Callers must ensure a single
//! writer per project at a time.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::clock;
use super::init::HarnessPaths;
use super::json_file::write_json;
use crate::core::artifact::{
    Artifact, ArtifactKind, ImplementationArtifact, PlanArtifact, ResearchArtifact,
};
use crate::core::gate::ArtifactSource;
use crate::core::phase::ArtifactSnapshot;
use crate::core::schema;

const SLUG_MAX_CHARS: usize = 30;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: HarnessPaths,
}

impl ArtifactStore {
    pub fn new(paths: HarnessPaths) -> Self {
        Self { paths }
    }

    /// Open the store of an initialized project.
    pub fn open(paths: HarnessPaths) -> Result<Self> {
        if !paths.artifacts_dir.is_dir() {
            bail!(
                "artifact directory {} does not exist (run `harness init`)",
                paths.artifacts_dir.display()
            );
        }
        Ok(Self::new(paths))
    }

    fn record_path(&self, kind: ArtifactKind, id: &str) -> PathBuf {
        self.paths.artifact_dir(kind).join(format!("{id}.json"))
    }

    /// Time-derived id, suffixed `-2`, `-3`, ... when already taken.
    fn new_id(&self, kind: ArtifactKind, slug: &str) -> String {
        let base = format!("{}-{slug}", clock::id_stamp(Utc::now()));
        let mut id = base.clone();
        let mut n = 2;
        while self.record_path(kind, &id).exists() {
            id = format!("{base}-{n}");
            n += 1;
        }
        id
    }

    pub fn create_research(&self, task: &str) -> Result<ResearchArtifact> {
        let id = self.new_id(ArtifactKind::Research, &task_slug(task));
        let research = ResearchArtifact::new(id, task, &clock::now());
        self.save(&research)?;
        Ok(research)
    }

    pub fn create_plan(
        &self,
        research_id: &str,
        goal: &str,
        approach: &str,
    ) -> Result<PlanArtifact> {
        let id = self.new_id(ArtifactKind::Plan, "plan");
        let plan = PlanArtifact::new(id, research_id, goal, approach, &clock::now());
        self.save(&plan)?;
        Ok(plan)
    }

    pub fn create_implementation(&self, plan_id: &str) -> Result<ImplementationArtifact> {
        let id = self.new_id(ArtifactKind::Implementation, "impl");
        let implementation = ImplementationArtifact::new(id, plan_id, &clock::now());
        self.save(&implementation)?;
        Ok(implementation)
    }

    /// Persist as-is. Overwrites any existing record with the same id.
    pub fn save<A: Artifact>(&self, artifact: &A) -> Result<()> {
        let path = self.record_path(A::KIND, artifact.id());
        debug!(kind = %A::KIND, id = artifact.id(), path = %path.display(), "saving artifact");
        write_json(&path, artifact).with_context(|| format!("save {} {}", A::KIND, artifact.id()))
    }

    /// Stamp `updated_at` with the current time, then persist.
    pub fn update<A: Artifact>(&self, artifact: &mut A) -> Result<()> {
        artifact.touch(&clock::now());
        self.save(artifact)
    }

    /// Load a record by id. Missing or malformed records yield `None`.
    pub fn load<A: Artifact>(&self, id: &str) -> Option<A> {
        let path = self.record_path(A::KIND, id);
        if !path.is_file() {
            return None;
        }
        match read_record::<A>(&path) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(
                    kind = %A::KIND,
                    id,
                    error = %format!("{err:#}"),
                    "malformed artifact record"
                );
                None
            }
        }
    }

    /// Sorted ids of every record of `kind`.
    pub fn list(&self, kind: ArtifactKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records(kind)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Newest record by modification time; ties go to the greatest id.
    pub fn latest<A: Artifact>(&self) -> Option<A> {
        let (id, _) = self
            .records(A::KIND)
            .into_iter()
            .max_by(|(a_id, a_time), (b_id, b_time)| a_time.cmp(b_time).then(a_id.cmp(b_id)))?;
        self.load(&id)
    }

    pub fn latest_research(&self) -> Option<ResearchArtifact> {
        self.latest()
    }

    pub fn latest_plan(&self) -> Option<PlanArtifact> {
        self.latest()
    }

    pub fn latest_implementation(&self) -> Option<ImplementationArtifact> {
        self.latest()
    }

    fn records(&self, kind: ArtifactKind) -> Vec<(String, SystemTime)> {
        let dir = self.paths.artifact_dir(kind);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    return None;
                }
                let id = path.file_stem()?.to_str()?.to_string();
                let modified = entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((id, modified))
            })
            .collect()
    }
}

impl ArtifactSource for ArtifactStore {
    fn snapshot(&self) -> Result<ArtifactSnapshot> {
        if !self.paths.artifacts_dir.is_dir() {
            bail!(
                "artifact directory {} is missing",
                self.paths.artifacts_dir.display()
            );
        }
        Ok(ArtifactSnapshot {
            research: self.latest(),
            plan: self.latest(),
            implementation: self.latest(),
        })
    }
}

fn read_record<A: Artifact>(path: &std::path::Path) -> Result<A> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let raw: Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let migrated = schema::migrate(A::KIND, raw)?;
    serde_json::from_value(migrated).with_context(|| format!("deserialize {}", path.display()))
}

/// Lower-cased task with separators collapsed to `-`, at most 30 chars.
fn task_slug(task: &str) -> String {
    let mut slug = String::new();
    for ch in task.trim().to_lowercase().chars() {
        if slug.chars().count() == SLUG_MAX_CHARS {
            break;
        }
        if ch.is_alphanumeric() || ch == '_' {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "research".to_string()
    } else {
        slug.to_string()
    }
}
