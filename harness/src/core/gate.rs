//! Verification gates between workflow phases.
//!
//! Every gate is a pure function of an [`ArtifactSnapshot`] and
//! [`GateSettings`]. Callers that read the snapshot from storage go through
//! [`ArtifactSource`]; when that source is unavailable every gate allows.

use std::fmt;
use std::path::{Component, Path};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::artifact::{Recommendation, ResearchCriteria};
use crate::core::phase::{ArtifactSnapshot, Phase, derive_phase};
use crate::core::types::{Strictness, percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    Allow,
    Warn,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    ResearchToPlanning,
    PlanningToImplementation,
    ImplementationToCommit,
    AllowEdit,
    AllowWrite,
}

impl GateName {
    pub fn as_str(self) -> &'static str {
        match self {
            GateName::ResearchToPlanning => "research_to_planning",
            GateName::PlanningToImplementation => "planning_to_implementation",
            GateName::ImplementationToCommit => "implementation_to_commit",
            GateName::AllowEdit => "allow_edit",
            GateName::AllowWrite => "allow_write",
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one gate check. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    pub action: GateAction,
    pub gate: GateName,
    pub reason: String,
    pub suggestions: Vec<String>,
    pub details: Map<String, Value>,
}

impl GateResult {
    fn new(action: GateAction, gate: GateName, reason: impl Into<String>) -> Self {
        Self {
            action,
            gate,
            reason: reason.into(),
            suggestions: Vec::new(),
            details: Map::new(),
        }
    }

    fn allow(gate: GateName, reason: impl Into<String>) -> Self {
        Self::new(GateAction::Allow, gate, reason)
    }

    fn warn(gate: GateName, reason: impl Into<String>) -> Self {
        Self::new(GateAction::Warn, gate, reason)
    }

    fn block(gate: GateName, reason: impl Into<String>) -> Self {
        Self::new(GateAction::Block, gate, reason)
    }

    fn suggest<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    fn with_details(mut self, details: Value) -> Self {
        if let Value::Object(map) = details {
            self.details = map;
        }
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.action == GateAction::Block
    }

    /// Human-readable form; empty for allow verdicts.
    pub fn message(&self) -> String {
        let label = match self.action {
            GateAction::Allow => return String::new(),
            GateAction::Warn => "[GATE WARNING]",
            GateAction::Block => "[GATE BLOCKED]",
        };
        let mut lines = vec![format!("{label} {}", self.reason)];
        if !self.suggestions.is_empty() {
            lines.push("Suggestions:".to_string());
            lines.extend(self.suggestions.iter().map(|s| format!("  - {s}")));
        }
        lines.join("\n")
    }
}

/// Gate configuration resolved from the harness config.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    pub enabled: bool,
    /// When false, edit/write gates never consult the phase.
    pub strict_gates: bool,
    pub strictness: Strictness,
    pub research: ResearchCriteria,
    pub min_specific_ratio: f64,
    /// Paths the harness itself writes; edits to them are always allowed.
    pub bookkeeping_paths: Vec<String>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_gates: true,
            strictness: Strictness::Standard,
            research: ResearchCriteria::default(),
            min_specific_ratio: 0.8,
            bookkeeping_paths: default_bookkeeping_paths(),
        }
    }
}

pub fn default_bookkeeping_paths() -> Vec<String> {
    vec![
        ".harness/".to_string(),
        "harness-progress.txt".to_string(),
        "harness-features.json".to_string(),
    ]
}

/// Read access to the latest artifacts.
///
/// Implementations report failure instead of guessing; gates treat an error as
/// "unavailable" and allow.
pub trait ArtifactSource {
    fn snapshot(&self) -> Result<ArtifactSnapshot>;
}

/// Source used when no artifact store could be opened.
#[derive(Debug, Clone)]
pub struct UnavailableArtifacts {
    pub reason: String,
}

impl UnavailableArtifacts {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableArtifacts {
    fn default() -> Self {
        Self::new("no artifact store configured")
    }
}

impl ArtifactSource for UnavailableArtifacts {
    fn snapshot(&self) -> Result<ArtifactSnapshot> {
        Err(anyhow!("{}", self.reason))
    }
}

impl ArtifactSource for ArtifactSnapshot {
    fn snapshot(&self) -> Result<ArtifactSnapshot> {
        Ok(self.clone())
    }
}

fn unavailable(gate: GateName, err: &anyhow::Error) -> GateResult {
    GateResult::allow(gate, format!("Artifact store unavailable: {err:#}"))
}

/// Run a phase-transition gate against `source`, failing open.
pub fn check(gate: GateName, source: &dyn ArtifactSource, settings: &GateSettings) -> GateResult {
    let snapshot = match source.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => return unavailable(gate, &err),
    };
    match gate {
        GateName::ResearchToPlanning => research_gate(&snapshot, settings),
        GateName::PlanningToImplementation => planning_gate(&snapshot, settings),
        GateName::ImplementationToCommit => commit_gate(&snapshot, settings),
        GateName::AllowEdit | GateName::AllowWrite => edit_short_circuit(gate, settings, "")
            .unwrap_or_else(|| phase_edit_gate(gate, &snapshot, settings, "")),
    }
}

/// Research is advisory: this gate warns but never blocks.
pub fn research_gate(snapshot: &ArtifactSnapshot, settings: &GateSettings) -> GateResult {
    let gate = GateName::ResearchToPlanning;
    let Some(research) = &snapshot.research else {
        return GateResult::warn(gate, "No research artifact found. Starting from scratch.")
            .suggest([
                "Consider creating a research artifact to track findings",
                "Use a research subagent for systematic exploration",
            ])
            .with_details(json!({ "has_research": false }));
    };

    let criteria = &settings.research;
    let status = research.completion_status(criteria);
    let details = json!(status);

    if research.confidence_score < criteria.confidence_threshold {
        return GateResult::warn(
            gate,
            format!(
                "Research confidence ({}) below threshold ({})",
                percent(research.confidence_score),
                percent(criteria.confidence_threshold)
            ),
        )
        .suggest([
            "Continue exploration to build confidence",
            "Address unknown areas in the codebase",
        ])
        .with_details(details);
    }

    let blocking: Vec<&str> = research
        .blocking_questions()
        .map(|q| q.question.as_str())
        .collect();
    if !blocking.is_empty() {
        let listed: Vec<&str> = blocking.iter().take(3).copied().collect();
        return GateResult::warn(
            gate,
            format!("{} blocking question(s) remain", blocking.len()),
        )
        .suggest([
            "Resolve blocking questions before planning".to_string(),
            format!("Questions: {}", listed.join(", ")),
        ])
        .with_details(details);
    }

    if research.discoveries.is_empty() {
        return GateResult::warn(gate, "No discoveries recorded in research")
            .suggest([
                "Document key findings from exploration",
                "Record relevant files and patterns discovered",
            ])
            .with_details(details);
    }

    GateResult::allow(gate, "Research complete. Ready for planning.").with_details(details)
}

pub fn planning_gate(snapshot: &ArtifactSnapshot, settings: &GateSettings) -> GateResult {
    let gate = GateName::PlanningToImplementation;
    let Some(plan) = &snapshot.plan else {
        return GateResult::warn(gate, "No plan artifact found.")
            .suggest([
                "Create an implementation plan before coding",
                "Define specific steps with verification criteria",
            ])
            .with_details(json!({ "has_plan": false }));
    };

    let details = json!(plan.actionability_status());
    let Some(recommendation) = plan.recommendation() else {
        return GateResult::warn(gate, "Plan has not been validated")
            .suggest([
                "Run plan validation before implementation",
                "Use a plan-validator subagent to review the plan",
            ])
            .with_details(details);
    };

    match recommendation {
        Recommendation::Block => {
            return GateResult::block(gate, "Plan validation BLOCKED. Plan needs major revision.")
                .suggest([
                    "Review validation feedback",
                    "Address critical issues before proceeding",
                ])
                .with_details(details);
        }
        Recommendation::Revise => {
            return GateResult::warn(gate, "Plan needs revision before implementation")
                .suggest([
                    "Address feedback from validation",
                    "Re-validate after making changes",
                ])
                .with_details(details);
        }
        Recommendation::Proceed => {}
    }

    if !plan.steps.is_empty() && plan.specific_ratio() < settings.min_specific_ratio {
        let vague = plan.steps.len() - plan.specific_steps();
        return GateResult::warn(gate, format!("{vague} step(s) are too vague to implement"))
            .suggest([
                "Make steps more specific and actionable",
                "Add file paths, function names, and exact changes",
            ])
            .with_details(details);
    }

    GateResult::allow(gate, "Plan validated. Ready for implementation.").with_details(details)
}

pub fn commit_gate(snapshot: &ArtifactSnapshot, settings: &GateSettings) -> GateResult {
    let gate = GateName::ImplementationToCommit;
    let Some(implementation) = &snapshot.implementation else {
        return GateResult::warn(gate, "No implementation artifact found.")
            .suggest(["Track implementation progress before committing"])
            .with_details(json!({ "has_implementation": false }));
    };

    let details = json!({
        "implementation_id": implementation.id,
        "tests_status": implementation.tests_status(),
        "files_modified": implementation.files_modified.len(),
        "steps_completed": implementation.steps_completed.len(),
    });

    if !implementation.tests_run {
        return GateResult::warn(gate, "Tests have not been run")
            .suggest(["Run the test suite before committing"])
            .with_details(details);
    }

    if !implementation.tests_passed {
        let reason = "Tests are failing. Fix failures before committing.";
        let result = if settings.strictness == Strictness::Strict {
            GateResult::block(gate, reason)
        } else {
            GateResult::warn(gate, reason)
        };
        return result
            .suggest(["Fix failing tests", "Re-run the test suite"])
            .with_details(details);
    }

    GateResult::allow(gate, "Implementation verified. Ready to commit.").with_details(details)
}

/// True when `path` is one of the harness's own bookkeeping files.
///
/// Entries ending in `/` match a directory component anywhere in the path;
/// other entries match the file name.
pub fn is_bookkeeping_path(path: &str, bookkeeping: &[String]) -> bool {
    let path = Path::new(path);
    bookkeeping.iter().any(|entry| match entry.strip_suffix('/') {
        Some(dir) => path
            .components()
            .any(|component| matches!(component, Component::Normal(name) if name == dir)),
        None => path.file_name().is_some_and(|name| name == entry.as_str()),
    })
}

/// Short-circuits shared by the edit and write gates.
fn edit_short_circuit(gate: GateName, settings: &GateSettings, path: &str) -> Option<GateResult> {
    if !settings.enabled {
        return Some(GateResult::allow(gate, "Gates disabled"));
    }
    if !settings.strict_gates {
        return Some(GateResult::allow(gate, "Strict gates disabled"));
    }
    if settings.strictness == Strictness::Relaxed {
        return Some(GateResult::allow(gate, "Relaxed mode"));
    }
    if is_bookkeeping_path(path, &settings.bookkeeping_paths) {
        return Some(
            GateResult::allow(gate, "Bookkeeping file edit")
                .with_details(json!({ "is_bookkeeping": true })),
        );
    }
    None
}

/// Edit/write gate over a source, failing open when artifacts are unavailable.
pub fn check_edit(
    gate: GateName,
    source: &dyn ArtifactSource,
    settings: &GateSettings,
    path: &str,
) -> GateResult {
    if let Some(result) = edit_short_circuit(gate, settings, path) {
        return result;
    }
    match source.snapshot() {
        Ok(snapshot) => phase_edit_gate(gate, &snapshot, settings, path),
        Err(err) => unavailable(gate, &err),
    }
}

pub fn allow_edit(snapshot: &ArtifactSnapshot, settings: &GateSettings, path: &str) -> GateResult {
    edit_short_circuit(GateName::AllowEdit, settings, path)
        .unwrap_or_else(|| phase_edit_gate(GateName::AllowEdit, snapshot, settings, path))
}

pub fn allow_write(snapshot: &ArtifactSnapshot, settings: &GateSettings, path: &str) -> GateResult {
    edit_short_circuit(GateName::AllowWrite, settings, path)
        .unwrap_or_else(|| phase_edit_gate(GateName::AllowWrite, snapshot, settings, path))
}

fn phase_edit_gate(
    gate: GateName,
    snapshot: &ArtifactSnapshot,
    settings: &GateSettings,
    path: &str,
) -> GateResult {
    let phase = derive_phase(snapshot, &settings.research).phase;
    let details = json!({ "phase": phase, "file": path });

    if !phase.precedes_implementation() {
        return GateResult::allow(gate, "Implementation phase. Edit allowed.").with_details(details);
    }

    let strict = settings.strictness == Strictness::Strict;
    let (reason, suggestions): (String, Vec<&str>) = match phase {
        Phase::NewSession | Phase::Research => {
            let qualifier = if phase == Phase::NewSession {
                " (new session)"
            } else {
                ""
            };
            let verb = if strict { "Editing blocked in" } else { "Editing in" };
            (
                format!(
                    "{verb} RESEARCH phase{qualifier}. Consider completing research first."
                ),
                vec![
                    "Finish codebase exploration first",
                    "Build research confidence to >= 70%",
                ],
            )
        }
        Phase::PlanningReady => (
            if strict {
                "Editing blocked in PLANNING_READY phase. Create and validate a plan first."
            } else {
                "Editing in PLANNING_READY phase. Consider creating a plan first."
            }
            .to_string(),
            vec!["Research is complete; write an implementation plan"],
        ),
        _ => (
            if strict {
                "Editing blocked in PLANNING phase. Validate plan before implementation."
            } else {
                "Editing in PLANNING phase. Consider validating plan first."
            }
            .to_string(),
            vec!["Validate plan before implementation"],
        ),
    };

    if strict {
        let mut suggestions = suggestions;
        suggestions.push("Set strictness = \"relaxed\" in .harness/config.toml to override");
        GateResult::block(gate, reason)
            .suggest(suggestions)
            .with_details(details)
    } else {
        GateResult::warn(gate, reason)
            .suggest(suggestions)
            .with_details(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::ImplementationArtifact;
    use crate::test_support::{plan_with, question, research_with};

    fn standard() -> GateSettings {
        GateSettings::default()
    }

    fn strict() -> GateSettings {
        GateSettings {
            strictness: Strictness::Strict,
            ..GateSettings::default()
        }
    }

    #[test]
    fn fresh_session_edit_warns_in_standard_mode() {
        let result = allow_edit(&ArtifactSnapshot::default(), &standard(), "src/app.py");
        assert_eq!(result.action, GateAction::Warn);
        assert!(result.reason.contains("RESEARCH phase"));
        assert!(result.reason.contains("Consider completing research first"));
        assert!(result.message().starts_with("[GATE WARNING] "));
    }

    #[test]
    fn strict_mode_blocks_premature_edits() {
        let snapshot = ArtifactSnapshot {
            research: Some(research_with(0.9, vec![], 2)),
            ..ArtifactSnapshot::default()
        };
        let result = allow_write(&snapshot, &strict(), "src/lib.rs");
        assert_eq!(result.action, GateAction::Block);
        assert_eq!(result.gate, GateName::AllowWrite);
        assert!(result.reason.contains("PLANNING_READY"));
        assert!(result.message().starts_with("[GATE BLOCKED] "));
    }

    #[test]
    fn implementation_phase_allows_edits() {
        let snapshot = ArtifactSnapshot {
            implementation: Some(ImplementationArtifact::new("i", "p", "t")),
            ..ArtifactSnapshot::default()
        };
        let result = allow_edit(&snapshot, &strict(), "src/lib.rs");
        assert_eq!(result.action, GateAction::Allow);
        assert_eq!(result.message(), "");
    }

    #[test]
    fn short_circuits_allow() {
        let empty = ArtifactSnapshot::default();
        let relaxed = GateSettings {
            strictness: Strictness::Relaxed,
            ..strict()
        };
        assert_eq!(allow_edit(&empty, &relaxed, "a.rs").reason, "Relaxed mode");

        let loose = GateSettings {
            strict_gates: false,
            ..strict()
        };
        assert_eq!(allow_edit(&empty, &loose, "a.rs").reason, "Strict gates disabled");

        let result = allow_edit(&empty, &strict(), "/work/proj/.harness/notes.md");
        assert_eq!(result.action, GateAction::Allow);
        let result = allow_edit(&empty, &strict(), "harness-progress.txt");
        assert_eq!(result.action, GateAction::Allow);
        let result = allow_edit(&empty, &strict(), "src/.harnessx/notes.md");
        assert_eq!(result.action, GateAction::Block);
    }

    #[test]
    fn research_gate_reasons() {
        let mut snapshot = ArtifactSnapshot::default();
        assert_eq!(
            research_gate(&snapshot, &standard()).reason,
            "No research artifact found. Starting from scratch."
        );

        snapshot.research = Some(research_with(0.5, vec![], 3));
        let result = research_gate(&snapshot, &standard());
        assert_eq!(result.action, GateAction::Warn);
        assert_eq!(result.reason, "Research confidence (50%) below threshold (70%)");

        snapshot.research = Some(research_with(
            0.9,
            vec![question("Which db?", true), question("Which cache?", true)],
            3,
        ));
        let result = research_gate(&snapshot, &strict());
        assert_eq!(result.action, GateAction::Warn, "research never blocks");
        assert_eq!(result.reason, "2 blocking question(s) remain");
        assert_eq!(result.suggestions[1], "Questions: Which db?, Which cache?");

        snapshot.research = Some(research_with(0.9, vec![], 0));
        assert_eq!(
            research_gate(&snapshot, &standard()).reason,
            "No discoveries recorded in research"
        );

        snapshot.research = Some(research_with(0.8, vec![question("ttl?", false)], 3));
        let result = research_gate(&snapshot, &standard());
        assert_eq!(result.action, GateAction::Allow);
        assert_eq!(result.details["discoveries"], json!(3));
    }

    #[test]
    fn planning_gate_reasons() {
        let mut snapshot = ArtifactSnapshot::default();
        assert_eq!(planning_gate(&snapshot, &standard()).action, GateAction::Warn);

        snapshot.plan = Some(plan_with(None, &[true]));
        assert_eq!(
            planning_gate(&snapshot, &standard()).reason,
            "Plan has not been validated"
        );

        snapshot.plan = Some(plan_with(Some(Recommendation::Block), &[true]));
        let result = planning_gate(&snapshot, &standard());
        assert_eq!(result.action, GateAction::Block);
        assert!(result.reason.contains("major revision"));

        snapshot.plan = Some(plan_with(Some(Recommendation::Revise), &[true]));
        assert_eq!(planning_gate(&snapshot, &standard()).action, GateAction::Warn);

        snapshot.plan = Some(plan_with(
            Some(Recommendation::Proceed),
            &[true, true, true, false, false],
        ));
        assert_eq!(
            planning_gate(&snapshot, &standard()).reason,
            "2 step(s) are too vague to implement"
        );

        snapshot.plan = Some(plan_with(
            Some(Recommendation::Proceed),
            &[true, true, true, true, false],
        ));
        assert_eq!(planning_gate(&snapshot, &standard()).action, GateAction::Allow);
    }

    #[test]
    fn commit_gate_depends_on_tests() {
        let mut implementation = ImplementationArtifact::new("i", "p", "t");
        let mut snapshot = ArtifactSnapshot {
            implementation: Some(implementation.clone()),
            ..ArtifactSnapshot::default()
        };
        assert_eq!(commit_gate(&snapshot, &strict()).reason, "Tests have not been run");

        implementation.record_test_run(false);
        snapshot.implementation = Some(implementation.clone());
        assert_eq!(commit_gate(&snapshot, &strict()).action, GateAction::Block);
        assert_eq!(commit_gate(&snapshot, &standard()).action, GateAction::Warn);

        implementation.record_test_run(true);
        snapshot.implementation = Some(implementation);
        assert_eq!(commit_gate(&snapshot, &strict()).action, GateAction::Allow);
    }

    #[test]
    fn unavailable_source_fails_open() {
        let source = UnavailableArtifacts::new("disk on fire");
        for gate in [
            GateName::ResearchToPlanning,
            GateName::PlanningToImplementation,
            GateName::ImplementationToCommit,
        ] {
            let result = check(gate, &source, &strict());
            assert_eq!(result.action, GateAction::Allow);
            assert_eq!(result.reason, "Artifact store unavailable: disk on fire");
        }
        let result = check_edit(GateName::AllowEdit, &source, &strict(), "src/main.rs");
        assert_eq!(result.action, GateAction::Allow);
    }

    #[test]
    fn gates_are_deterministic_for_a_snapshot() {
        let snapshot = ArtifactSnapshot {
            research: Some(research_with(0.75, vec![], 2)),
            plan: Some(plan_with(Some(Recommendation::Revise), &[true, false])),
            implementation: None,
        };
        let first = check(GateName::PlanningToImplementation, &snapshot, &strict());
        let second = check(GateName::PlanningToImplementation, &snapshot, &strict());
        assert_eq!(first, second);
        let first = check_edit(GateName::AllowEdit, &snapshot, &strict(), "x.rs");
        let second = check_edit(GateName::AllowEdit, &snapshot, &strict(), "x.rs");
        assert_eq!(first, second);
    }
}
