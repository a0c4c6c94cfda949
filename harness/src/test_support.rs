//! Test-only builders for events, artifacts, and initialized projects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::artifact::{
    Discovery, OpenQuestion, PlanArtifact, PlanStep, Rating, Recommendation, ResearchArtifact,
    ValidationResult,
};
use crate::core::types::Event;
use crate::io::init::{HarnessPaths, InitOptions, init_harness};

pub const FIXED_NOW: &str = "2026-01-15T09:30:00Z";

/// Build a string-valued parameter map.
pub fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::from(*value)))
        .collect()
}

pub fn event(session: &str, kind: &str, pairs: &[(&str, &str)], result: &str) -> Event {
    Event::new(session, kind, params(pairs), result)
}

pub fn read_event(session: &str, path: &str, body: &str) -> Event {
    event(session, "Read", &[("file_path", path)], body)
}

pub fn bash_event(session: &str, command: &str, output: &str) -> Event {
    event(session, "Bash", &[("command", command)], output)
}

pub fn question(text: &str, blocking: bool) -> OpenQuestion {
    OpenQuestion {
        question: text.to_string(),
        priority: if blocking { Rating::High } else { Rating::Low },
        blocking,
    }
}

/// Research artifact with `discoveries` generated discoveries.
pub fn research_with(
    confidence: f64,
    questions: Vec<OpenQuestion>,
    discoveries: usize,
) -> ResearchArtifact {
    let mut research = ResearchArtifact::new("20260115-093000-fixture", "fixture task", FIXED_NOW);
    research.confidence_score = confidence;
    research.open_questions = questions;
    research.discoveries = (0..discoveries)
        .map(|idx| Discovery {
            description: format!("discovery {idx}"),
            confidence,
            source_locations: vec![format!("src/module_{idx}.rs")],
            category: "architecture".to_string(),
        })
        .collect();
    research
}

pub fn plan_step(id: &str, is_specific: bool) -> PlanStep {
    PlanStep {
        id: id.to_string(),
        description: format!("step {id}"),
        files_affected: vec![format!("src/step_{id}.rs")],
        dependencies: Vec::new(),
        verification: "cargo test".to_string(),
        is_specific,
    }
}

pub fn validation(recommendation: Recommendation) -> ValidationResult {
    ValidationResult {
        recommendation,
        completeness_score: 8.0,
        coverage_analysis: BTreeMap::new(),
        missing_steps: Vec::new(),
        risks_identified: Vec::new(),
    }
}

/// Plan with one step per entry of `specific`.
pub fn plan_with(recommendation: Option<Recommendation>, specific: &[bool]) -> PlanArtifact {
    let mut plan = PlanArtifact::new(
        "20260115-093000-plan",
        "20260115-093000-fixture",
        "Add session refresh endpoint",
        "Extend the auth router",
        FIXED_NOW,
    );
    plan.steps = specific
        .iter()
        .enumerate()
        .map(|(idx, is_specific)| plan_step(&(idx + 1).to_string(), *is_specific))
        .collect();
    plan.validation_result = recommendation.map(validation);
    plan
}

/// Temporary project directory with `.harness/` initialized.
pub fn initialized_project() -> (tempfile::TempDir, HarnessPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = init_harness(temp.path(), &InitOptions { force: false }).expect("init");
    (temp, paths)
}
