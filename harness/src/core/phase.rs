//! Workflow phase derivation.
//!
//! The phase is never stored. It is recomputed from the latest artifact of each
//! kind every time it is needed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::artifact::{
    ImplementationArtifact, PlanArtifact, ResearchArtifact, ResearchCriteria,
};
use crate::core::types::{percent, prefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    NewSession,
    Research,
    PlanningReady,
    Planning,
    ImplementationReady,
    Implementation,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NewSession => "NEW_SESSION",
            Phase::Research => "RESEARCH",
            Phase::PlanningReady => "PLANNING_READY",
            Phase::Planning => "PLANNING",
            Phase::ImplementationReady => "IMPLEMENTATION_READY",
            Phase::Implementation => "IMPLEMENTATION",
        }
    }

    /// Phases in which code edits are premature.
    pub fn precedes_implementation(self) -> bool {
        !matches!(self, Phase::ImplementationReady | Phase::Implementation)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest artifact of each kind, as seen by one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSnapshot {
    pub research: Option<ResearchArtifact>,
    pub plan: Option<PlanArtifact>,
    pub implementation: Option<ImplementationArtifact>,
}

/// Derived phase plus the details summaries and snapshots report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub phase: Phase,
    pub details: Map<String, Value>,
}

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Implementation > Plan > Research > nothing.
pub fn derive_phase(snapshot: &ArtifactSnapshot, criteria: &ResearchCriteria) -> PhaseInfo {
    if let Some(implementation) = &snapshot.implementation {
        return PhaseInfo {
            phase: Phase::Implementation,
            details: details(json!({
                "implementation_id": implementation.id,
                "plan_id": implementation.plan_artifact_id,
                "steps_completed": implementation.steps_completed.len(),
                "steps_in_progress": implementation.steps_in_progress,
            })),
        };
    }
    if let Some(plan) = &snapshot.plan {
        let phase = if plan.is_actionable() {
            Phase::ImplementationReady
        } else {
            Phase::Planning
        };
        return PhaseInfo {
            phase,
            details: details(json!({
                "plan_id": plan.id,
                "goal": prefix(&plan.goal, 100),
                "total_steps": plan.steps.len(),
                "is_validated": plan.validation_result.is_some(),
            })),
        };
    }
    if let Some(research) = &snapshot.research {
        let phase = if research.is_complete_with(criteria) {
            Phase::PlanningReady
        } else {
            Phase::Research
        };
        return PhaseInfo {
            phase,
            details: details(json!({
                "research_id": research.id,
                "task": research.task,
                "confidence": research.confidence_score,
                "discoveries": research.discoveries.len(),
                "open_questions": research.open_questions.len(),
            })),
        };
    }
    PhaseInfo {
        phase: Phase::NewSession,
        details: Map::new(),
    }
}

/// Directive that tells the agent what to resume after a memory reset.
pub fn focus_directive(info: &PhaseInfo) -> String {
    let text = |key: &str, fallback: &str| {
        info.details
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    match info.phase {
        Phase::Implementation => {
            let in_progress: Vec<&str> = info
                .details
                .get("steps_in_progress")
                .and_then(Value::as_array)
                .map(|steps| steps.iter().filter_map(Value::as_str).take(3).collect())
                .unwrap_or_default();
            if in_progress.is_empty() {
                let completed = info
                    .details
                    .get("steps_completed")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                format!("Continue implementation. {completed} steps completed.")
            } else {
                format!(
                    "Continue implementation. In progress: {}",
                    in_progress.join(", ")
                )
            }
        }
        Phase::ImplementationReady => format!(
            "Plan validated. Begin implementation of: {}",
            prefix(&text("goal", "Unknown goal"), 60)
        ),
        Phase::Planning => format!(
            "Continue planning. Goal: {}",
            prefix(&text("goal", "Unknown"), 60)
        ),
        Phase::PlanningReady => {
            let confidence = info
                .details
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            format!(
                "Research complete (confidence: {}). Create implementation plan.",
                percent(confidence)
            )
        }
        Phase::Research => format!(
            "Continue research on: {}. Build confidence to >= 70%.",
            text("task", "Unknown")
        ),
        Phase::NewSession => "Review context and determine next steps.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::artifact::Recommendation;
    use crate::test_support::{plan_with, question, research_with};

    fn derive(snapshot: &ArtifactSnapshot) -> PhaseInfo {
        derive_phase(snapshot, &ResearchCriteria::default())
    }

    #[test]
    fn empty_store_is_new_session() {
        let info = derive(&ArtifactSnapshot::default());
        assert_eq!(info.phase, Phase::NewSession);
        assert_eq!(
            focus_directive(&info),
            "Review context and determine next steps."
        );
    }

    #[test]
    fn research_completeness_decides_planning_ready() {
        let mut snapshot = ArtifactSnapshot {
            research: Some(research_with(0.8, vec![question("cache ttl?", false)], 3)),
            ..ArtifactSnapshot::default()
        };
        let info = derive(&snapshot);
        assert_eq!(info.phase, Phase::PlanningReady);
        assert_eq!(
            focus_directive(&info),
            "Research complete (confidence: 80%). Create implementation plan."
        );

        snapshot.research = Some(research_with(0.5, vec![], 1));
        let info = derive(&snapshot);
        assert_eq!(info.phase, Phase::Research);
        assert!(focus_directive(&info).ends_with("Build confidence to >= 70%."));
    }

    #[test]
    fn plan_actionability_decides_implementation_ready() {
        let mut snapshot = ArtifactSnapshot {
            research: Some(research_with(0.9, vec![], 2)),
            plan: Some(plan_with(Some(Recommendation::Proceed), &[true, true])),
            implementation: None,
        };
        assert_eq!(derive(&snapshot).phase, Phase::ImplementationReady);

        snapshot.plan = Some(plan_with(Some(Recommendation::Revise), &[true]));
        let info = derive(&snapshot);
        assert_eq!(info.phase, Phase::Planning);
        assert!(focus_directive(&info).starts_with("Continue planning. Goal: "));
    }

    #[test]
    fn implementation_takes_precedence() {
        let mut implementation = ImplementationArtifact::new("i", "p", "t");
        implementation.steps_in_progress = vec!["2".into(), "3".into()];
        let snapshot = ArtifactSnapshot {
            research: None,
            plan: None,
            implementation: Some(implementation),
        };
        let info = derive(&snapshot);
        assert_eq!(info.phase, Phase::Implementation);
        assert_eq!(
            focus_directive(&info),
            "Continue implementation. In progress: 2, 3"
        );
    }

    #[test]
    fn phase_serializes_screaming_snake() {
        let value = serde_json::to_value(Phase::ImplementationReady).expect("ser");
        assert_eq!(value, json!("IMPLEMENTATION_READY"));
    }
}
