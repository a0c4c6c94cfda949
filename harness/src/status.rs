//! Human-readable workflow state for `harness status` and session start.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::compact::current_phase;
use crate::core::context::summary;
use crate::core::phase::{ArtifactSnapshot, focus_directive};
use crate::core::types::{percent, prefix};
use crate::env::HookEnv;
use crate::response::HookResponse;

const STATUS_TEMPLATE: &str = include_str!("templates/status.txt");
const SHOWN_DISCOVERIES: usize = 5;

#[derive(Debug, Serialize)]
struct ResearchView {
    task: String,
    confidence: String,
    discoveries: usize,
    open_questions: usize,
    blocking: usize,
}

#[derive(Debug, Serialize)]
struct PlanView {
    goal: String,
    steps: usize,
    specific: usize,
    recommendation: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImplementationView {
    completed: usize,
    total: usize,
    percent: String,
    in_progress: usize,
    deviations: usize,
    tests: String,
}

#[derive(Debug, Serialize)]
struct PreservedView {
    discoveries: Vec<String>,
    focus: String,
}

fn research_view(snapshot: &ArtifactSnapshot) -> Option<ResearchView> {
    let research = snapshot.research.as_ref()?;
    Some(ResearchView {
        task: research.task.clone(),
        confidence: percent(research.confidence_score),
        discoveries: research.discoveries.len(),
        open_questions: research.open_questions.len(),
        blocking: research.blocking_questions().count(),
    })
}

fn plan_view(snapshot: &ArtifactSnapshot) -> Option<PlanView> {
    let plan = snapshot.plan.as_ref()?;
    Some(PlanView {
        goal: prefix(&plan.goal, 60).to_string(),
        steps: plan.steps.len(),
        specific: plan.specific_steps(),
        recommendation: plan.recommendation().map(|r| r.as_str().to_uppercase()),
    })
}

fn implementation_view(snapshot: &ArtifactSnapshot) -> Option<ImplementationView> {
    let implementation = snapshot.implementation.as_ref()?;
    let (total, progress_percent) = match &snapshot.plan {
        Some(plan) if plan.id == implementation.plan_artifact_id => {
            let progress = implementation.progress(plan);
            (progress.total_steps, progress.progress_percent / 100.0)
        }
        _ => (0, 0.0),
    };
    let tests = serde_json::to_value(implementation.tests_status())
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    Some(ImplementationView {
        completed: implementation.steps_completed.len(),
        total,
        percent: percent(progress_percent),
        in_progress: implementation.steps_in_progress.len(),
        deviations: implementation.plan_deviations.len(),
        tests,
    })
}

/// Render phase, artifact progress, and context usage.
///
/// `with_preserved` adds the snapshot left by the last compaction.
pub fn workflow_status(env: &HookEnv, with_preserved: bool) -> Result<String> {
    let info = current_phase(env);
    let snapshot = env.artifacts().snapshot().unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "artifacts unavailable for status");
        ArtifactSnapshot::default()
    });
    let preserved = if with_preserved {
        env.preserved_store().load().map(|preserved| PreservedView {
            discoveries: preserved
                .essential_discoveries
                .iter()
                .take(SHOWN_DISCOVERIES)
                .map(|d| d.summary.clone())
                .collect(),
            focus: preserved.focus_directive,
        })
    } else {
        None
    };
    let settings = env.config.context_settings();
    let context_text = env
        .context_store()
        .load_any()
        .map(|state| summary(&state, &settings));

    let mut jinja = Environment::new();
    jinja.set_trim_blocks(true);
    jinja.set_lstrip_blocks(true);
    jinja.add_template("status", STATUS_TEMPLATE)?;
    let rendered = jinja.get_template("status")?.render(context! {
        phase => info.phase.as_str(),
        focus => focus_directive(&info),
        preserved => preserved,
        research => research_view(&snapshot),
        plan => plan_view(&snapshot),
        implementation => implementation_view(&snapshot),
        context => context_text,
    })?;
    Ok(rendered.trim_end().to_string())
}

/// Payload of the session-start event; only its presence matters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionStartEvent {
    #[serde(default)]
    pub session_id: String,
}

#[instrument(skip_all, fields(session = %event.session_id))]
pub fn handle_session_start(env: &HookEnv, event: &SessionStartEvent) -> Result<HookResponse> {
    Ok(HookResponse::from_lines(vec![workflow_status(env, true)?]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::{CompactEvent, handle_pre_compact};
    use crate::core::artifact::Recommendation;
    use crate::io::config::HarnessConfig;
    use crate::post_tool::handle_post_tool;
    use crate::test_support::{initialized_project, plan_step, question, read_event, validation};

    fn env() -> (tempfile::TempDir, HookEnv) {
        let (temp, paths) = initialized_project();
        (temp, HookEnv::with_config(paths, HarnessConfig::default()))
    }

    #[test]
    fn empty_project_reports_new_session() {
        let (_temp, env) = env();
        let text = workflow_status(&env, false).expect("status");
        let expected = [
            "--- WORKFLOW STATE ---",
            "Phase: NEW_SESSION",
            "Focus: Review context and determine next steps.",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn artifacts_are_summarized() {
        let (_temp, env) = env();
        let store = env.store().expect("store");
        let mut research = store.create_research("Add caching").expect("research");
        research.confidence_score = 0.6;
        research.open_questions.push(question("Which eviction policy?", true));
        store.save(&research).expect("save");

        let mut plan = store.create_plan(&research.id, "Cache sessions", "lru").expect("plan");
        plan.steps = vec![plan_step("1", true), plan_step("2", false)];
        plan.validation_result = Some(validation(Recommendation::Revise));
        store.save(&plan).expect("save");

        let mut implementation = store.create_implementation(&plan.id).expect("impl");
        implementation.complete_step("1");
        implementation.start_step("2");
        store.save(&implementation).expect("save");

        let text = workflow_status(&env, false).expect("status");
        assert!(text.contains("Phase: IMPLEMENTATION\n"));
        assert!(text.contains("Active Research: Add caching\n  Confidence: 60%\n"));
        assert!(text.contains("  Open Questions: 1 (1 blocking)\n"));
        assert!(text.contains("Active Plan: Cache sessions\n  Steps: 2 (1 specific)\n"));
        assert!(text.contains("  Validation: REVISE\n"));
        assert!(text.contains("  Completed Steps: 1 of 2 (50%)\n  In Progress: 1\n"));
        assert!(text.ends_with("  Tests: not_run"));
    }

    #[test]
    fn session_start_includes_preserved_context() {
        let (_temp, env) = env();
        handle_post_tool(&env, &read_event("s0", "README.md", "hello world")).expect("read");
        let compact = CompactEvent {
            session_id: "s0".to_string(),
        };
        handle_pre_compact(&env, &compact).expect("compact");

        let response =
            handle_session_start(&env, &SessionStartEvent::default()).expect("session start");
        let message = response.system_message.expect("message");
        assert!(message.contains("Prior Session Context:\nFocus: Review context"));
        assert!(message.contains("Context Utilization: 0% (low)"));
    }

    /// Essential reads survive compaction and are listed at the next session start.
    #[test]
    fn session_start_lists_preserved_discoveries() {
        let (_temp, env) = env();
        let read = read_event("s0", "src/config.py", "DEBUG = True");
        handle_post_tool(&env, &read).expect("read");
        let compact = CompactEvent {
            session_id: "s0".to_string(),
        };
        handle_pre_compact(&env, &compact).expect("compact");

        let text = workflow_status(&env, true).expect("status");
        let expected = [
            "Prior Session Context:",
            "  - Read important file: config.py",
            "Focus: Review context and determine next steps.",
        ]
        .join("\n");
        assert!(text.contains(&expected), "got:\n{text}");
        assert!(!text.contains("  - \n"));
    }
}
