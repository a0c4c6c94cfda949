//! Post-action handling: context tracking, change classification, progress.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::classifier::{
    TestOutcome, classify_change, detect_test_outcome, is_test_command, should_auto_log,
};
use crate::core::context::record;
use crate::core::gate::is_bookkeeping_path;
use crate::core::types::{ActionKind, Event, Strictness, percent};
use crate::env::HookEnv;
use crate::io::clock;
use crate::io::progress::auto_log_entry;
use crate::response::{HookResponse, MESSAGE_PREFIX};

#[instrument(skip_all, fields(kind = %event.kind, session = %event.session_id))]
pub fn handle_post_tool(env: &HookEnv, event: &Event) -> Result<HookResponse> {
    let now = clock::now();
    let mut lines = Vec::new();

    if env.config.context.tracking {
        track_context(env, event, &now, &mut lines)?;
    }
    if env.config.strictness == Strictness::Relaxed {
        return Ok(HookResponse::from_lines(lines));
    }
    if !matches!(
        event.kind,
        ActionKind::Write | ActionKind::Edit | ActionKind::Bash
    ) {
        return Ok(HookResponse::from_lines(lines));
    }

    track_change(env, event, &now, &mut lines)?;
    let outcome = test_outcome(event);
    match outcome {
        Some(TestOutcome::Passed) => lines.push(format!("{MESSAGE_PREFIX} Tests passed.")),
        Some(TestOutcome::Failed) => lines.push(format!(
            "{MESSAGE_PREFIX} Tests failed. Review failures before continuing."
        )),
        None => {}
    }
    update_implementation(env, event, outcome)?;

    Ok(HookResponse::from_lines(lines))
}

fn track_context(env: &HookEnv, event: &Event, now: &str, lines: &mut Vec<String>) -> Result<()> {
    let settings = env.config.context_settings();
    let store = env.context_store();
    let mut state = store.load(&event.session_id, now);
    let redundancies_before = state.redundant_discoveries.len();

    let warning = record(&mut state, event, &settings, now);
    store.save(&state)?;

    let high = state.utilization >= settings.high_water;
    if let Some(warning) = warning {
        lines.push(format!("{MESSAGE_PREFIX} {warning}"));
    }
    if high && state.entries.len() >= env.config.context.compaction_entry_threshold {
        lines.push(format!(
            "{MESSAGE_PREFIX} Context utilization at {}. Consider compacting or using subagents for research.",
            percent(state.utilization)
        ));
    }
    // The warning already names the redundancy unless utilization took priority.
    if high && state.redundant_discoveries.len() > redundancies_before {
        if let Some(latest) = state.latest_redundancy() {
            lines.push(format!(
                "{MESSAGE_PREFIX} Potential redundant exploration: {latest}"
            ));
        }
    }
    Ok(())
}

fn track_change(env: &HookEnv, event: &Event, now: &str, lines: &mut Vec<String>) -> Result<()> {
    let (level, reason) = classify_change(&event.kind, &event.parameters);
    debug!(level = %level, reason = %reason, "change classified");

    if env.config.progress.auto_log && should_auto_log(level) {
        let entry = auto_log_entry(&event.kind, &event.parameters, &reason);
        if let Err(err) = env.progress().append(&entry) {
            warn!(error = %format!("{err:#}"), "progress log append failed");
        }
    }

    let sessions = env.session_store();
    let mut ledger = sessions.load(&event.session_id);
    ledger.observe(level, &reason, now);
    if env.config.progress.checkpoint_suggestions {
        if let Some(due) =
            ledger.checkpoint_due(level, &reason, env.config.progress.checkpoint_score, now)
        {
            lines.push(format!("{MESSAGE_PREFIX} Consider creating a checkpoint: {due}"));
            lines.push("Commit your work to save progress.".to_string());
        }
    }
    sessions.save(&ledger)
}

fn test_outcome(event: &Event) -> Option<TestOutcome> {
    if event.kind != ActionKind::Bash || !is_test_command(event.param("command")) {
        return None;
    }
    detect_test_outcome(&event.result_text())
}

/// Keep the active implementation artifact current with observed changes.
fn update_implementation(
    env: &HookEnv,
    event: &Event,
    outcome: Option<TestOutcome>,
) -> Result<()> {
    let Some(store) = env.store() else {
        return Ok(());
    };
    let Some(mut implementation) = store.latest_implementation() else {
        return Ok(());
    };

    let mut changed = false;
    if matches!(event.kind, ActionKind::Write | ActionKind::Edit) {
        let path = event.param("file_path");
        if !is_bookkeeping_path(path, &env.config.gates.bookkeeping_paths) {
            changed |= implementation.record_file_modified(path);
        }
    }
    if let Some(outcome) = outcome {
        implementation.record_test_run(outcome == TestOutcome::Passed);
        changed = true;
    }
    if changed {
        debug!(id = %implementation.id, "updating implementation artifact");
        store.update(&mut implementation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::config::HarnessConfig;
    use crate::io::progress::NullProgress;
    use crate::test_support::{bash_event, event, initialized_project, read_event};

    fn env() -> (tempfile::TempDir, HookEnv) {
        let (temp, paths) = initialized_project();
        (temp, HookEnv::with_config(paths, HarnessConfig::default()))
    }

    #[test]
    fn reads_are_tracked_without_messages() {
        let (_temp, env) = env();
        let response =
            handle_post_tool(&env, &read_event("s1", "src/lib.rs", "fn main() {}")).expect("post");
        assert_eq!(response, HookResponse::empty());
        let state = env.context_store().load("s1", "now");
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn identical_content_is_reported_as_redundant() {
        let (_temp, env) = env();
        handle_post_tool(&env, &read_event("s1", "a.rs", "same body")).expect("first");
        let response =
            handle_post_tool(&env, &read_event("s1", "b.rs", "same body")).expect("second");
        let message = response.system_message.expect("message");
        assert!(message.starts_with("[Harness] Redundant discovery: Same content as Read:a.rs"));
    }

    #[test]
    fn significant_write_is_auto_logged() {
        let (_temp, env) = env();
        let content = "def handler(x):\n    return x\n";
        let write = event(
            "s1",
            "Write",
            &[("file_path", "src/handler.py"), ("content", content)],
            "",
        );
        handle_post_tool(&env, &write).expect("post");
        let log = fs::read_to_string(&env.paths.progress_path).expect("progress log");
        assert!(log.contains("AUTO: Created handler.py (New code file (2 code lines))"));
        assert_eq!(env.session_store().load("s1").changes_since_checkpoint, 1);
    }

    #[test]
    fn commit_suggests_checkpoint_and_failed_tests_are_reported() {
        let (_temp, env) = env();
        let env = env.with_progress(Box::new(NullProgress));
        let response =
            handle_post_tool(&env, &bash_event("s1", "git commit -m wip", "1 file changed"))
                .expect("commit");
        let message = response.system_message.expect("message");
        assert!(message.contains("Consider creating a checkpoint: Major change: Git commit"));

        let response = handle_post_tool(
            &env,
            &bash_event("s1", "pytest -v", "=== 1 failed, 3 passed ==="),
        )
        .expect("tests");
        let message = response.system_message.expect("message");
        assert!(message.contains("[Harness] Tests failed. Review failures before continuing."));
        assert!(!env.paths.progress_path.exists());
    }

    #[test]
    fn implementation_artifact_tracks_files_and_tests() {
        let (_temp, env) = env();
        let store = env.store().expect("store");
        let implementation = store.create_implementation("plan-1").expect("impl");

        let edit = event(
            "s1",
            "Edit",
            &[("file_path", "src/auth.rs"), ("old_string", "a"), ("new_string", "b")],
            "",
        );
        handle_post_tool(&env, &edit).expect("edit");
        let bookkeeping = event(
            "s1",
            "Write",
            &[("file_path", "harness-progress.txt"), ("content", "x")],
            "",
        );
        handle_post_tool(&env, &bookkeeping).expect("write");
        handle_post_tool(
            &env,
            &bash_event("s1", "cargo test", "test result: ok. 4 passed; 0 failed"),
        )
        .expect("tests");

        let updated = store
            .load::<crate::core::artifact::ImplementationArtifact>(&implementation.id)
            .expect("reload");
        assert_eq!(updated.files_modified, vec!["src/auth.rs"]);
        assert!(updated.tests_run && updated.tests_passed);
    }

    #[test]
    fn relaxed_mode_only_tracks_context() {
        let (_temp, paths) = initialized_project();
        let config = HarnessConfig {
            strictness: Strictness::Relaxed,
            ..HarnessConfig::default()
        };
        let env = HookEnv::with_config(paths, config);
        let response =
            handle_post_tool(&env, &bash_event("s1", "git commit -m x", "")).expect("post");
        assert_eq!(response, HookResponse::empty());
        assert_eq!(env.session_store().load("s1").changes_since_checkpoint, 0);
        assert_eq!(env.context_store().load("s1", "now").entries.len(), 1);
    }
}
