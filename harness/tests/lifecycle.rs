//! End-to-end workflow: research, planning, and implementation driven through
//! the hook handlers against a real `.harness/` directory.

use harness::compact::current_phase;
use harness::core::artifact::{ImplementationArtifact, PlanArtifact};
use harness::core::gate::{GateAction, GateName, check};
use harness::core::phase::Phase;
use harness::core::types::Event;
use harness::env::HookEnv;
use harness::post_tool::handle_post_tool;
use harness::pre_tool::handle_pre_tool;
use harness::subagent::{SubagentEvent, handle_subagent_stop};
use harness::test_support::{bash_event, event, initialized_project, plan_step};

const RESEARCH_REPORT: &str = "\
Confidence: 80%

Key discoveries:
- Rate limits are enforced per API key in middleware/limits.rs
- Limits are read from config at startup only

Relevant files:
- src/middleware/limits.rs
";

fn gate(env: &HookEnv, name: GateName) -> GateAction {
    check(name, env.artifacts(), &env.config.gate_settings()).action
}

fn edit(path: &str) -> Event {
    event("s1", "Edit", &[("file_path", path), ("old_string", "a"), ("new_string", "b")], "")
}

/// Walks one task through every phase and checks gates along the way.
#[test]
fn task_moves_from_research_to_verified_implementation() {
    let (temp, _paths) = initialized_project();
    let env = HookEnv::open(temp.path()).expect("open").expect("initialized");
    assert_eq!(current_phase(&env).phase, Phase::NewSession);

    let early_edit = handle_pre_tool(&env, &edit("src/middleware/limits.rs")).expect("pre");
    assert!(!early_edit.is_denied());
    assert!(early_edit
        .system_message
        .expect("warning")
        .starts_with("[GATE WARNING]"));

    let research = SubagentEvent {
        subagent_type: "Explore".into(),
        description: "Investigate rate limiting".into(),
        output: RESEARCH_REPORT.into(),
    };
    handle_subagent_stop(&env, &research).expect("research");
    assert_eq!(current_phase(&env).phase, Phase::PlanningReady);
    assert_eq!(gate(&env, GateName::ResearchToPlanning), GateAction::Allow);

    let store = env.store().expect("store");
    let research_id = store.latest_research().expect("research").id;
    let mut plan = store
        .create_plan(&research_id, "Reload rate limits on change", "watch config")
        .expect("plan");
    plan.steps = vec![plan_step("1", true), plan_step("2", true)];
    store.save(&plan).expect("save plan");
    assert_eq!(current_phase(&env).phase, Phase::Planning);
    assert_eq!(gate(&env, GateName::PlanningToImplementation), GateAction::Warn);

    let validation = SubagentEvent {
        subagent_type: "plan-validator".into(),
        output: "Overall score: 9/10\nRecommendation: PROCEED\n".into(),
        ..SubagentEvent::default()
    };
    handle_subagent_stop(&env, &validation).expect("validation");
    let plan: PlanArtifact = store.latest_plan().expect("plan");
    assert!(plan.is_actionable());
    assert_eq!(current_phase(&env).phase, Phase::ImplementationReady);
    assert_eq!(gate(&env, GateName::PlanningToImplementation), GateAction::Allow);

    let ready_edit = handle_pre_tool(&env, &edit("src/middleware/limits.rs")).expect("pre");
    assert!(ready_edit.system_message.is_none());

    let implementation = store.create_implementation(&plan.id).expect("implementation");
    assert_eq!(current_phase(&env).phase, Phase::Implementation);
    assert_eq!(gate(&env, GateName::ImplementationToCommit), GateAction::Warn);

    handle_post_tool(&env, &edit("src/middleware/limits.rs")).expect("post edit");
    let failing = bash_event("s1", "cargo test", "test result: FAILED. 3 passed; 1 failed");
    let response = handle_post_tool(&env, &failing).expect("post tests");
    assert!(response
        .system_message
        .expect("message")
        .contains("Tests failed."));
    assert_eq!(gate(&env, GateName::ImplementationToCommit), GateAction::Warn);

    let passing = bash_event("s1", "cargo test", "test result: ok. 4 passed; 0 failed");
    handle_post_tool(&env, &passing).expect("post tests");
    assert_eq!(gate(&env, GateName::ImplementationToCommit), GateAction::Allow);

    let updated: ImplementationArtifact = store.load(&implementation.id).expect("reload");
    assert_eq!(updated.files_modified, vec!["src/middleware/limits.rs"]);
    assert!(updated.tests_passed);
}

#[test]
fn uninitialized_project_has_no_environment() {
    let temp = tempfile::tempdir().expect("tempdir");
    assert!(HookEnv::open(temp.path()).expect("open").is_none());
}
