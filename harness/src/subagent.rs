//! Subagent results: fold research findings and plan validations into the
//! latest artifacts.

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::report::{
    SubagentRole, classify_subagent, extract_research, extract_validation, merge_research,
    research_summary, validation_summary,
};
use crate::env::HookEnv;
use crate::response::HookResponse;

/// Payload of the subagent-stop event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubagentEvent {
    #[serde(default)]
    pub subagent_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub output: String,
}

#[instrument(skip_all, fields(subagent_type = %event.subagent_type))]
pub fn handle_subagent_stop(env: &HookEnv, event: &SubagentEvent) -> Result<HookResponse> {
    if !env.config.gates.enabled {
        return Ok(HookResponse::empty());
    }
    match classify_subagent(&event.subagent_type, &event.description) {
        SubagentRole::Research => research_finished(env, event),
        SubagentRole::PlanValidator => validation_finished(env, event),
        SubagentRole::Other => Ok(HookResponse::empty()),
    }
}

fn research_finished(env: &HookEnv, event: &SubagentEvent) -> Result<HookResponse> {
    let findings = extract_research(&event.output);
    if let Some(store) = env.store() {
        let mut research = match store.latest_research() {
            Some(research) => research,
            None => store.create_research(&event.description)?,
        };
        let counts = merge_research(&mut research, &findings);
        store.update(&mut research)?;
        info!(
            id = %research.id,
            confidence = research.confidence_score,
            discoveries = counts.discoveries,
            files = counts.files,
            questions = counts.questions,
            "research artifact updated"
        );
    }
    let threshold = env.config.gates.research_confidence_threshold;
    Ok(HookResponse::from_lines(vec![research_summary(
        &findings, threshold,
    )]))
}

fn validation_finished(env: &HookEnv, event: &SubagentEvent) -> Result<HookResponse> {
    let findings = extract_validation(&event.output);
    if let (Some(store), Some(result)) = (env.store(), findings.to_result()) {
        match store.latest_plan() {
            Some(mut plan) => {
                plan.validation_result = Some(result);
                store.update(&mut plan)?;
                info!(
                    id = %plan.id,
                    recommendation = ?findings.recommendation,
                    "plan validation recorded"
                );
            }
            None => debug!("validation report without a plan artifact"),
        }
    }
    Ok(HookResponse::from_lines(vec![validation_summary(&findings)]))
}
