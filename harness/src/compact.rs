//! Memory-reset handling: snapshot what matters before the agent's context is
//! compacted.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Deserialize;
use serde_json::Map;
use tracing::{instrument, warn};

use crate::core::context::{extract_essential, summary};
use crate::core::phase::{Phase, PhaseInfo, derive_phase, focus_directive};
use crate::env::HookEnv;
use crate::io::clock;
use crate::io::preserved::PreservedContext;
use crate::response::{HookResponse, MESSAGE_PREFIX};

const PRESERVATION_TEMPLATE: &str = include_str!("templates/preservation.txt");
const SHOWN_DISCOVERIES: usize = 5;
const RULE_WIDTH: usize = 50;

/// Payload of the pre-compact event.
#[derive(Debug, Clone, Deserialize)]
pub struct CompactEvent {
    #[serde(default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default".to_string()
}

/// Phase of the current snapshot; `NEW_SESSION` when artifacts are unreadable.
pub fn current_phase(env: &HookEnv) -> PhaseInfo {
    match env.artifacts().snapshot() {
        Ok(snapshot) => derive_phase(&snapshot, &env.config.research_criteria()),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "artifacts unavailable; assuming new session");
            PhaseInfo {
                phase: Phase::NewSession,
                details: Map::new(),
            }
        }
    }
}

#[instrument(skip_all, fields(session = %event.session_id))]
pub fn handle_pre_compact(env: &HookEnv, event: &CompactEvent) -> Result<HookResponse> {
    if !env.config.context.preserve_on_compact {
        return Ok(HookResponse::empty());
    }
    let now = clock::now();
    let info = current_phase(env);
    let focus = focus_directive(&info);

    let (essential, context_summary) = if env.config.context.tracking {
        let state = env.context_store().load(&event.session_id, &now);
        (
            Some(extract_essential(&state, env.config.context.essential_preserved)),
            Some(summary(&state, &env.config.context_settings())),
        )
    } else {
        (None, None)
    };

    let preserved = PreservedContext {
        timestamp: now,
        session_id: event.session_id.clone(),
        phase: info.phase,
        phase_details: info.details.clone(),
        focus_directive: focus,
        essential_discoveries: essential
            .as_ref()
            .map(|e| e.essential_discoveries.clone())
            .unwrap_or_default(),
        token_estimate_at_compact: essential.as_ref().map_or(0, |e| e.token_estimate),
        utilization_at_compact: essential.as_ref().map_or(0.0, |e| e.utilization),
    };
    let saved = match env.preserved_store().save(&preserved) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "preserved context not saved");
            false
        }
    };

    let message = render_preservation(&preserved, context_summary.as_deref(), saved)?;
    Ok(HookResponse::from_lines(vec![message]))
}

fn render_preservation(
    preserved: &PreservedContext,
    context_summary: Option<&str>,
    saved: bool,
) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("preservation", PRESERVATION_TEMPLATE)?;
    let template = env.get_template("preservation")?;
    let discoveries: Vec<_> = preserved
        .essential_discoveries
        .iter()
        .take(SHOWN_DISCOVERIES)
        .collect();
    let rendered = template.render(context! {
        prefix => MESSAGE_PREFIX,
        context_summary => context_summary,
        saved => saved,
        rule => "=".repeat(RULE_WIDTH),
        phase => preserved.phase.as_str(),
        focus => &preserved.focus_directive,
        discoveries => discoveries,
    })?;
    Ok(rendered)
}
