//! Prompt submission: steer research and implementation requests toward the
//! current phase's next step.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::compact::current_phase;
use crate::core::intent::{Directive, IntentMatcher, directive_for};
use crate::core::phase::Phase;
use crate::core::types::prefix;
use crate::env::HookEnv;
use crate::response::{HookResponse, MESSAGE_PREFIX};

const DIRECTIVE_TEMPLATE: &str = include_str!("templates/directive.txt");
const REQUEST_PREVIEW_CHARS: usize = 100;

/// Payload of the prompt-submit event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptEvent {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub prompt: String,
}

#[instrument(skip_all, fields(session = %event.session_id))]
pub fn handle_user_prompt(env: &HookEnv, event: &PromptEvent) -> Result<HookResponse> {
    let delegation = &env.config.delegation;
    if !delegation.enabled {
        return Ok(HookResponse::empty());
    }
    let intent = IntentMatcher::new(&delegation.research_phrases)?.detect(&event.prompt);
    if !intent.research && !intent.planning {
        return Ok(HookResponse::empty());
    }

    let phase = current_phase(env).phase;
    let Some(directive) = directive_for(intent, delegation.auto_delegate_research, phase) else {
        return Ok(HookResponse::empty());
    };
    debug!(directive = directive.as_str(), phase = %phase, "prompt directive");
    let message = render_directive(directive, phase, &event.prompt)?;
    Ok(HookResponse::from_lines(vec![message]))
}

fn render_directive(directive: Directive, phase: Phase, prompt: &str) -> Result<String> {
    let preview = prefix(prompt, REQUEST_PREVIEW_CHARS);
    let request = if preview.len() < prompt.len() {
        format!("{preview}...")
    } else {
        preview.to_string()
    };
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("directive", DIRECTIVE_TEMPLATE)?;
    let rendered = env.get_template("directive")?.render(context! {
        directive => directive.as_str(),
        prefix => MESSAGE_PREFIX,
        phase => phase.as_str(),
        request => request,
    })?;
    Ok(rendered.trim_end().to_string())
}
