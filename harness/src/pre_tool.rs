//! Pre-action handling: consult the edit/write gate before files change.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::gate::{GateAction, GateName, check_edit};
use crate::core::types::{ActionKind, Event, Strictness};
use crate::env::HookEnv;
use crate::response::HookResponse;

const BLOCKED_NOTICE: &str = "[Gate: operation blocked. Complete prior phase first.]";

#[instrument(skip_all, fields(kind = %event.kind))]
pub fn handle_pre_tool(env: &HookEnv, event: &Event) -> Result<HookResponse> {
    if env.config.strictness == Strictness::Relaxed {
        return Ok(HookResponse::empty());
    }
    let gate = match event.kind {
        ActionKind::Edit => GateName::AllowEdit,
        ActionKind::Write => GateName::AllowWrite,
        _ => return Ok(HookResponse::empty()),
    };

    let path = event.param("file_path");
    let result = check_edit(gate, env.artifacts(), &env.config.gate_settings(), path);
    debug!(gate = %gate, path, action = ?result.action, "gate checked");

    Ok(match result.action {
        GateAction::Allow => HookResponse::empty(),
        GateAction::Warn => HookResponse::from_lines(vec![result.message()]),
        GateAction::Block => {
            HookResponse::from_lines(vec![result.message(), String::new(), BLOCKED_NOTICE.into()])
                .deny()
        }
    })
}
