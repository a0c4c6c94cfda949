//! Hook wire format: the JSON object printed on stdout after every event.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix for messages the harness itself emits.
pub const MESSAGE_PREFIX: &str = "[Harness]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub permission_decision: PermissionDecision,
}

/// Response to one hook event. An empty object means "nothing to say".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Join non-empty lines into one system message; no lines means empty.
    pub fn from_lines(lines: Vec<String>) -> Self {
        if lines.is_empty() {
            return Self::empty();
        }
        Self {
            system_message: Some(lines.join("\n")),
            hook_specific_output: None,
        }
    }

    pub fn deny(mut self) -> Self {
        self.hook_specific_output = Some(HookSpecificOutput {
            permission_decision: PermissionDecision::Deny,
        });
        self
    }

    pub fn is_denied(&self) -> bool {
        self.hook_specific_output
            .as_ref()
            .is_some_and(|out| out.permission_decision == PermissionDecision::Deny)
    }

    /// Single-line JSON for stdout.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Turn a hook failure into a non-blocking diagnostic message.
///
/// Hooks never fail the host: any error becomes a system message and the
/// action proceeds.
pub fn fail_open(hook: &str, result: anyhow::Result<HookResponse>) -> HookResponse {
    match result {
        Ok(response) => response,
        Err(err) => {
            warn!(hook, error = %format!("{err:#}"), "hook failed; allowing action");
            HookResponse {
                system_message: Some(format!("{MESSAGE_PREFIX} {hook} hook error: {err:#}")),
                hook_specific_output: None,
            }
        }
    }
}
