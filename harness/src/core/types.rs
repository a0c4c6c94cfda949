//! Shared deterministic types for harness core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of agent action carried by an [`Event`].
///
/// Unrecognized tool names are preserved verbatim in [`ActionKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Read,
    Write,
    Edit,
    Bash,
    Grep,
    Glob,
    Task,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Read => "Read",
            ActionKind::Write => "Write",
            ActionKind::Edit => "Edit",
            ActionKind::Bash => "Bash",
            ActionKind::Grep => "Grep",
            ActionKind::Glob => "Glob",
            ActionKind::Task => "Task",
            ActionKind::Other(name) => name,
        }
    }

    /// True for actions that change files or run commands.
    pub fn is_mutating(&self) -> bool {
        matches!(self, ActionKind::Write | ActionKind::Edit | ActionKind::Bash)
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Read" => ActionKind::Read,
            "Write" => ActionKind::Write,
            "Edit" => ActionKind::Edit,
            "Bash" => ActionKind::Bash,
            "Grep" => ActionKind::Grep,
            "Glob" => ActionKind::Glob,
            "Task" => ActionKind::Task,
            _ => ActionKind::Other(value),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(value: &str) -> Self {
        ActionKind::from(value.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent action as delivered by the event source.
///
/// The wire form follows the hook payload (`tool_name`, `tool_input`,
/// `tool_result`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(rename = "tool_name")]
    pub kind: ActionKind,
    #[serde(rename = "tool_input", default)]
    pub parameters: Map<String, Value>,
    #[serde(rename = "tool_result", alias = "tool_response", default)]
    pub result: Value,
}

fn default_session_id() -> String {
    "default".to_string()
}

impl Event {
    pub fn new(
        session_id: impl Into<String>,
        kind: impl Into<ActionKind>,
        parameters: Map<String, Value>,
        result: impl Into<Value>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind: kind.into(),
            parameters,
            result: result.into(),
        }
    }

    /// String parameter lookup; missing or non-string values read as `""`.
    pub fn param(&self, key: &str) -> &str {
        param_str(&self.parameters, key)
    }

    /// Result payload rendered as text (strings verbatim, everything else as JSON).
    pub fn result_text(&self) -> String {
        value_text(&self.result)
    }
}

/// String parameter lookup; missing or non-string values read as `""`.
pub fn param_str<'a>(parameters: &'a Map<String, Value>, key: &str) -> &'a str {
    parameters.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Render an arbitrary payload as text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// First `max` characters of `text` (char-boundary safe).
pub fn prefix(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Enforcement level for gate verdicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Suggestions only; edit gates always allow.
    Relaxed,
    /// Phase violations warn.
    #[default]
    Standard,
    /// Phase violations block.
    Strict,
}

impl Strictness {
    pub fn as_str(self) -> &'static str {
        match self {
            Strictness::Relaxed => "relaxed",
            Strictness::Standard => "standard",
            Strictness::Strict => "strict",
        }
    }
}

/// Format a `[0,1]` ratio as a whole percentage (`0.6` -> `60%`).
pub fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_parses_hook_payload() {
        let raw = r#"{
            "session_id": "s-1",
            "tool_name": "Read",
            "tool_input": {"file_path": "src/main.rs"},
            "tool_result": "fn main() {}"
        }"#;
        let event: Event = serde_json::from_str(raw).expect("parse");
        assert_eq!(event.kind, ActionKind::Read);
        assert_eq!(event.param("file_path"), "src/main.rs");
        assert_eq!(event.param("missing"), "");
        assert_eq!(event.result_text(), "fn main() {}");
    }

    #[test]
    fn unknown_tool_names_round_trip() {
        let kind: ActionKind = serde_json::from_value(json!("WebFetch")).expect("parse");
        assert_eq!(kind, ActionKind::Other("WebFetch".to_string()));
        assert_eq!(serde_json::to_value(&kind).expect("ser"), json!("WebFetch"));
    }

    #[test]
    fn structured_results_render_as_json() {
        let event = Event::new("s", "Task", Map::new(), json!({"ok": true}));
        assert_eq!(event.result_text(), r#"{"ok":true}"#);
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        assert_eq!(prefix("héllo", 2), "hé");
        assert_eq!(prefix("abc", 10), "abc");
    }

    #[test]
    fn strictness_defaults_to_standard() {
        assert_eq!(Strictness::default(), Strictness::Standard);
        let parsed: Strictness = serde_json::from_value(json!("strict")).expect("parse");
        assert_eq!(parsed, Strictness::Strict);
    }
}
