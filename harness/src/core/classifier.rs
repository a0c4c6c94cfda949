//! Lexical classification of agent changes into trivial / significant / major.
//!
//! Classification never parses code; it counts lines and matches rule tables.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::types::{ActionKind, param_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeLevel {
    Trivial,
    Significant,
    Major,
}

impl ChangeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeLevel::Trivial => "trivial",
            ChangeLevel::Significant => "significant",
            ChangeLevel::Major => "major",
        }
    }
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "rs", "go", "java", "c", "cpp", "h", "hpp", "cs", "rb",
    "swift", "kt", "scala", "php", "vue", "svelte",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
}

/// Lines carrying no logic: blanks, comments, imports, one-line docstrings.
static TRIVIAL_LINE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^\s*#.*$",
        r"^\s*//.*$",
        r"^\s*/\*.*\*/\s*$",
        r"^\s*\*.*$",
        r"^\s*import\s+",
        r"^\s*from\s+.*import",
        r"^\s*$",
        r#"^\s*""".*"""$"#,
        r"^\s*'''.*'''$",
        r"^\s*export\s+",
        r"^\s*require\(",
    ])
});

/// Structural code: definitions, control flow, error handling, async.
static STRUCTURAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bdef\s+\w+\s*\(",
        r"\bclass\s+\w+",
        r"\bfunction\s+\w+\s*\(",
        r"\bconst\s+\w+\s*=\s*\(.*\)\s*=>",
        r"\bif\s+.*[:{]",
        r"\bfor\s+.*[:{]",
        r"\bwhile\s+.*[:{]",
        r"\btry\s*[:{]",
        r"\bcatch\s*\(",
        r"\breturn\s+",
        r"\braise\s+",
        r"\bthrow\s+",
        r"\basync\s+",
        r"\bawait\s+",
    ])
});

static TEST_COMMAND: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\bnpm\s+test\b",
        r"(?i)\bpytest\b",
        r"(?i)\bcargo\s+test\b",
        r"(?i)\bgo\s+test\b",
        r"(?i)\bjest\b",
        r"(?i)\bmocha\b",
        r"(?i)\bvitest\b",
        r"(?i)\bunittest\b",
        r"(?i)\bmvn\s+test\b",
        r"(?i)\bgradle\s+test\b",
    ])
});

static BUILD_COMMAND: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\bnpm\s+run\s+build\b",
        r"(?i)\bcargo\s+build\b",
        r"(?i)\bgo\s+build\b",
        r"(?i)\bmvn\s+package\b",
        r"(?i)\bgradle\s+build\b",
        r"(?i)\bmake\b",
        r"(?i)\btsc\b",
    ])
});

static GIT_COMMIT: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"\bgit\s+commit\b"]));

static GIT_OPERATION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"\bgit\s+(add|status|diff|log|branch|checkout|push|pull)\b"])
});

static EXPLORATION: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"^(ls|pwd|cd|cat|head|tail|find|grep)\b"]));

/// Ordered shell-command rules; first match wins.
static BASH_RULES: [(&LazyLock<Vec<Regex>>, ChangeLevel, &str); 5] = [
    (&GIT_COMMIT, ChangeLevel::Major, "Git commit"),
    (&TEST_COMMAND, ChangeLevel::Significant, "Test execution"),
    (&BUILD_COMMAND, ChangeLevel::Significant, "Build execution"),
    (&GIT_OPERATION, ChangeLevel::Trivial, "Git operation"),
    (&EXPLORATION, ChangeLevel::Trivial, "File exploration"),
];

fn any_match(rules: &[Regex], text: &str) -> bool {
    rules.iter().any(|rule| rule.is_match(text))
}

pub fn is_code_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            CODE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Number of `\n`-separated lines (an empty string is one line).
pub fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

pub fn count_non_trivial_lines(content: &str) -> usize {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty() && !any_match(&TRIVIAL_LINE, line))
        .count()
}

pub fn has_structural_patterns(content: &str) -> bool {
    any_match(&STRUCTURAL, content)
}

/// True when `command` runs a recognised test suite.
pub fn is_test_command(command: &str) -> bool {
    any_match(&TEST_COMMAND, command)
}

pub fn classify_write(parameters: &Map<String, Value>) -> (ChangeLevel, String) {
    let path = param_str(parameters, "file_path");
    let content = param_str(parameters, "content");
    let total = line_count(content);

    if !is_code_file(path) {
        return if total > 200 {
            (ChangeLevel::Major, format!("Large non-code file ({total} lines)"))
        } else if total > 50 {
            (ChangeLevel::Significant, format!("New file ({total} lines)"))
        } else {
            (ChangeLevel::Trivial, format!("Small file ({total} lines)"))
        };
    }

    let code_lines = count_non_trivial_lines(content);
    if code_lines > 100 {
        (
            ChangeLevel::Major,
            format!("Large code file ({code_lines} code lines)"),
        )
    } else if code_lines > 30 || has_structural_patterns(content) {
        (
            ChangeLevel::Significant,
            format!("New code file ({code_lines} code lines)"),
        )
    } else {
        (
            ChangeLevel::Trivial,
            format!("Small code file ({code_lines} code lines)"),
        )
    }
}

pub fn classify_edit(parameters: &Map<String, Value>) -> (ChangeLevel, String) {
    let old = param_str(parameters, "old_string");
    let new = param_str(parameters, "new_string");

    let char_delta = new.chars().count().abs_diff(old.chars().count());
    let line_delta = line_count(new).abs_diff(line_count(old));
    let code_delta = count_non_trivial_lines(new).abs_diff(count_non_trivial_lines(old));
    let new_structure = has_structural_patterns(new) && !has_structural_patterns(old);

    if char_delta > 500 || line_delta > 20 {
        (
            ChangeLevel::Major,
            format!("Large edit ({line_delta} lines, {char_delta} chars changed)"),
        )
    } else if new_structure || code_delta > 5 {
        (
            ChangeLevel::Significant,
            format!("Code structure change ({code_delta} code lines)"),
        )
    } else if char_delta > 100 || code_delta > 2 {
        (
            ChangeLevel::Significant,
            format!("Moderate edit ({char_delta} chars changed)"),
        )
    } else {
        (
            ChangeLevel::Trivial,
            format!("Small edit ({char_delta} chars changed)"),
        )
    }
}

pub fn classify_bash(parameters: &Map<String, Value>) -> (ChangeLevel, String) {
    let command = param_str(parameters, "command");
    BASH_RULES
        .iter()
        .find(|(rules, _, _)| any_match(rules, command))
        .map(|(_, level, reason)| (*level, reason.to_string()))
        .unwrap_or((ChangeLevel::Trivial, "Shell command".to_string()))
}

/// Classify one action by its kind and parameters.
pub fn classify_change(
    kind: &ActionKind,
    parameters: &Map<String, Value>,
) -> (ChangeLevel, String) {
    match kind {
        ActionKind::Write => classify_write(parameters),
        ActionKind::Edit => classify_edit(parameters),
        ActionKind::Bash => classify_bash(parameters),
        other => (ChangeLevel::Trivial, format!("Other tool: {other}")),
    }
}

pub fn should_auto_log(level: ChangeLevel) -> bool {
    matches!(level, ChangeLevel::Significant | ChangeLevel::Major)
}

pub fn should_suggest_checkpoint(level: ChangeLevel) -> bool {
    level == ChangeLevel::Major
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
}

/// Failure markers. Zero-count summaries such as "0 failed" do not match.
static TEST_FAILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b[1-9]\d*\s+(failed|failing|errors?)\b",
        r"\bFAILED\b",
        r"\bFAIL\b",
        r"(?i)test result: failed",
        r"(?m)^error(\[\w+\])?:",
    ])
});

static TEST_PASSED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\b\d+\s+(passed|passing)\b",
        r"(?i)test result: ok",
        r"\bPASSED\b",
        r"\bok\b",
    ])
});

/// Read a test run's outcome from its output. Failure markers win.
pub fn detect_test_outcome(output: &str) -> Option<TestOutcome> {
    if any_match(&TEST_FAILED, output) {
        Some(TestOutcome::Failed)
    } else if any_match(&TEST_PASSED, output) {
        Some(TestOutcome::Passed)
    } else {
        None
    }
}
