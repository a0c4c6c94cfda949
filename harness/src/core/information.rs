//! Three-tier classification of information entering the agent's context.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::types::{ActionKind, param_str, prefix};

/// Default characters-to-tokens ratio.
pub const DEFAULT_TOKENS_PER_CHAR: f64 = 0.25;

const IMPORTANT_NAMES: &[&str] = &["config", "settings", "main", "index", "app", "routes"];
const LARGE_READ_CHARS: usize = 5000;
const LARGE_EXPLORATION_CHARS: usize = 2000;
const FEW_MATCHES: usize = 10;
const TEST_MARKERS: &[&str] = &["test", "pytest", "jest", "cargo test"];
const EXPLORATION_MARKERS: &[&str] = &["ls", "find", "tree", "cat", "head"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationClass {
    /// Core findings, decisions, blockers.
    Essential,
    /// Supporting detail.
    Helpful,
    /// Dead ends and verbose output.
    Noise,
}

impl InformationClass {
    pub fn as_str(self) -> &'static str {
        match self {
            InformationClass::Essential => "essential",
            InformationClass::Helpful => "helpful",
            InformationClass::Noise => "noise",
        }
    }
}

impl fmt::Display for InformationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub class: InformationClass,
    pub summary: String,
    pub tokens: u64,
}

impl Classified {
    fn new(class: InformationClass, summary: String, tokens: u64) -> Self {
        Self {
            class,
            summary,
            tokens,
        }
    }
}

/// `floor(chars * tokens_per_char)`.
pub fn estimate_tokens(text: &str, tokens_per_char: f64) -> u64 {
    (text.chars().count() as f64 * tokens_per_char).floor() as u64
}

/// First 12 hex chars of the SHA-256 digest of `text`.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(12);
    hash
}

/// Short source descriptor used for redundancy detection.
pub fn source_descriptor(kind: &ActionKind, parameters: &Map<String, Value>) -> String {
    let or_unknown = |key: &str| match param_str(parameters, key) {
        "" => "unknown".to_string(),
        value => value.to_string(),
    };
    match kind {
        ActionKind::Read => format!("Read:{}", or_unknown("file_path")),
        ActionKind::Grep => format!("Grep:{}", or_unknown("pattern")),
        ActionKind::Glob => format!("Glob:{}", or_unknown("pattern")),
        ActionKind::Bash => format!("Bash:{}", prefix(&or_unknown("command"), 30)),
        other => format!("{other}:{}", prefix(&params_text(parameters), 20)),
    }
}

fn params_text(parameters: &Map<String, Value>) -> String {
    Value::Object(parameters.clone()).to_string()
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Classify one action's result by its long-term value to the task.
///
/// Pure and idempotent: the same inputs always produce the same output.
pub fn classify_information(
    kind: &ActionKind,
    parameters: &Map<String, Value>,
    result: &str,
    tokens_per_char: f64,
) -> Classified {
    let tokens = estimate_tokens(result, tokens_per_char);
    let chars = result.chars().count();

    match kind {
        ActionKind::Read => {
            let path = param_str(parameters, "file_path");
            let name = file_name(path);
            let lowered = path.to_lowercase();
            let important = IMPORTANT_NAMES.iter().any(|p| lowered.contains(p));
            if important && chars <= LARGE_READ_CHARS {
                Classified::new(
                    InformationClass::Essential,
                    format!("Read important file: {name}"),
                    tokens,
                )
            } else if chars > LARGE_READ_CHARS {
                Classified::new(
                    InformationClass::Noise,
                    format!("Large file read: {name} ({chars} chars)"),
                    tokens,
                )
            } else {
                Classified::new(InformationClass::Helpful, format!("Read file: {name}"), tokens)
            }
        }
        ActionKind::Grep => {
            let pattern = prefix(param_str(parameters, "pattern"), 30);
            let matches = if result.trim().is_empty() {
                0
            } else {
                result.matches('\n').count() + 1
            };
            match matches {
                0 => Classified::new(
                    InformationClass::Noise,
                    format!("No matches for: {pattern}"),
                    tokens,
                ),
                n if n <= FEW_MATCHES => Classified::new(
                    InformationClass::Essential,
                    format!("Found {n} matches for: {pattern}"),
                    tokens,
                ),
                n => Classified::new(
                    InformationClass::Helpful,
                    format!("Found {n} matches for: {pattern} (many results)"),
                    tokens,
                ),
            }
        }
        ActionKind::Glob => {
            let pattern = param_str(parameters, "pattern");
            let trimmed = result.trim();
            let files = if trimmed.is_empty() {
                0
            } else {
                trimmed.split('\n').count()
            };
            Classified::new(
                InformationClass::Helpful,
                format!("Found {files} files matching: {pattern}"),
                tokens,
            )
        }
        ActionKind::Bash => classify_command(param_str(parameters, "command"), result, tokens),
        ActionKind::Task => Classified::new(
            InformationClass::Essential,
            format!("Subagent: {}", param_str(parameters, "description")),
            tokens,
        ),
        other => Classified::new(
            InformationClass::Helpful,
            format!("{other}: {}", prefix(&params_text(parameters), 40)),
            tokens,
        ),
    }
}

fn classify_command(command: &str, result: &str, tokens: u64) -> Classified {
    if TEST_MARKERS.iter().any(|marker| command.contains(marker)) {
        let lowered = result.to_lowercase();
        let verdict = if lowered.contains("failed") || lowered.contains("error") {
            "FAILED"
        } else {
            "PASSED"
        };
        return Classified::new(
            InformationClass::Essential,
            format!("Test {verdict}: {}", prefix(command, 40)),
            tokens,
        );
    }
    if command.starts_with("git ") {
        return Classified::new(
            InformationClass::Helpful,
            format!("Git: {}", prefix(command, 40)),
            tokens,
        );
    }
    if EXPLORATION_MARKERS.iter().any(|marker| command.contains(marker)) {
        return if result.chars().count() > LARGE_EXPLORATION_CHARS {
            Classified::new(
                InformationClass::Noise,
                format!("Large exploration output: {}", prefix(command, 30)),
                tokens,
            )
        } else {
            Classified::new(
                InformationClass::Helpful,
                format!("Exploration: {}", prefix(command, 30)),
                tokens,
            )
        };
    }
    Classified::new(InformationClass::Helpful, format!("Command: {}", prefix(command, 40)), tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::params;

    fn classify(kind: &str, pairs: &[(&str, &str)], result: &str) -> Classified {
        classify_information(
            &ActionKind::from(kind),
            &params(pairs),
            result,
            DEFAULT_TOKENS_PER_CHAR,
        )
    }

    #[test]
    fn failing_pytest_is_essential() {
        let got = classify("Bash", &[("command", "pytest -v")], "2 failed, 3 passed");
        assert_eq!(got.class, InformationClass::Essential);
        assert_eq!(got.summary, "Test FAILED: pytest -v");
    }

    #[test]
    fn passing_tests_are_essential() {
        let got = classify("Bash", &[("command", "cargo test")], "test result: ok");
        assert_eq!(got.class, InformationClass::Essential);
        assert_eq!(got.summary, "Test PASSED: cargo test");
    }

    #[test]
    fn read_rules() {
        let got = classify("Read", &[("file_path", "src/config.rs")], "small");
        assert_eq!(got.class, InformationClass::Essential);
        assert_eq!(got.summary, "Read important file: config.rs");

        let big = "x".repeat(6000);
        let got = classify("Read", &[("file_path", "src/app.rs")], &big);
        assert_eq!(got.class, InformationClass::Noise);
        assert_eq!(got.summary, "Large file read: app.rs (6000 chars)");
        assert_eq!(got.tokens, 1500);

        let got = classify("Read", &[("file_path", "src/util.rs")], "fn x() {}");
        assert_eq!(got.class, InformationClass::Helpful);
    }

    #[test]
    fn grep_counts_matches() {
        let got = classify("Grep", &[("pattern", "TODO")], "   ");
        assert_eq!(got.class, InformationClass::Noise);
        assert_eq!(got.summary, "No matches for: TODO");

        let got = classify("Grep", &[("pattern", "TODO")], "a:1\nb:2\nc:3");
        assert_eq!(got.class, InformationClass::Essential);
        assert_eq!(got.summary, "Found 3 matches for: TODO");

        let many = vec!["hit"; 12].join("\n");
        let got = classify("Grep", &[("pattern", "TODO")], &many);
        assert_eq!(got.class, InformationClass::Helpful);
        assert!(got.summary.ends_with("(many results)"));
    }

    #[test]
    fn exploration_output_size_matters() {
        let got = classify("Bash", &[("command", "ls -R")], &"f\n".repeat(1500));
        assert_eq!(got.class, InformationClass::Noise);
        let got = classify("Bash", &[("command", "git log")], "abc");
        assert_eq!(got.summary, "Git: git log");
        let got = classify("Bash", &[("command", "echo hi")], "hi");
        assert_eq!(got.summary, "Command: echo hi");
    }

    #[test]
    fn classification_is_idempotent() {
        let first = classify("Glob", &[("pattern", "**/*.rs")], "a.rs\nb.rs\n");
        let second = classify("Glob", &[("pattern", "**/*.rs")], "a.rs\nb.rs\n");
        assert_eq!(first, second);
        assert_eq!(first.summary, "Found 2 files matching: **/*.rs");
    }

    #[test]
    fn descriptors_and_hashes() {
        let bash = params(&[("command", "find . -name '*.rs' -not -path './target/*'")]);
        assert_eq!(
            source_descriptor(&ActionKind::Bash, &bash),
            "Bash:find . -name '*.rs' -not -path"
        );
        assert_eq!(
            source_descriptor(&ActionKind::Read, &Map::new()),
            "Read:unknown"
        );
        let hash = content_hash("hello");
        assert_eq!(hash.len(), 12);
        assert_eq!(hash, content_hash("hello"));
        assert_ne!(hash, content_hash("hello!"));
    }
}
