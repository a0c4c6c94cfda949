//! Extraction of structured findings from free-form subagent reports.
//!
//! Reports are matched lexically; anything a pattern misses is simply not
//! extracted.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::artifact::{
    Discovery, FileReference, OpenQuestion, Rating, Recommendation, ResearchArtifact,
    ValidationResult,
};
use crate::core::types::{percent, prefix};

const MAX_DISCOVERIES: usize = 10;
const MAX_FILES: usize = 15;
const MAX_QUESTIONS: usize = 5;
const MIN_ITEM_CHARS: usize = 10;
const MAX_ITEM_CHARS: usize = 200;
const DEFAULT_CONFIDENCE: f64 = 0.5;

const RESEARCH_MARKERS: &[&str] = &[
    "research",
    "explore",
    "investigation",
    "analysis",
    "exploration",
];
const VALIDATOR_MARKERS: &[&str] = &["plan-validator", "validation", "validate plan"];

static CONFIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)confidence\s*(?:score)?[:\s]+(\d+\.?\d*)%?").unwrap());
static DISCOVERIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:key\s+)?discover(?:y|ies)[:\s]*\n((?:[-*\d.]+\s+.+\n?)+)").unwrap()
});
static FILES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:relevant\s+)?files?[:\s]*\n((?:[-*]\s+.+\n?)+)").unwrap()
});
static FILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\-]+\.\w+)").unwrap());
static QUESTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:open\s+)?questions?[:\s]*\n((?:[-*\d.]+\s+.+\??\n?)+)").unwrap()
});
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*\d.]+\s*").unwrap());
static BLOCKING_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\[blocking\]").unwrap());
static PROCEED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bPROCEED\b").unwrap());
static BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bBLOCK\b").unwrap());
static REVISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bREVISE\b").unwrap());
static SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)overall\s+score[:\s]+(\d+)/10").unwrap());
static CRITICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[CRITICAL\]\s+(.+?)(?:\n|$)").unwrap());

/// Which kind of subagent produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentRole {
    Research,
    PlanValidator,
    Other,
}

/// Research markers win over validator markers when both appear.
pub fn classify_subagent(subagent_type: &str, description: &str) -> SubagentRole {
    let kind = subagent_type.to_lowercase();
    let description = description.to_lowercase();
    let mentions = |markers: &[&str]| {
        markers
            .iter()
            .any(|marker| kind.contains(marker) || description.contains(marker))
    };
    if mentions(RESEARCH_MARKERS) {
        SubagentRole::Research
    } else if mentions(VALIDATOR_MARKERS) {
        SubagentRole::PlanValidator
    } else {
        SubagentRole::Other
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuestion {
    pub question: String,
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchFindings {
    pub confidence: f64,
    pub discoveries: Vec<String>,
    pub files: Vec<String>,
    pub questions: Vec<ExtractedQuestion>,
}

impl ResearchFindings {
    pub fn blocking_questions(&self) -> usize {
        self.questions.iter().filter(|q| q.blocking).count()
    }
}

/// Confidence as a `[0, 1]` fraction; values above 1 are read as percentages.
pub fn extract_confidence(output: &str) -> f64 {
    CONFIDENCE
        .captures(output)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|value| if value > 1.0 { value / 100.0 } else { value })
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

fn section_lines<'a>(pattern: &Regex, output: &'a str) -> Vec<&'a str> {
    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|block| block.as_str().trim().split('\n').collect())
        .unwrap_or_default()
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    match LIST_MARKER.find(line) {
        Some(found) => &line[found.end()..],
        None => line,
    }
}

pub fn extract_discoveries(output: &str) -> Vec<String> {
    section_lines(&DISCOVERIES, output)
        .into_iter()
        .take(MAX_DISCOVERIES)
        .map(strip_marker)
        .filter(|line| line.chars().count() > MIN_ITEM_CHARS)
        .map(|line| prefix(line, MAX_ITEM_CHARS).to_string())
        .collect()
}

pub fn extract_files(output: &str) -> Vec<String> {
    section_lines(&FILES, output)
        .into_iter()
        .take(MAX_FILES)
        .filter_map(|line| FILE_PATH.captures(line).map(|caps| caps[1].to_string()))
        .collect()
}

pub fn extract_questions(output: &str) -> Vec<ExtractedQuestion> {
    section_lines(&QUESTIONS, output)
        .into_iter()
        .take(MAX_QUESTIONS)
        .map(strip_marker)
        .filter(|line| line.chars().count() > MIN_ITEM_CHARS)
        .map(|line| {
            let blocking = BLOCKING_TAG.is_match(line);
            let question = BLOCKING_TAG.replace_all(line, "");
            ExtractedQuestion {
                question: prefix(question.trim(), MAX_ITEM_CHARS).to_string(),
                blocking,
            }
        })
        .collect()
}

pub fn extract_research(output: &str) -> ResearchFindings {
    ResearchFindings {
        confidence: extract_confidence(output),
        discoveries: extract_discoveries(output),
        files: extract_files(output),
        questions: extract_questions(output),
    }
}

/// What was added to a research artifact by [`merge_research`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub discoveries: usize,
    pub files: usize,
    pub questions: usize,
}

/// Fold subagent findings into `research`. Confidence only ever rises.
pub fn merge_research(research: &mut ResearchArtifact, findings: &ResearchFindings) -> MergeCounts {
    let mut counts = MergeCounts::default();
    research.raise_confidence(findings.confidence);
    research.research_sessions += 1;
    for description in &findings.discoveries {
        let added = research.add_discovery(Discovery {
            description: description.clone(),
            confidence: findings.confidence,
            source_locations: Vec::new(),
            category: "subagent".to_string(),
        });
        counts.discoveries += usize::from(added);
    }
    for path in &findings.files {
        let added = research.add_file(FileReference {
            path: path.clone(),
            purpose: "Identified by research subagent".to_string(),
            relevance: findings.confidence,
        });
        counts.files += usize::from(added);
    }
    for question in &findings.questions {
        let added = research.add_question(OpenQuestion {
            question: question.question.clone(),
            priority: if question.blocking {
                Rating::High
            } else {
                Rating::Medium
            },
            blocking: question.blocking,
        });
        counts.questions += usize::from(added);
    }
    counts
}

fn ellipsize(text: &str, max: usize) -> String {
    let cut = prefix(text, max);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

const RULE: &str = "========================================";

pub fn research_summary(findings: &ResearchFindings, threshold: f64) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "RESEARCH SUBAGENT RESULTS".to_string(),
        RULE.to_string(),
        format!("Confidence: {}", percent(findings.confidence)),
    ];
    if !findings.discoveries.is_empty() {
        lines.push(String::new());
        lines.push(format!("Key Discoveries ({}):", findings.discoveries.len()));
        lines.extend(
            findings
                .discoveries
                .iter()
                .take(5)
                .map(|d| format!("  - {}", ellipsize(d, 80))),
        );
    }
    if !findings.files.is_empty() {
        lines.push(String::new());
        lines.push(format!("Relevant Files ({}):", findings.files.len()));
        lines.extend(findings.files.iter().take(5).map(|f| format!("  - {f}")));
    }
    if !findings.questions.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Open Questions: {} ({} blocking)",
            findings.questions.len(),
            findings.blocking_questions()
        ));
        lines.extend(findings.questions.iter().take(3).map(|q| {
            let tag = if q.blocking { "[BLOCKING] " } else { "" };
            format!("  - {tag}{}", ellipsize(&q.question, 60))
        }));
    }
    lines.push(RULE.to_string());
    lines.push(String::new());
    if findings.confidence >= threshold {
        lines.push("[Harness] Research confidence threshold met. Ready for PLANNING phase.".into());
    } else {
        lines.push(format!(
            "[Harness] Research confidence at {}. Continue to build understanding.",
            percent(findings.confidence)
        ));
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFindings {
    pub recommendation: Option<Recommendation>,
    /// Overall score out of 10.
    pub score: Option<u32>,
    pub critical_issue: Option<String>,
}

impl ValidationFindings {
    /// `None` when no recommendation could be found.
    pub fn to_result(&self) -> Option<ValidationResult> {
        let recommendation = self.recommendation?;
        Some(ValidationResult {
            recommendation,
            completeness_score: f64::from(self.score.unwrap_or(0).min(10)),
            coverage_analysis: Default::default(),
            missing_steps: Vec::new(),
            risks_identified: self.critical_issue.iter().cloned().collect(),
        })
    }
}

/// PROCEED is checked first, then BLOCK, then REVISE.
pub fn extract_recommendation(output: &str) -> Option<Recommendation> {
    if PROCEED.is_match(output) {
        Some(Recommendation::Proceed)
    } else if BLOCK.is_match(output) {
        Some(Recommendation::Block)
    } else if REVISE.is_match(output) {
        Some(Recommendation::Revise)
    } else {
        None
    }
}

pub fn extract_validation(output: &str) -> ValidationFindings {
    ValidationFindings {
        recommendation: extract_recommendation(output),
        score: SCORE
            .captures(output)
            .and_then(|caps| caps[1].parse::<u32>().ok()),
        critical_issue: CRITICAL
            .captures(output)
            .map(|caps| prefix(caps[1].trim(), 100).to_string()),
    }
}

pub fn validation_summary(findings: &ValidationFindings) -> String {
    let label = findings
        .recommendation
        .map(|r| r.as_str().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let mut lines = vec![
        RULE.to_string(),
        "PLAN VALIDATION RESULTS".to_string(),
        RULE.to_string(),
        format!("Recommendation: {label}"),
    ];
    if let Some(score) = findings.score {
        lines.push(format!("Overall Score: {score}/10"));
    }
    if let Some(issue) = &findings.critical_issue {
        lines.push(String::new());
        lines.push(format!("Critical Issue: {issue}"));
    }
    lines.push(RULE.to_string());
    let guidance = match findings.recommendation {
        Some(Recommendation::Proceed) => {
            Some("[Harness] Plan validated. Ready for IMPLEMENTATION phase.")
        }
        Some(Recommendation::Block) => {
            Some("[Harness] Plan validation BLOCKED. Major revision required.")
        }
        Some(Recommendation::Revise) => {
            Some("[Harness] Plan needs revision. Address feedback before implementation.")
        }
        None => None,
    };
    if let Some(guidance) = guidance {
        lines.push(String::new());
        lines.push(guidance.to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::research_with;

    const REPORT: &str = "\
## Summary
Confidence Score: 85%

Key Discoveries:
- Sessions are stored in Redis with a 30 minute TTL
- short
1. Auth middleware wraps every /api route

Relevant Files:
- src/auth/session.rs (session store)
- src/api/mod.rs

Open Questions:
- [BLOCKING] Should refresh tokens rotate on every use?
- Is the legacy cookie format still needed?
";

    #[test]
    fn subagent_roles() {
        assert_eq!(classify_subagent("Explore", ""), SubagentRole::Research);
        assert_eq!(
            classify_subagent("general", "Codebase analysis for auth"),
            SubagentRole::Research
        );
        assert_eq!(
            classify_subagent("plan-validator", "check it"),
            SubagentRole::PlanValidator
        );
        assert_eq!(classify_subagent("general", "write docs"), SubagentRole::Other);
    }

    #[test]
    fn confidence_is_normalised() {
        assert_eq!(extract_confidence("Confidence: 0.8"), 0.8);
        assert_eq!(extract_confidence("confidence score: 85%"), 0.85);
        assert_eq!(extract_confidence("Confidence: 250"), 1.0);
        assert_eq!(extract_confidence("no score here"), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn research_report_sections_are_extracted() {
        let findings = extract_research(REPORT);
        assert_eq!(findings.confidence, 0.85);
        assert_eq!(
            findings.discoveries,
            vec![
                "Sessions are stored in Redis with a 30 minute TTL".to_string(),
                "Auth middleware wraps every /api route".to_string(),
            ]
        );
        assert_eq!(
            findings.files,
            vec!["src/auth/session.rs".to_string(), "src/api/mod.rs".to_string()]
        );
        assert_eq!(findings.questions.len(), 2);
        assert!(findings.questions[0].blocking);
        assert_eq!(
            findings.questions[0].question,
            "Should refresh tokens rotate on every use?"
        );
        assert!(!findings.questions[1].blocking);
    }

    #[test]
    fn merge_raises_confidence_and_dedupes() {
        let findings = extract_research(REPORT);
        let mut research = research_with(0.9, vec![], 0);
        let sessions = research.research_sessions;

        let first = merge_research(&mut research, &findings);
        assert_eq!(first.discoveries, 2);
        assert_eq!(research.confidence_score, 0.9, "confidence never drops");
        assert_eq!(research.research_sessions, sessions + 1);
        assert_eq!(research.blocking_questions().count(), 1);

        let second = merge_research(&mut research, &findings);
        assert_eq!(second, MergeCounts::default());
        assert_eq!(research.discoveries.len(), 2);
    }

    #[test]
    fn research_summary_reports_threshold() {
        let findings = extract_research(REPORT);
        let text = research_summary(&findings, 0.7);
        assert!(text.contains("Confidence: 85%"));
        assert!(text.contains("Open Questions: 2 (1 blocking)"));
        assert!(text.ends_with("Ready for PLANNING phase."));
    }

    #[test]
    fn validation_report_is_parsed() {
        let output = "Recommendation: REVISE\nOverall Score: 6/10\n[CRITICAL] Missing rollback step\n";
        let findings = extract_validation(output);
        assert_eq!(findings.recommendation, Some(Recommendation::Revise));
        assert_eq!(findings.score, Some(6));
        assert_eq!(findings.critical_issue.as_deref(), Some("Missing rollback step"));

        let result = findings.to_result().expect("result");
        assert_eq!(result.completeness_score, 6.0);
        assert_eq!(result.risks_identified, vec!["Missing rollback step".to_string()]);

        let text = validation_summary(&findings);
        assert!(text.contains("Recommendation: REVISE"));
        assert!(text.ends_with("Address feedback before implementation."));
    }

    #[test]
    fn proceed_wins_over_block() {
        assert_eq!(
            extract_recommendation("We could BLOCK, but PROCEED is fine"),
            Some(Recommendation::Proceed)
        );
        assert_eq!(extract_recommendation("nothing decisive"), None);
        assert_eq!(extract_validation("nothing").to_result(), None);
    }
}
