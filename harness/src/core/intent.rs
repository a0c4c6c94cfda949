//! Prompt intent detection and phase-aware delegation directives.
//!
//! A submitted prompt is matched against two rule tables: research phrasing
//! ("how does", "where is", ...) and implementation phrasing ("implement",
//! "fix ... bug", ...). The directive depends on the intent and the current
//! phase.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::phase::Phase;

const RESEARCH_PHRASES: &[&str] = &[
    "how does",
    "where is",
    "find the",
    "understand",
    "explore",
    "investigate",
    "what is",
    "explain the",
    "what does",
    "how is",
    "where are",
    "look for",
    "search for",
    "figure out",
    "learn about",
    "research",
];

/// Whole-word, case-insensitive match for a literal phrase.
fn phrase_pattern(phrase: &str) -> String {
    format!(r"(?i)\b{}\b", regex::escape(phrase.trim()))
}

static DEFAULT_RESEARCH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    RESEARCH_PHRASES
        .iter()
        .map(|phrase| Regex::new(&phrase_pattern(phrase)).unwrap())
        .collect()
});

static PLANNING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bimplement\b",
        r"(?i)\badd\b.*\bfeature\b",
        r"(?i)\bcreate\b.*\bfunction\b",
        r"(?i)\bbuild\b",
        r"(?i)\brefactor\b",
        r"(?i)\bfix\b.*\bbug\b",
        r"(?i)\bupdate\b.*\bcode\b",
        r"(?i)\bmodify\b",
        r"(?i)\bchange\b.*\bimplementation\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptIntent {
    pub research: bool,
    pub planning: bool,
}

/// Research phrase table, either the built-in one or a configured override.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    research: Vec<Regex>,
}

impl IntentMatcher {
    /// Empty `phrases` selects the built-in research table.
    pub fn new(phrases: &[String]) -> Result<Self> {
        if phrases.is_empty() {
            return Ok(Self {
                research: DEFAULT_RESEARCH.clone(),
            });
        }
        let research = phrases
            .iter()
            .map(|phrase| {
                Regex::new(&phrase_pattern(phrase))
                    .with_context(|| format!("compile research phrase {phrase:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { research })
    }

    pub fn detect(&self, prompt: &str) -> PromptIntent {
        PromptIntent {
            research: self.research.iter().any(|re| re.is_match(prompt)),
            planning: PLANNING.iter().any(|re| re.is_match(prompt)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Hand exploration to a research subagent.
    DelegateResearch,
    /// Implementation asked for before research is complete.
    ResearchFirst,
    /// Research is complete but no plan exists.
    PlanFirst,
    /// A plan exists but is not actionable yet.
    ValidatePlan,
}

impl Directive {
    pub fn as_str(self) -> &'static str {
        match self {
            Directive::DelegateResearch => "delegate_research",
            Directive::ResearchFirst => "research_first",
            Directive::PlanFirst => "plan_first",
            Directive::ValidatePlan => "validate_plan",
        }
    }
}

/// Research delegation wins over planning guidance when enabled.
pub fn directive_for(
    intent: PromptIntent,
    auto_delegate: bool,
    phase: Phase,
) -> Option<Directive> {
    if intent.research && auto_delegate {
        return Some(Directive::DelegateResearch);
    }
    if !intent.planning {
        return None;
    }
    match phase {
        Phase::NewSession | Phase::Research => Some(Directive::ResearchFirst),
        Phase::PlanningReady => Some(Directive::PlanFirst),
        Phase::Planning => Some(Directive::ValidatePlan),
        Phase::ImplementationReady | Phase::Implementation => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_matcher() -> IntentMatcher {
        IntentMatcher::new(&[]).expect("matcher")
    }

    #[test]
    fn research_phrases_match_whole_words() {
        let matcher = default_matcher();
        assert!(matcher.detect("How does the session cache expire?").research);
        assert!(matcher.detect("Please investigate the flaky test").research);
        assert!(!matcher.detect("Rename the researcher field").research);
    }

    #[test]
    fn planning_phrases_span_words() {
        let matcher = default_matcher();
        assert!(matcher.detect("Fix the login bug").planning);
        assert!(matcher.detect("add a dark mode feature").planning);
        assert!(matcher.detect("Refactor the store").planning);
        assert_eq!(matcher.detect("thanks!"), PromptIntent::default());
    }

    #[test]
    fn configured_phrases_replace_defaults() {
        let matcher = IntentMatcher::new(&["dig into".to_string()]).expect("matcher");
        assert!(matcher.detect("Dig into the parser").research);
        assert!(!matcher.detect("how does the parser work").research);
    }

    #[test]
    fn planning_directive_follows_phase() {
        let planning = PromptIntent {
            research: false,
            planning: true,
        };
        let cases = [
            (Phase::NewSession, Some(Directive::ResearchFirst)),
            (Phase::Research, Some(Directive::ResearchFirst)),
            (Phase::PlanningReady, Some(Directive::PlanFirst)),
            (Phase::Planning, Some(Directive::ValidatePlan)),
            (Phase::ImplementationReady, None),
            (Phase::Implementation, None),
        ];
        for (phase, expected) in cases {
            assert_eq!(directive_for(planning, true, phase), expected, "{phase}");
        }
    }

    #[test]
    fn research_delegation_can_be_disabled() {
        let both = PromptIntent {
            research: true,
            planning: true,
        };
        assert_eq!(
            directive_for(both, true, Phase::Implementation),
            Some(Directive::DelegateResearch)
        );
        assert_eq!(
            directive_for(both, false, Phase::PlanningReady),
            Some(Directive::PlanFirst)
        );
        let research_only = PromptIntent {
            research: true,
            planning: false,
        };
        assert_eq!(directive_for(research_only, false, Phase::NewSession), None);
    }
}
