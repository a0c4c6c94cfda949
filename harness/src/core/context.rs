//! Context intelligence: what entered the agent's working memory and how much
//! of it is worth keeping.
//!
//! [`ContextState`] is updated one event at a time by [`record`]. Retention is
//! a two-tier buffer ([`EntryLog`]) so essential entries are never crowded out
//! by noise.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::information::{
    DEFAULT_TOKENS_PER_CHAR, InformationClass, classify_information, content_hash,
    source_descriptor,
};
use crate::core::types::{Event, percent, prefix};

/// Tunables for context tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSettings {
    /// Working-memory budget in tokens.
    pub token_budget: u64,
    pub tokens_per_char: f64,
    /// Utilization below which the context is considered underused.
    pub low_water: f64,
    /// Utilization at or above which a compaction warning is raised.
    pub high_water: f64,
    pub entry_cap: usize,
    pub per_tier_retention: usize,
    /// A source seen this many times before is flagged on its next access.
    pub redundant_access_threshold: usize,
    /// Helpful entries below this many tokens are listed as prunable.
    pub low_value_tokens: u64,
    /// Essential entries kept in a preservation snapshot.
    pub essential_preserved: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            token_budget: 170_000,
            tokens_per_char: DEFAULT_TOKENS_PER_CHAR,
            low_water: 0.40,
            high_water: 0.60,
            entry_cap: 100,
            per_tier_retention: 50,
            redundant_access_threshold: 2,
            low_value_tokens: 100,
            essential_preserved: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    /// Monotonic position within the session; orders the two retention tiers.
    pub sequence: u64,
    pub timestamp: String,
    pub source: String,
    pub classification: InformationClass,
    pub summary: String,
    pub content_hash: String,
    pub token_estimate: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Bounded entry buffer split into essential and supporting tiers.
///
/// Serialized as one list in recording order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ContextEntry>", into = "Vec<ContextEntry>")]
pub struct EntryLog {
    essential: VecDeque<ContextEntry>,
    supporting: VecDeque<ContextEntry>,
}

impl EntryLog {
    pub fn len(&self) -> usize {
        self.essential.len() + self.supporting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, entry: ContextEntry) {
        match entry.classification {
            InformationClass::Essential => self.essential.push_back(entry),
            _ => self.supporting.push_back(entry),
        }
    }

    /// When over `cap`, keep only the newest `per_tier` entries of each tier.
    pub fn enforce(&mut self, cap: usize, per_tier: usize) {
        if self.len() <= cap {
            return;
        }
        for tier in [&mut self.essential, &mut self.supporting] {
            let excess = tier.len().saturating_sub(per_tier);
            tier.drain(..excess);
        }
    }

    /// All entries in recording order.
    pub fn entries(&self) -> Vec<&ContextEntry> {
        let mut all: Vec<&ContextEntry> =
            self.essential.iter().chain(self.supporting.iter()).collect();
        all.sort_by_key(|entry| entry.sequence);
        all
    }

    pub fn essential(&self) -> impl DoubleEndedIterator<Item = &ContextEntry> {
        self.essential.iter()
    }

    pub fn count(&self, class: InformationClass) -> usize {
        match class {
            InformationClass::Essential => self.essential.len(),
            other => self
                .supporting
                .iter()
                .filter(|entry| entry.classification == other)
                .count(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &ContextEntry> {
        self.essential.iter().chain(self.supporting.iter())
    }
}

impl From<Vec<ContextEntry>> for EntryLog {
    fn from(entries: Vec<ContextEntry>) -> Self {
        let mut log = EntryLog::default();
        for entry in entries {
            log.push(entry);
        }
        log
    }
}

impl From<EntryLog> for Vec<ContextEntry> {
    fn from(log: EntryLog) -> Self {
        let mut all: Vec<ContextEntry> = log.essential.into_iter().chain(log.supporting).collect();
        all.sort_by_key(|entry| entry.sequence);
        all
    }
}

/// Per-session context tracking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    pub session_id: String,
    #[serde(default)]
    pub entries: EntryLog,
    /// Cumulative tokens observed this session. Eviction does not lower it:
    /// evicted entries were still read into the agent's context.
    #[serde(default)]
    pub total_token_estimate: u64,
    #[serde(default)]
    pub utilization: f64,
    #[serde(default)]
    pub redundant_discoveries: Vec<String>,
    #[serde(default)]
    pub prunable_items: Vec<String>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub next_sequence: u64,
}

impl ContextState {
    pub fn fresh(session_id: impl Into<String>, now: &str) -> Self {
        Self {
            session_id: session_id.into(),
            entries: EntryLog::default(),
            total_token_estimate: 0,
            utilization: 0.0,
            redundant_discoveries: Vec::new(),
            prunable_items: Vec::new(),
            last_updated: now.to_string(),
            next_sequence: 0,
        }
    }

    pub fn latest_redundancy(&self) -> Option<&str> {
        self.redundant_discoveries.last().map(String::as_str)
    }
}

fn detect_redundancy(
    state: &ContextState,
    hash: &str,
    source: &str,
    settings: &ContextSettings,
) -> Option<String> {
    if let Some(earlier) = state
        .entries
        .entries()
        .into_iter()
        .find(|entry| entry.content_hash == hash)
    {
        return Some(format!(
            "Same content as {} at {}",
            earlier.source,
            prefix(&earlier.timestamp, 10)
        ));
    }
    let seen = state
        .entries
        .iter()
        .filter(|entry| entry.source == source)
        .count();
    if seen >= settings.redundant_access_threshold {
        return Some(format!("Source {source} accessed {} times", seen + 1));
    }
    None
}

fn prunable_items(entries: &EntryLog, settings: &ContextSettings) -> Vec<String> {
    entries
        .entries()
        .into_iter()
        .filter_map(|entry| match entry.classification {
            InformationClass::Noise => Some(format!("[NOISE] {}", entry.summary)),
            InformationClass::Helpful if entry.token_estimate < settings.low_value_tokens => {
                Some(format!("[LOW-VALUE] {}", entry.summary))
            }
            _ => None,
        })
        .collect()
}

/// Record one event into `state`, returning at most one warning.
///
/// A high-utilization warning takes priority over a redundancy warning.
pub fn record(
    state: &mut ContextState,
    event: &Event,
    settings: &ContextSettings,
    now: &str,
) -> Option<String> {
    let result = event.result_text();
    let classified = classify_information(
        &event.kind,
        &event.parameters,
        &result,
        settings.tokens_per_char,
    );
    let hash = content_hash(&result);
    let source = source_descriptor(&event.kind, &event.parameters);

    let redundancy = detect_redundancy(state, &hash, &source, settings);
    if let Some(found) = &redundancy {
        state.redundant_discoveries.push(found.clone());
    }

    let sequence = state.next_sequence;
    state.next_sequence += 1;
    let mut metadata = Map::new();
    metadata.insert("tool_name".to_string(), Value::from(event.kind.as_str()));
    state.entries.push(ContextEntry {
        id: format!("{}-{sequence}", event.kind),
        sequence,
        timestamp: now.to_string(),
        source,
        classification: classified.class,
        summary: classified.summary,
        content_hash: hash,
        token_estimate: classified.tokens,
        metadata,
    });

    state.total_token_estimate += classified.tokens;
    state.utilization = utilization(state.total_token_estimate, settings.token_budget);
    state.prunable_items = prunable_items(&state.entries, settings);
    state.last_updated = now.to_string();
    state
        .entries
        .enforce(settings.entry_cap, settings.per_tier_retention);

    if state.utilization >= settings.high_water {
        Some(format!(
            "Context utilization HIGH ({}). Consider compacting.",
            percent(state.utilization)
        ))
    } else {
        redundancy.map(|found| format!("Redundant discovery: {found}"))
    }
}

fn utilization(tokens: u64, budget: u64) -> f64 {
    if budget == 0 {
        return 1.0;
    }
    (tokens as f64 / budget as f64).min(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssentialDiscovery {
    pub source: String,
    pub summary: String,
    pub timestamp: String,
}

/// The subset of context state that survives a memory reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssentialContext {
    pub essential_discoveries: Vec<EssentialDiscovery>,
    pub token_estimate: u64,
    pub utilization: f64,
}

/// Most recent `limit` essential entries plus aggregate usage.
pub fn extract_essential(state: &ContextState, limit: usize) -> EssentialContext {
    let essential: Vec<&ContextEntry> = state.entries.essential().rev().take(limit).collect();
    EssentialContext {
        essential_discoveries: essential
            .into_iter()
            .rev()
            .map(|entry| EssentialDiscovery {
                source: entry.source.clone(),
                summary: entry.summary.clone(),
                timestamp: entry.timestamp.clone(),
            })
            .collect(),
        token_estimate: state.total_token_estimate,
        utilization: state.utilization,
    }
}

/// Where utilization sits relative to the configured water marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilizationBand {
    Low,
    Target,
    High,
}

impl UtilizationBand {
    pub fn of(utilization: f64, settings: &ContextSettings) -> Self {
        if utilization >= settings.high_water {
            UtilizationBand::High
        } else if utilization < settings.low_water {
            UtilizationBand::Low
        } else {
            UtilizationBand::Target
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UtilizationBand::Low => "low",
            UtilizationBand::Target => "target",
            UtilizationBand::High => "high",
        }
    }
}

/// Human-readable summary of the context state.
pub fn summary(state: &ContextState, settings: &ContextSettings) -> String {
    let band = UtilizationBand::of(state.utilization, settings);
    let mut lines = vec![
        format!(
            "Context Utilization: {} ({})",
            percent(state.utilization),
            band.as_str()
        ),
        format!(
            "Entries: {} essential, {} helpful, {} noise",
            state.entries.count(InformationClass::Essential),
            state.entries.count(InformationClass::Helpful),
            state.entries.count(InformationClass::Noise),
        ),
        format!(
            "Estimated tokens: {}",
            group_thousands(state.total_token_estimate)
        ),
    ];
    if !state.redundant_discoveries.is_empty() {
        lines.push(format!(
            "Redundancies detected: {}",
            state.redundant_discoveries.len()
        ));
    }
    if !state.prunable_items.is_empty() {
        lines.push(format!("Prunable items: {}", state.prunable_items.len()));
    }
    lines.join("\n")
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
