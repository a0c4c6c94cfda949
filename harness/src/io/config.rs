//! Harness configuration stored under `.harness/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::artifact::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_OPEN_QUESTIONS, ResearchCriteria,
};
use crate::core::context::ContextSettings;
use crate::core::gate::{GateSettings, default_bookkeeping_paths};
use crate::core::types::Strictness;

/// Harness configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// `relaxed` | `standard` | `strict`.
    pub strictness: Strictness,
    pub gates: GatesConfig,
    pub context: ContextConfig,
    pub progress: ProgressConfig,
    pub delegation: DelegationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatesConfig {
    pub enabled: bool,
    /// Consult the phase before edits and writes.
    pub strict_gates: bool,
    pub research_confidence_threshold: f64,
    pub max_open_questions: usize,
    /// Minimum fraction of specific plan steps.
    pub min_specific_ratio: f64,
    /// Harness-owned paths that are always editable.
    pub bookkeeping_paths: Vec<String>,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_gates: true,
            research_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_open_questions: DEFAULT_MAX_OPEN_QUESTIONS,
            min_specific_ratio: 0.8,
            bookkeeping_paths: default_bookkeeping_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Record every action into the context state.
    pub tracking: bool,
    pub token_budget: u64,
    pub tokens_per_char: f64,
    pub utilization_low: f64,
    pub utilization_high: f64,
    pub entry_cap: usize,
    pub per_tier_retention: usize,
    pub essential_preserved: usize,
    /// Prior accesses of one source before the next access is redundant.
    pub redundant_access_threshold: usize,
    /// Entry count from which a compaction is suggested at high utilization.
    pub compaction_entry_threshold: usize,
    pub preserve_on_compact: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let settings = ContextSettings::default();
        Self {
            tracking: true,
            token_budget: settings.token_budget,
            tokens_per_char: settings.tokens_per_char,
            utilization_low: 0.40,
            utilization_high: settings.high_water,
            entry_cap: settings.entry_cap,
            per_tier_retention: settings.per_tier_retention,
            essential_preserved: settings.essential_preserved,
            redundant_access_threshold: settings.redundant_access_threshold,
            compaction_entry_threshold: 25,
            preserve_on_compact: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgressConfig {
    /// Append significant changes to the progress log.
    pub auto_log: bool,
    pub checkpoint_suggestions: bool,
    /// Accumulated change score that triggers a checkpoint suggestion.
    pub checkpoint_score: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            auto_log: true,
            checkpoint_suggestions: true,
            checkpoint_score: 5,
        }
    }
}

/// Prompt-time guidance toward research and planning subagents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DelegationConfig {
    pub enabled: bool,
    /// Suggest a research subagent for exploration prompts.
    pub auto_delegate_research: bool,
    /// Research trigger phrases; empty uses the built-in table.
    pub research_phrases: Vec<String>,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_delegate_research: true,
            research_phrases: Vec::new(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Standard,
            gates: GatesConfig::default(),
            context: ContextConfig::default(),
            progress: ProgressConfig::default(),
            delegation: DelegationConfig::default(),
        }
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{name} must be within [0, 1], got {value}"));
    }
    Ok(())
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        unit_interval(
            "gates.research_confidence_threshold",
            self.gates.research_confidence_threshold,
        )?;
        unit_interval("gates.min_specific_ratio", self.gates.min_specific_ratio)?;
        unit_interval("context.utilization_low", self.context.utilization_low)?;
        unit_interval("context.utilization_high", self.context.utilization_high)?;
        if self.context.utilization_low > self.context.utilization_high {
            return Err(anyhow!(
                "context.utilization_low must not exceed context.utilization_high"
            ));
        }
        if self.context.token_budget == 0 {
            return Err(anyhow!("context.token_budget must be > 0"));
        }
        if !(self.context.tokens_per_char > 0.0) {
            return Err(anyhow!("context.tokens_per_char must be > 0"));
        }
        if self.context.per_tier_retention == 0 {
            return Err(anyhow!("context.per_tier_retention must be > 0"));
        }
        if self.context.entry_cap < self.context.per_tier_retention {
            return Err(anyhow!(
                "context.entry_cap must be >= context.per_tier_retention"
            ));
        }
        if self.progress.checkpoint_score == 0 {
            return Err(anyhow!("progress.checkpoint_score must be > 0"));
        }
        if self
            .delegation
            .research_phrases
            .iter()
            .any(|phrase| phrase.trim().is_empty())
        {
            return Err(anyhow!("delegation.research_phrases must not contain blank entries"));
        }
        Ok(())
    }

    pub fn research_criteria(&self) -> ResearchCriteria {
        ResearchCriteria {
            confidence_threshold: self.gates.research_confidence_threshold,
            max_open_questions: self.gates.max_open_questions,
        }
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            enabled: self.gates.enabled,
            strict_gates: self.gates.strict_gates,
            strictness: self.strictness,
            research: self.research_criteria(),
            min_specific_ratio: self.gates.min_specific_ratio,
            bookkeeping_paths: self.gates.bookkeeping_paths.clone(),
        }
    }

    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            token_budget: self.context.token_budget,
            tokens_per_char: self.context.tokens_per_char,
            low_water: self.context.utilization_low,
            high_water: self.context.utilization_high,
            entry_cap: self.context.entry_cap,
            per_tier_retention: self.context.per_tier_retention,
            redundant_access_threshold: self.context.redundant_access_threshold,
            essential_preserved: self.context.essential_preserved,
            ..ContextSettings::default()
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
