//! Phase artifacts: research findings, plans, and implementation progress.
//!
//! Artifacts are plain data plus derived-status queries. Persistence lives in
//! `io::artifact_store`; nothing here touches the filesystem or the clock
//! (timestamps are passed in by callers).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::schema::CURRENT_SCHEMA_VERSION;

/// Default minimum research confidence before planning.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Default maximum open questions tolerated by a complete research artifact.
pub const DEFAULT_MAX_OPEN_QUESTIONS: usize = 2;

/// Artifact families, one directory each under `artifacts/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Research,
    Plan,
    Implementation,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Research,
        ArtifactKind::Plan,
        ArtifactKind::Implementation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Research => "research",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Implementation => "implementation",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface the artifact store needs from every artifact type.
pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: ArtifactKind;

    fn id(&self) -> &str;

    /// Stamp `updated_at` before persisting.
    fn touch(&mut self, now: &str);
}

/// Coarse rating used for question priority and risk likelihood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub source_locations: Vec<String>,
    /// e.g. "architecture", "pattern", "dependency".
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub purpose: String,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub question: String,
    pub priority: Rating,
    /// Whether this question blocks moving on to planning.
    pub blocking: bool,
}

/// Thresholds that decide whether research is complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResearchCriteria {
    pub confidence_threshold: f64,
    pub max_open_questions: usize,
}

impl Default for ResearchCriteria {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_open_questions: DEFAULT_MAX_OPEN_QUESTIONS,
        }
    }
}

/// Output of the research phase, input to planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub schema_version: u32,
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub task: String,
    pub discoveries: Vec<Discovery>,
    pub relevant_files: Vec<FileReference>,
    pub patterns_identified: Vec<String>,
    /// Requirement -> coverage status.
    pub requirements_addressed: BTreeMap<String, String>,
    pub open_questions: Vec<OpenQuestion>,
    pub research_sessions: u32,
    /// Overall confidence in `[0, 1]`.
    pub confidence_score: f64,
}

/// Counts describing how far research has progressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchStatus {
    pub is_complete: bool,
    pub confidence_score: f64,
    pub open_questions: usize,
    pub blocking_questions: usize,
    pub discoveries: usize,
    pub files_identified: usize,
}

impl ResearchArtifact {
    pub fn new(id: impl Into<String>, task: impl Into<String>, now: &str) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: id.into(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            task: task.into(),
            discoveries: Vec::new(),
            relevant_files: Vec::new(),
            patterns_identified: Vec::new(),
            requirements_addressed: BTreeMap::new(),
            open_questions: Vec::new(),
            research_sessions: 1,
            confidence_score: 0.0,
        }
    }

    /// Complete under the default thresholds (confidence >= 0.7, no blocking
    /// questions, at most two open questions).
    pub fn is_complete(&self) -> bool {
        self.is_complete_with(&ResearchCriteria::default())
    }

    pub fn is_complete_with(&self, criteria: &ResearchCriteria) -> bool {
        self.confidence_score >= criteria.confidence_threshold
            && self.blocking_questions().next().is_none()
            && self.open_questions.len() <= criteria.max_open_questions
    }

    pub fn blocking_questions(&self) -> impl Iterator<Item = &OpenQuestion> {
        self.open_questions.iter().filter(|q| q.blocking)
    }

    pub fn completion_status(&self, criteria: &ResearchCriteria) -> ResearchStatus {
        ResearchStatus {
            is_complete: self.is_complete_with(criteria),
            confidence_score: self.confidence_score,
            open_questions: self.open_questions.len(),
            blocking_questions: self.blocking_questions().count(),
            discoveries: self.discoveries.len(),
            files_identified: self.relevant_files.len(),
        }
    }

    /// Confidence only ever rises; values are clamped to `[0, 1]`.
    pub fn raise_confidence(&mut self, confidence: f64) {
        self.confidence_score = self.confidence_score.max(confidence.clamp(0.0, 1.0));
    }

    /// Append a discovery unless one with the same description exists.
    pub fn add_discovery(&mut self, discovery: Discovery) -> bool {
        if self
            .discoveries
            .iter()
            .any(|d| d.description == discovery.description)
        {
            return false;
        }
        self.discoveries.push(discovery);
        true
    }

    /// Append a file reference unless the path is already listed.
    pub fn add_file(&mut self, file: FileReference) -> bool {
        if self.relevant_files.iter().any(|f| f.path == file.path) {
            return false;
        }
        self.relevant_files.push(file);
        true
    }

    /// Append an open question unless the same text is already open.
    pub fn add_question(&mut self, question: OpenQuestion) -> bool {
        if self
            .open_questions
            .iter()
            .any(|q| q.question == question.question)
        {
            return false;
        }
        self.open_questions.push(question);
        true
    }
}

impl Artifact for ResearchArtifact {
    const KIND: ArtifactKind = ArtifactKind::Research;

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self, now: &str) {
        self.updated_at = now.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub files_affected: Vec<String>,
    /// Ids of steps that must complete first.
    pub dependencies: Vec<String>,
    /// How to verify the step is done.
    pub verification: String,
    /// Whether the step is concrete enough to act on.
    pub is_specific: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionStatus {
    #[default]
    Pending,
    Met,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub description: String,
    pub verification_method: String,
    pub status: CriterionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMitigation {
    pub risk: String,
    pub likelihood: Rating,
    pub mitigation: String,
}

/// Verdict of a plan review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Proceed,
    Revise,
    Block,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Proceed => "proceed",
            Recommendation::Revise => "revise",
            Recommendation::Block => "block",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub recommendation: Recommendation,
    /// Score in `[0, 10]`.
    pub completeness_score: f64,
    /// Requirement -> COVERED | MISSING | PARTIAL.
    pub coverage_analysis: BTreeMap<String, String>,
    pub missing_steps: Vec<String>,
    pub risks_identified: Vec<String>,
}

/// Output of the planning phase, input to implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanArtifact {
    pub schema_version: u32,
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub research_artifact_id: String,
    pub goal: String,
    pub approach: String,
    pub steps: Vec<PlanStep>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub risk_mitigations: Vec<RiskMitigation>,
    /// Files to modify, in order.
    pub file_order: Vec<String>,
    pub test_strategy: String,
    pub validation_result: Option<ValidationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStatus {
    pub is_actionable: bool,
    pub has_validation: bool,
    pub recommendation: Option<Recommendation>,
    pub total_steps: usize,
    pub specific_steps: usize,
    pub success_criteria: usize,
}

impl PlanArtifact {
    pub fn new(
        id: impl Into<String>,
        research_artifact_id: impl Into<String>,
        goal: impl Into<String>,
        approach: impl Into<String>,
        now: &str,
    ) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: id.into(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            research_artifact_id: research_artifact_id.into(),
            goal: goal.into(),
            approach: approach.into(),
            steps: Vec::new(),
            success_criteria: Vec::new(),
            risk_mitigations: Vec::new(),
            file_order: Vec::new(),
            test_strategy: String::new(),
            validation_result: None,
        }
    }

    /// Validated with `proceed` and every step specific.
    pub fn is_actionable(&self) -> bool {
        match &self.validation_result {
            Some(validation) => {
                validation.recommendation == Recommendation::Proceed
                    && self.steps.iter().all(|step| step.is_specific)
            }
            None => false,
        }
    }

    pub fn specific_steps(&self) -> usize {
        self.steps.iter().filter(|step| step.is_specific).count()
    }

    /// Fraction of specific steps; an empty plan counts as fully specific.
    pub fn specific_ratio(&self) -> f64 {
        if self.steps.is_empty() {
            return 1.0;
        }
        self.specific_steps() as f64 / self.steps.len() as f64
    }

    pub fn recommendation(&self) -> Option<Recommendation> {
        self.validation_result.as_ref().map(|v| v.recommendation)
    }

    pub fn actionability_status(&self) -> PlanStatus {
        PlanStatus {
            is_actionable: self.is_actionable(),
            has_validation: self.validation_result.is_some(),
            recommendation: self.recommendation(),
            total_steps: self.steps.len(),
            specific_steps: self.specific_steps(),
            success_criteria: self.success_criteria.len(),
        }
    }
}

impl Artifact for PlanArtifact {
    const KIND: ArtifactKind = ArtifactKind::Plan;

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self, now: &str) {
        self.updated_at = now.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDeviation {
    pub step_id: String,
    pub description: String,
    pub reason: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestsStatus {
    Passed,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplementationProgress {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub progress_percent: f64,
    pub in_progress: usize,
    pub deviations: usize,
    pub tests_status: TestsStatus,
}

/// Tracks implementation progress against a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationArtifact {
    pub schema_version: u32,
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub plan_artifact_id: String,
    pub steps_completed: Vec<String>,
    pub steps_in_progress: Vec<String>,
    pub files_modified: Vec<String>,
    pub tests_run: bool,
    pub tests_passed: bool,
    pub plan_deviations: Vec<PlanDeviation>,
}

impl ImplementationArtifact {
    pub fn new(id: impl Into<String>, plan_artifact_id: impl Into<String>, now: &str) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: id.into(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            plan_artifact_id: plan_artifact_id.into(),
            steps_completed: Vec::new(),
            steps_in_progress: Vec::new(),
            files_modified: Vec::new(),
            tests_run: false,
            tests_passed: false,
            plan_deviations: Vec::new(),
        }
    }

    pub fn tests_status(&self) -> TestsStatus {
        if self.tests_passed {
            TestsStatus::Passed
        } else if self.tests_run {
            TestsStatus::Failed
        } else {
            TestsStatus::NotRun
        }
    }

    pub fn progress(&self, plan: &PlanArtifact) -> ImplementationProgress {
        let total_steps = plan.steps.len();
        let completed_steps = self.steps_completed.len();
        let progress_percent = if total_steps > 0 {
            completed_steps as f64 / total_steps as f64 * 100.0
        } else {
            0.0
        };
        ImplementationProgress {
            total_steps,
            completed_steps,
            progress_percent,
            in_progress: self.steps_in_progress.len(),
            deviations: self.plan_deviations.len(),
            tests_status: self.tests_status(),
        }
    }

    /// Returns true if the path was not already recorded.
    pub fn record_file_modified(&mut self, path: &str) -> bool {
        if path.is_empty() || self.files_modified.iter().any(|p| p == path) {
            return false;
        }
        self.files_modified.push(path.to_string());
        true
    }

    pub fn record_test_run(&mut self, passed: bool) {
        self.tests_run = true;
        self.tests_passed = passed;
    }

    pub fn start_step(&mut self, step_id: &str) {
        if !self.steps_in_progress.iter().any(|s| s == step_id)
            && !self.steps_completed.iter().any(|s| s == step_id)
        {
            self.steps_in_progress.push(step_id.to_string());
        }
    }

    pub fn complete_step(&mut self, step_id: &str) {
        self.steps_in_progress.retain(|s| s != step_id);
        if !self.steps_completed.iter().any(|s| s == step_id) {
            self.steps_completed.push(step_id.to_string());
        }
    }

    pub fn record_deviation(&mut self, deviation: PlanDeviation) {
        self.plan_deviations.push(deviation);
    }
}

impl Artifact for ImplementationArtifact {
    const KIND: ArtifactKind = ArtifactKind::Implementation;

    fn id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self, now: &str) {
        self.updated_at = now.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plan_step, question, research_with};

    #[test]
    fn low_confidence_is_never_complete() {
        for confidence in [0.0, 0.3, 0.69, 0.6999] {
            let research = research_with(confidence, vec![], 5);
            assert!(!research.is_complete(), "confidence {confidence}");
        }
    }

    #[test]
    fn blocking_question_prevents_completion_at_full_confidence() {
        let research = research_with(1.0, vec![question("Which auth flow?", true)], 3);
        assert!(!research.is_complete());
    }

    #[test]
    fn too_many_open_questions_prevent_completion() {
        let questions = vec![
            question("q1", false),
            question("q2", false),
            question("q3", false),
        ];
        let research = research_with(0.9, questions, 3);
        assert!(!research.is_complete());

        let research = research_with(0.9, vec![question("q1", false), question("q2", false)], 3);
        assert!(research.is_complete());
    }

    #[test]
    fn completion_respects_custom_criteria() {
        let research = research_with(0.75, vec![], 1);
        let strict = ResearchCriteria {
            confidence_threshold: 0.8,
            max_open_questions: 0,
        };
        assert!(research.is_complete());
        assert!(!research.is_complete_with(&strict));
    }

    #[test]
    fn raise_confidence_never_lowers() {
        let mut research = research_with(0.6, vec![], 0);
        research.raise_confidence(0.4);
        assert_eq!(research.confidence_score, 0.6);
        research.raise_confidence(1.7);
        assert_eq!(research.confidence_score, 1.0);
    }

    #[test]
    fn plan_requires_proceed_and_specific_steps() {
        let mut plan = PlanArtifact::new("p", "r", "goal", "approach", "t");
        plan.steps = vec![plan_step("1", true), plan_step("2", true)];
        assert!(!plan.is_actionable(), "unvalidated plan is not actionable");

        plan.validation_result = Some(crate::test_support::validation(Recommendation::Proceed));
        assert!(plan.is_actionable());

        plan.steps.push(plan_step("3", false));
        assert!(!plan.is_actionable());
        assert!((plan.specific_ratio() - 2.0 / 3.0).abs() < 1e-9);

        plan.steps.pop();
        plan.validation_result = Some(crate::test_support::validation(Recommendation::Revise));
        assert!(!plan.is_actionable());
    }

    #[test]
    fn implementation_progress_against_plan() {
        let mut plan = PlanArtifact::new("p", "r", "goal", "approach", "t");
        plan.steps = vec![
            plan_step("1", true),
            plan_step("2", true),
            plan_step("3", true),
            plan_step("4", true),
        ];
        let mut implementation = ImplementationArtifact::new("i", "p", "t");
        implementation.start_step("1");
        implementation.complete_step("1");
        implementation.start_step("2");
        assert!(implementation.record_file_modified("src/lib.rs"));
        assert!(!implementation.record_file_modified("src/lib.rs"));

        let progress = implementation.progress(&plan);
        assert_eq!(progress.completed_steps, 1);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.progress_percent, 25.0);
        assert_eq!(progress.tests_status, TestsStatus::NotRun);

        implementation.record_test_run(false);
        assert_eq!(implementation.tests_status(), TestsStatus::Failed);
        implementation.record_test_run(true);
        assert_eq!(implementation.tests_status(), TestsStatus::Passed);
    }

    #[test]
    fn progress_of_empty_plan_is_zero() {
        let plan = PlanArtifact::new("p", "r", "goal", "approach", "t");
        let implementation = ImplementationArtifact::new("i", "p", "t");
        assert_eq!(implementation.progress(&plan).progress_percent, 0.0);
    }
}
