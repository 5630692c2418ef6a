// src/core/types.rs — Shared vocabulary for the optimization engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// File cleanup policy for temp-file execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Remove the file on every exit path.
    Auto,
    /// Never remove the file.
    Keep,
    /// Remove the file only when no error occurred.
    Conditional,
}

/// An in-memory content patch (memory-overlay mode, not yet executable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPatch {
    pub target: String,
    pub replacement: String,
}

/// Declares how a candidate should be executed during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Run the agent at `base_path` with a runtime variable override.
    /// `base_path` stays optional so pre-flight validation, not the type
    /// system, reports the missing-path case.
    Variable {
        base_path: Option<PathBuf>,
        variables: HashMap<String, String>,
    },
    /// Materialize the candidate content as a file and run it.
    TempFile {
        working_dir: Option<PathBuf>,
        file_template: Option<String>,
        cleanup_policy: CleanupPolicy,
        #[serde(default)]
        variables: HashMap<String, String>,
    },
    /// Pure in-memory patching. Declared for forward compatibility;
    /// evaluation of this mode is not implemented.
    MemoryOverlay { content_patches: Vec<ContentPatch> },
}

impl ExecutionContext {
    pub fn mode(&self) -> &'static str {
        match self {
            ExecutionContext::Variable { .. } => "variable",
            ExecutionContext::TempFile { .. } => "temp_file",
            ExecutionContext::MemoryOverlay { .. } => "memory_overlay",
        }
    }
}

/// One proposed solution plus how to execute it. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    pub execution: ExecutionContext,
    pub id: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Candidate {
    pub fn new(content: impl Into<String>, execution: ExecutionContext) -> Self {
        Self {
            content: content.into(),
            execution,
            id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
            parent_id: None,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Resource ceilings bounding one optimization run. Unset fields are
/// unbounded.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub max_iters: Option<u32>,
    pub max_duration: Option<Duration>,
    pub max_tokens: Option<u64>,
    pub max_cost_usd: Option<f64>,
}

impl Budget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn iters(mut self, n: u32) -> Self {
        self.max_iters = Some(n);
        self
    }

    pub fn seconds(mut self, secs: f64) -> Self {
        self.max_duration = Some(Duration::from_secs_f64(secs));
        self
    }

    pub fn tokens(mut self, n: u64) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn cost_usd(mut self, usd: f64) -> Self {
        self.max_cost_usd = Some(usd);
        self
    }
}

impl From<&crate::infra::config::BudgetConfig> for Budget {
    fn from(cfg: &crate::infra::config::BudgetConfig) -> Self {
        Self {
            max_iters: cfg.max_iters,
            max_duration: cfg.max_seconds.map(Duration::from_secs_f64),
            max_tokens: cfg.max_tokens,
            max_cost_usd: cfg.max_cost_usd,
        }
    }
}

/// Which evaluation stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalPhase {
    Approx,
    Exact,
}

/// Structured diagnostic detail attached to an evaluation. One tagged type
/// for every evaluator; validated at the evaluator boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgeDetail {
    pub error_types: Vec<String>,
    pub action_vector: Vec<String>,
    pub candidate_injects: Vec<String>,
    pub rationale: String,
    pub phase: Option<EvalPhase>,
}

/// Verdict returned by the external semantic judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub score: f64,
    pub correct: bool,
    #[serde(default)]
    pub error_types: Vec<String>,
    #[serde(default)]
    pub missing_constraints: Vec<String>,
    #[serde(default)]
    pub action_vector: Vec<String>,
    #[serde(default)]
    pub candidate_injects: Vec<String>,
    #[serde(default)]
    pub rationale: String,
}

/// Result of evaluating one candidate. Higher score is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: f64,
    pub cost_tokens: u64,
    pub cost_usd: Option<f64>,
    pub variance: Option<f64>,
    pub confidence: Option<f64>,
    /// Whether the candidate is worth an expensive follow-up evaluation.
    pub promising: bool,
    pub detail: Option<JudgeDetail>,
    /// Validation or execution failure carried as data, not as an error.
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl EvaluationResult {
    pub fn scored(score: f64) -> Self {
        Self {
            score,
            cost_tokens: 0,
            cost_usd: None,
            variance: None,
            confidence: None,
            promising: true,
            detail: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Zero-score result carrying a failure message in `error`.
    pub fn failed(message: impl Into<String>) -> Self {
        let mut r = Self::scored(0.0);
        r.promising = false;
        r.error = Some(message.into());
        r
    }

    pub fn with_cost(mut self, tokens: u64) -> Self {
        self.cost_tokens = tokens;
        self
    }

    pub fn with_detail(mut self, detail: JudgeDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One history row per engine round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationStats {
    pub iteration: u32,
    pub population_size: usize,
    pub best_score: f64,
    pub avg_score: f64,
    pub total_cost_tokens: u64,
}

/// Aggregate metrics over an optimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_iterations: usize,
    pub total_cost_tokens: u64,
    pub best_score: f64,
    /// Last-round best minus first-round best. Can be negative.
    pub score_improvement: f64,
}

/// Which concrete strategy filled each engine slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentSet {
    pub generator: String,
    pub evaluator: String,
    pub selector: String,
    pub controller: String,
}

/// Final result of one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub best_candidate: Option<Candidate>,
    pub best_score: f64,
    pub history: Vec<IterationStats>,
    pub metrics: RunMetrics,
    pub components: ComponentSet,
}

/// Typed run context shared by all components during one optimization.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub agent_path: Option<PathBuf>,
    pub expected: String,
    pub question: String,
    pub knowledge: String,
    pub analysis_content: String,
    pub initial_injects: Vec<String>,
    pub error_types: Vec<String>,
    pub case_id: Option<String>,
    pub knowledge_file: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub extra: HashMap<String, String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.agent_path = Some(path.into());
        self
    }

    pub fn expected(mut self, s: impl Into<String>) -> Self {
        self.expected = s.into();
        self
    }

    pub fn question(mut self, s: impl Into<String>) -> Self {
        self.question = s.into();
        self
    }

    pub fn knowledge(mut self, s: impl Into<String>) -> Self {
        self.knowledge = s.into();
        self
    }

    pub fn initial_injects(mut self, injects: Vec<String>) -> Self {
        self.initial_injects = injects;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Candidate ──────────────────────────────────────────────

    #[test]
    fn test_candidate_new() {
        let c = Candidate::new(
            "try harder",
            ExecutionContext::Variable {
                base_path: None,
                variables: HashMap::new(),
            },
        );
        assert_eq!(c.content, "try harder");
        assert_eq!(c.id.len(), 8);
        assert!(c.parent_id.is_none());
        assert!(c.metadata.is_empty());
    }

    #[test]
    fn test_candidate_unique_ids() {
        let ctx = ExecutionContext::Variable {
            base_path: None,
            variables: HashMap::new(),
        };
        let a = Candidate::new("a", ctx.clone());
        let b = Candidate::new("b", ctx);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_candidate_lineage() {
        let ctx = ExecutionContext::Variable {
            base_path: None,
            variables: HashMap::new(),
        };
        let parent = Candidate::new("p", ctx.clone());
        let child = Candidate::new("c", ctx)
            .with_parent(parent.id.clone())
            .with_meta("strategy", "semantic_gradient");
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(
            child.metadata.get("strategy").map(String::as_str),
            Some("semantic_gradient")
        );
    }

    // ─── ExecutionContext ───────────────────────────────────────

    #[test]
    fn test_execution_context_mode() {
        let v = ExecutionContext::Variable {
            base_path: None,
            variables: HashMap::new(),
        };
        let t = ExecutionContext::TempFile {
            working_dir: None,
            file_template: None,
            cleanup_policy: CleanupPolicy::Auto,
            variables: HashMap::new(),
        };
        let m = ExecutionContext::MemoryOverlay {
            content_patches: vec![],
        };
        assert_eq!(v.mode(), "variable");
        assert_eq!(t.mode(), "temp_file");
        assert_eq!(m.mode(), "memory_overlay");
    }

    #[test]
    fn test_execution_context_serde_tag() {
        let t = ExecutionContext::TempFile {
            working_dir: Some(PathBuf::from("/tmp/work")),
            file_template: Some("candidate_{timestamp}_{id}.dph".into()),
            cleanup_policy: CleanupPolicy::Conditional,
            variables: HashMap::new(),
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"mode\":\"temp_file\""));
        assert!(json.contains("\"cleanup_policy\":\"conditional\""));
    }

    // ─── Budget ─────────────────────────────────────────────────

    #[test]
    fn test_budget_unbounded() {
        let b = Budget::unbounded();
        assert!(b.max_iters.is_none());
        assert!(b.max_duration.is_none());
        assert!(b.max_tokens.is_none());
        assert!(b.max_cost_usd.is_none());
    }

    #[test]
    fn test_budget_builder() {
        let b = Budget::unbounded().iters(5).seconds(1.5).tokens(10_000);
        assert_eq!(b.max_iters, Some(5));
        assert_eq!(b.max_duration, Some(Duration::from_millis(1500)));
        assert_eq!(b.max_tokens, Some(10_000));
        assert!(b.max_cost_usd.is_none());
    }

    // ─── EvaluationResult ───────────────────────────────────────

    #[test]
    fn test_evaluation_result_scored() {
        let r = EvaluationResult::scored(0.7).with_cost(120);
        assert!((r.score - 0.7).abs() < f64::EPSILON);
        assert_eq!(r.cost_tokens, 120);
        assert!(r.promising);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_evaluation_result_failed() {
        let r = EvaluationResult::failed("missing base_path");
        assert_eq!(r.score, 0.0);
        assert!(!r.promising);
        assert_eq!(r.error.as_deref(), Some("missing base_path"));
    }

    // ─── JudgeVerdict ───────────────────────────────────────────

    #[test]
    fn test_judge_verdict_deserialize_minimal() {
        let v: JudgeVerdict = serde_json::from_str(r#"{"score": 0.8, "correct": true}"#).unwrap();
        assert!((v.score - 0.8).abs() < f64::EPSILON);
        assert!(v.correct);
        assert!(v.error_types.is_empty());
        assert!(v.candidate_injects.is_empty());
    }
}
