// src/evaluators/approximate.rs — Cheap heuristic scoring
//
// First stage of two-phase evaluation. Scores candidates from format
// compliance, keyword coverage, and character-level similarity to the
// expected answer, without touching any external process or model.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::traits::Evaluator;
use crate::core::types::{Candidate, EvalPhase, EvaluationResult, JudgeDetail, RunContext};
use crate::infra::errors::Result;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "in", "on", "at", "of", "to", "and", "or",
    "for", "with", "that", "this", "it", "as", "by", "be",
];

#[derive(Debug, Clone)]
pub struct ApproximateConfig {
    pub format_weight: f64,
    pub keyword_weight: f64,
    pub similarity_weight: f64,
    /// Scores below this flag the candidate as not promising.
    pub min_confidence: f64,
    /// Cap used by `filter_promising`.
    pub max_candidates: usize,
    pub extract_keywords: bool,
}

impl Default for ApproximateConfig {
    fn default() -> Self {
        Self {
            format_weight: 0.3,
            keyword_weight: 0.3,
            similarity_weight: 0.4,
            min_confidence: 0.3,
            max_candidates: 10,
            extract_keywords: true,
        }
    }
}

pub struct ApproximateEvaluator {
    config: ApproximateConfig,
    expected_keywords: HashSet<String>,
    format_patterns: Vec<Regex>,
}

impl Default for ApproximateEvaluator {
    fn default() -> Self {
        Self::new(ApproximateConfig::default())
    }
}

impl ApproximateEvaluator {
    pub fn new(config: ApproximateConfig) -> Self {
        Self {
            config,
            expected_keywords: HashSet::new(),
            format_patterns: Vec::new(),
        }
    }

    pub fn config(&self) -> &ApproximateConfig {
        &self.config
    }

    /// Derive keywords and format signals from the expected answer and
    /// question. Runs once, on the first evaluation.
    fn extract_expected_info(&mut self, ctx: &RunContext) {
        let text = format!("{} {} {}", ctx.expected, ctx.question, ctx.knowledge).to_lowercase();
        self.expected_keywords = words(&text)
            .into_iter()
            .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
            .collect();

        // Choice-letter answers (A/B/C/D)
        if choice_pattern().is_match(&ctx.expected) {
            self.format_patterns.push(choice_pattern().clone());
        }
        // Numeric values
        if numeric_pattern().is_match(&ctx.expected) {
            self.format_patterns.push(numeric_pattern().clone());
        }
        // List separators
        if ctx.expected.contains(',') || ctx.expected.contains(';') {
            self.format_patterns.push(separator_pattern().clone());
        }
    }

    fn format_score(&self, content: &str) -> f64 {
        if self.format_patterns.is_empty() {
            return 0.5; // no format signal, stay neutral
        }
        let matched = self
            .format_patterns
            .iter()
            .filter(|p| p.is_match(content))
            .count();
        matched as f64 / self.format_patterns.len() as f64
    }

    fn keyword_score(&self, content: &str) -> f64 {
        if self.expected_keywords.is_empty() {
            return 0.5;
        }
        let content_words: HashSet<String> = words(&content.to_lowercase()).into_iter().collect();
        let matched = self
            .expected_keywords
            .intersection(&content_words)
            .count();
        matched as f64 / self.expected_keywords.len() as f64
    }

    fn similarity_score(&self, content: &str, expected: &str) -> f64 {
        if expected.is_empty() {
            return 0.5;
        }
        strsim::normalized_levenshtein(&content.to_lowercase(), &expected.to_lowercase())
    }

    fn score_candidate(&mut self, candidate: &Candidate, ctx: &RunContext) -> EvaluationResult {
        if self.config.extract_keywords && self.expected_keywords.is_empty() {
            self.extract_expected_info(ctx);
        }

        let format = self.format_score(&candidate.content);
        let keywords = self.keyword_score(&candidate.content);
        let similarity = self.similarity_score(&candidate.content, &ctx.expected);

        let score = format * self.config.format_weight
            + keywords * self.config.keyword_weight
            + similarity * self.config.similarity_weight;
        let promising = score >= self.config.min_confidence;

        let detail = JudgeDetail {
            error_types: if promising {
                vec![]
            } else {
                vec!["approximate_low_confidence".into()]
            },
            action_vector: vec![
                format!("format_score: {format:.2}"),
                format!("keyword_score: {keywords:.2}"),
                format!("similarity_score: {similarity:.2}"),
            ],
            candidate_injects: vec![],
            rationale: format!(
                "heuristic screening, confidence {}",
                if promising { "high" } else { "low" }
            ),
            phase: Some(EvalPhase::Approx),
        };

        let mut result = EvaluationResult::scored(score)
            .with_cost(10)
            .with_detail(detail)
            .with_meta("evaluator", "approximate")
            .with_meta("format_score", format!("{format:.4}"))
            .with_meta("keyword_score", format!("{keywords:.4}"))
            .with_meta("similarity_score", format!("{similarity:.4}"));
        result.promising = promising;
        result
    }

    /// Keep only promising candidates, best first, capped at
    /// `max_candidates`. Used as the phase-1 filter of staged evaluation.
    pub fn filter_promising(
        &self,
        candidates: &[Candidate],
        evaluations: &[EvaluationResult],
    ) -> (Vec<Candidate>, Vec<EvaluationResult>) {
        let mut order: Vec<usize> = (0..candidates.len().min(evaluations.len())).collect();
        order.sort_by(|&a, &b| {
            evaluations[b]
                .score
                .partial_cmp(&evaluations[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept = Vec::new();
        let mut kept_evals = Vec::new();
        for &i in order.iter().take(self.config.max_candidates) {
            if evaluations[i].promising {
                kept.push(candidates[i].clone());
                kept_evals.push(evaluations[i].clone());
            }
        }
        (kept, kept_evals)
    }
}

#[async_trait]
impl Evaluator for ApproximateEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        Ok(self.score_candidate(candidate, ctx))
    }

    fn name(&self) -> &'static str {
        "approximate"
    }
}

fn choice_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-D]\b").expect("valid regex"))
}

fn numeric_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.?\d*").expect("valid regex"))
}

fn separator_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]").expect("valid regex"))
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// One explicit scoring rule for `RuleBasedApproximateEvaluator`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub pattern: Regex,
    pub weight: f64,
    pub required: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: &str, weight: f64, required: bool) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)
                .map_err(|e| crate::infra::errors::ShoalError::Config(e.to_string()))?,
            weight,
            required,
        })
    }
}

/// Scores against an explicit rule list instead of derived heuristics.
/// Any unmet required rule forces a near-zero score. With no rules it
/// falls back to the plain approximate evaluation.
pub struct RuleBasedApproximateEvaluator {
    inner: ApproximateEvaluator,
    rules: Vec<Rule>,
}

impl RuleBasedApproximateEvaluator {
    pub fn new(rules: Vec<Rule>, config: ApproximateConfig) -> Self {
        Self {
            inner: ApproximateEvaluator::new(config),
            rules,
        }
    }
}

#[async_trait]
impl Evaluator for RuleBasedApproximateEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        if self.rules.is_empty() {
            return self.inner.evaluate(candidate, ctx).await;
        }

        let mut total_score = 0.0;
        let mut total_weight = 0.0;
        let mut failed_required: Vec<String> = Vec::new();

        for rule in &self.rules {
            if rule.pattern.is_match(&candidate.content) {
                total_score += rule.weight;
            } else if rule.required {
                failed_required.push(rule.name.clone());
            }
            total_weight += rule.weight;
        }

        let (score, error_types) = if failed_required.is_empty() {
            let normalized = if total_weight > 0.0 {
                total_score / total_weight
            } else {
                0.5
            };
            (normalized, vec![])
        } else {
            (
                0.1,
                failed_required
                    .iter()
                    .map(|name| format!("missing_required_{name}"))
                    .collect(),
            )
        };

        let detail = JudgeDetail {
            error_types,
            action_vector: vec![format!("rule_score: {score:.2}")],
            candidate_injects: vec![],
            rationale: if failed_required.is_empty() {
                "all rules satisfied".into()
            } else {
                format!("unmet required rules: {failed_required:?}")
            },
            phase: Some(EvalPhase::Approx),
        };

        let mut result = EvaluationResult::scored(score)
            .with_cost(5)
            .with_detail(detail)
            .with_meta("evaluator", "rule_based_approximate");
        result.promising = score >= self.inner.config().min_confidence;
        if !failed_required.is_empty() {
            result = result.with_meta("failed_required", failed_required.join(","));
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "rule_based_approximate"
    }
}
