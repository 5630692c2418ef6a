// src/evaluators/two_phase.rs — Staged cheap-then-expensive evaluation
//
// Phase 1 screens every candidate with a cheap heuristic pass. Only the
// promising survivors, capped and ranked by screening score, reach the
// expensive phase-2 evaluator. Batch output stays index-aligned with the
// input: filtered-out candidates keep their phase-1 result.

use async_trait::async_trait;
use tracing::debug;

use super::approximate::ApproximateEvaluator;
use crate::core::traits::Evaluator;
use crate::core::types::{Candidate, EvaluationResult, RunContext};
use crate::infra::errors::Result;

#[derive(Debug, Clone)]
pub struct TwoPhaseConfig {
    /// Upper bound on candidates admitted to phase 2 per batch.
    pub phase1_max_candidates: usize,
}

impl Default for TwoPhaseConfig {
    fn default() -> Self {
        Self {
            phase1_max_candidates: 10,
        }
    }
}

/// Running counters for cost accounting across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TwoPhaseStats {
    pub phase1_evals: usize,
    pub phase2_evals: usize,
    pub phase2_skipped: usize,
    pub phase1_tokens: u64,
    pub phase2_tokens: u64,
}

pub struct TwoPhaseEvaluator {
    phase1: ApproximateEvaluator,
    phase2: Box<dyn Evaluator>,
    config: TwoPhaseConfig,
    stats: TwoPhaseStats,
}

impl TwoPhaseEvaluator {
    pub fn new(phase1: ApproximateEvaluator, phase2: Box<dyn Evaluator>) -> Self {
        Self::with_config(phase1, phase2, TwoPhaseConfig::default())
    }

    pub fn with_config(
        phase1: ApproximateEvaluator,
        phase2: Box<dyn Evaluator>,
        config: TwoPhaseConfig,
    ) -> Self {
        Self {
            phase1,
            phase2,
            config,
            stats: TwoPhaseStats::default(),
        }
    }

    pub fn stats(&self) -> TwoPhaseStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TwoPhaseStats::default();
    }

    pub(crate) fn set_phase2_cap(&mut self, cap: usize) {
        self.config.phase1_max_candidates = cap.max(1);
    }

    pub(crate) fn phase2_cap(&self) -> usize {
        self.config.phase1_max_candidates
    }

    /// Indices admitted to phase 2: promising only, ranked by phase-1
    /// score, capped.
    fn survivors(&self, phase1_results: &[EvaluationResult]) -> Vec<usize> {
        let mut promising: Vec<usize> = (0..phase1_results.len())
            .filter(|&i| phase1_results[i].promising)
            .collect();
        promising.sort_by(|&a, &b| {
            phase1_results[b]
                .score
                .partial_cmp(&phase1_results[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        promising.truncate(self.config.phase1_max_candidates);
        promising
    }
}

#[async_trait]
impl Evaluator for TwoPhaseEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        let screen = self.phase1.evaluate(candidate, ctx).await?;
        self.stats.phase1_evals += 1;
        self.stats.phase1_tokens += screen.cost_tokens;

        if !screen.promising {
            self.stats.phase2_skipped += 1;
            return Ok(screen);
        }

        let mut exact = self.phase2.evaluate(candidate, ctx).await?;
        self.stats.phase2_evals += 1;
        self.stats.phase2_tokens += exact.cost_tokens;
        exact
            .metadata
            .insert("phase1_score".into(), format!("{:.4}", screen.score));
        Ok(exact)
    }

    async fn batch_evaluate(
        &mut self,
        candidates: &[Candidate],
        ctx: &RunContext,
    ) -> Result<Vec<EvaluationResult>> {
        let phase1_results = self.phase1.batch_evaluate(candidates, ctx).await?;
        self.stats.phase1_evals += phase1_results.len();
        self.stats.phase1_tokens += phase1_results.iter().map(|r| r.cost_tokens).sum::<u64>();

        let survivors = self.survivors(&phase1_results);
        self.stats.phase2_skipped += candidates.len() - survivors.len();
        debug!(
            total = candidates.len(),
            survivors = survivors.len(),
            "phase-1 screening complete"
        );

        let mut results = phase1_results.clone();
        for &i in &survivors {
            let mut exact = self.phase2.evaluate(&candidates[i], ctx).await?;
            self.stats.phase2_evals += 1;
            self.stats.phase2_tokens += exact.cost_tokens;
            exact.metadata.insert(
                "phase1_score".into(),
                format!("{:.4}", phase1_results[i].score),
            );
            results[i] = exact;
        }
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "two_phase"
    }
}

/// Two-phase evaluation that tightens the phase-2 cap as the iteration
/// budget runs down. In the last 30% of planned iterations, the cap is
/// halved so the remaining budget goes to the strongest candidates.
pub struct AdaptiveTwoPhaseEvaluator {
    inner: TwoPhaseEvaluator,
    planned_iterations: u32,
    seen_batches: u32,
    base_cap: usize,
}

impl AdaptiveTwoPhaseEvaluator {
    pub fn new(inner: TwoPhaseEvaluator, planned_iterations: u32) -> Self {
        let base_cap = inner.phase2_cap();
        Self {
            inner,
            planned_iterations,
            seen_batches: 0,
            base_cap,
        }
    }

    fn adjust_cap(&mut self) {
        if self.planned_iterations == 0 {
            return;
        }
        let remaining = self
            .planned_iterations
            .saturating_sub(self.seen_batches) as f64
            / self.planned_iterations as f64;
        let cap = if remaining < 0.3 {
            (self.base_cap / 2).max(1)
        } else {
            self.base_cap
        };
        self.inner.set_phase2_cap(cap);
    }

    pub fn stats(&self) -> TwoPhaseStats {
        self.inner.stats()
    }
}

#[async_trait]
impl Evaluator for AdaptiveTwoPhaseEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        self.inner.evaluate(candidate, ctx).await
    }

    async fn batch_evaluate(
        &mut self,
        candidates: &[Candidate],
        ctx: &RunContext,
    ) -> Result<Vec<EvaluationResult>> {
        self.adjust_cap();
        self.seen_batches += 1;
        self.inner.batch_evaluate(candidates, ctx).await
    }

    fn name(&self) -> &'static str {
        "adaptive_two_phase"
    }
}
