// src/core/traits.rs — Strategy interfaces for the optimization loop

use async_trait::async_trait;

use super::types::{Budget, Candidate, EvaluationResult, JudgeVerdict, RunContext};
use crate::infra::errors::Result;

/// Produces and evolves candidate populations.
#[async_trait]
pub trait Generator: Send {
    /// Seed the initial population from the optimization target.
    async fn initialize(&mut self, target: &str, ctx: &RunContext) -> Result<Vec<Candidate>>;

    /// Produce the next generation from the survivors of the last round.
    /// An empty result stalls the search; the controller and budget end
    /// the run.
    async fn evolve(
        &mut self,
        selected: &[Candidate],
        evaluations: &[EvaluationResult],
        ctx: &RunContext,
    ) -> Result<Vec<Candidate>>;

    fn name(&self) -> &'static str;
}

/// Scores candidates. Recoverable evaluation failures become low-score
/// results; only contract violations and judge unavailability are errors.
#[async_trait]
pub trait Evaluator: Send {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult>;

    /// Sequential fallback. Implementations may override for staged or
    /// fanned-out evaluation, but the output must stay index-aligned with
    /// the input.
    async fn batch_evaluate(
        &mut self,
        candidates: &[Candidate],
        ctx: &RunContext,
    ) -> Result<Vec<EvaluationResult>> {
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            results.push(self.evaluate(candidate, ctx).await?);
        }
        Ok(results)
    }

    fn name(&self) -> &'static str;
}

/// Chooses survivors per round. Output must be a subset of the input.
pub trait Selector: Send {
    fn select(
        &mut self,
        candidates: &[Candidate],
        evaluations: &[EvaluationResult],
    ) -> Result<Vec<Candidate>>;

    fn name(&self) -> &'static str;
}

/// Drives iteration count and convergence-based stopping.
pub trait Controller: Send {
    /// Reset clocks and counters before a run.
    fn start(&mut self);

    /// Whether the budget permits starting iteration `iteration`.
    fn within_budget(&mut self, budget: &Budget, iteration: u32) -> bool;

    /// Convergence check after selection. Token accounting happens here,
    /// so the engine must call it exactly once per round.
    fn should_stop(
        &mut self,
        selected: &[Candidate],
        evaluations: &[EvaluationResult],
        iteration: u32,
    ) -> bool;

    fn name(&self) -> &'static str;
}

/// External semantic scoring oracle. `Ok(None)` means the judge produced
/// no verdict, which is fatal to that evaluation.
#[async_trait]
pub trait SemanticJudge: Send + Sync {
    async fn judge(
        &self,
        analysis_content: &str,
        expected: &str,
        actual: &str,
        knowledge: &str,
    ) -> Result<Option<JudgeVerdict>>;
}

/// External text-generation collaborator used to rewrite prompt sections.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    async fn rewrite(&self, instruction: &str) -> Result<String>;
}

/// Caller-supplied scoring hook applied to captured agent output.
#[async_trait]
pub trait OutputScorer: Send + Sync {
    async fn score(
        &self,
        actual: &str,
        exit_code: Option<i32>,
        ctx: &RunContext,
    ) -> Result<EvaluationResult>;
}
