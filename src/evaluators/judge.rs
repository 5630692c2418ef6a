// src/evaluators/judge.rs — Exact scoring through an external semantic judge

use async_trait::async_trait;
use tracing::debug;

use crate::core::traits::{Evaluator, SemanticJudge};
use crate::core::types::{Candidate, EvalPhase, EvaluationResult, JudgeDetail, RunContext};
use crate::infra::errors::{Result, ShoalError};

/// Scores candidates by asking a semantic judge to compare the produced
/// answer against the expected one, with the failure analysis and domain
/// knowledge as grounding.
///
/// An optional execution backend runs the candidate first; its parsed
/// answer is what gets judged. Without one, the candidate content itself
/// is treated as the answer. A missing judge, or a judge that declines to
/// produce a verdict, is a hard error: exact evaluation cannot silently
/// degrade to a zero score.
pub struct SemanticJudgeEvaluator {
    judge: Option<Box<dyn SemanticJudge>>,
    executor: Option<Box<dyn Evaluator>>,
}

impl SemanticJudgeEvaluator {
    pub fn new(judge: Option<Box<dyn SemanticJudge>>) -> Self {
        Self {
            judge,
            executor: None,
        }
    }

    pub fn with_executor(mut self, executor: Box<dyn Evaluator>) -> Self {
        self.executor = Some(executor);
        self
    }

    fn token_cost(analysis: &str, actual: &str) -> u64 {
        (analysis.len() / 4 + actual.len() / 4) as u64 + 500
    }
}

#[async_trait]
impl Evaluator for SemanticJudgeEvaluator {
    async fn evaluate(
        &mut self,
        candidate: &Candidate,
        ctx: &RunContext,
    ) -> Result<EvaluationResult> {
        let judge = self.judge.as_ref().ok_or(ShoalError::JudgeUnavailable)?;

        let (actual, mut base_cost) = match &mut self.executor {
            Some(executor) => {
                let run = executor.evaluate(candidate, ctx).await?;
                if run.error.is_some() {
                    // Execution failed; nothing for the judge to look at.
                    return Ok(run);
                }
                let answer = run
                    .metadata
                    .get("answer")
                    .cloned()
                    .unwrap_or_else(|| candidate.content.clone());
                (answer, run.cost_tokens)
            }
            None => (candidate.content.clone(), 0),
        };

        let verdict = judge
            .judge(&ctx.analysis_content, &ctx.expected, &actual, &ctx.knowledge)
            .await?
            .ok_or(ShoalError::JudgeUnavailable)?;
        debug!(score = verdict.score, correct = verdict.correct, "judge verdict");

        base_cost += Self::token_cost(&ctx.analysis_content, &actual);
        let detail = JudgeDetail {
            error_types: verdict.error_types,
            action_vector: verdict.action_vector,
            candidate_injects: verdict.candidate_injects,
            rationale: verdict.rationale,
            phase: Some(EvalPhase::Exact),
        };

        Ok(EvaluationResult::scored(verdict.score)
            .with_cost(base_cost)
            .with_detail(detail)
            .with_meta("evaluator", "semantic_judge")
            .with_meta("correct", verdict.correct.to_string()))
    }

    fn name(&self) -> &'static str {
        "semantic_judge"
    }
}
