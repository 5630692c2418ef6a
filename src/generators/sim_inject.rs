// src/generators/sim_inject.rs — Runtime injection candidate generation
//
// Candidates are hint strings injected into a fixed agent through a
// runtime variable. Evolution is driven by judge feedback: proposed
// injects are taken verbatim, and action vectors are appended to the
// best survivor as refinement directions.

use async_trait::async_trait;
use tracing::debug;

use crate::core::context::injection_context;
use crate::core::traits::Generator;
use crate::core::types::{Candidate, EvaluationResult, RunContext};
use crate::infra::errors::{Result, ShoalError};

pub const DEFAULT_INJECT_VAR: &str = "$injects";

/// Generic seeds used when the caller supplies no initial injects.
const FALLBACK_SEEDS: &[&str] = &[
    "Think step by step and verify each intermediate result before answering.",
    "Re-read the question and list every constraint before answering.",
    "Double-check units and boundary conditions in the final answer.",
];

#[derive(Debug, Clone)]
pub struct SimInjectConfig {
    pub inject_var: String,
    pub initial_size: usize,
}

impl Default for SimInjectConfig {
    fn default() -> Self {
        Self {
            inject_var: DEFAULT_INJECT_VAR.to_string(),
            initial_size: 3,
        }
    }
}

pub struct SimInjectGenerator {
    config: SimInjectConfig,
}

impl Default for SimInjectGenerator {
    fn default() -> Self {
        Self::new(SimInjectConfig::default())
    }
}

impl SimInjectGenerator {
    pub fn new(config: SimInjectConfig) -> Self {
        Self { config }
    }

    fn seed_candidate(&self, content: &str, ctx: &RunContext) -> Result<Candidate> {
        let agent_path = ctx
            .agent_path
            .as_ref()
            .ok_or_else(|| ShoalError::MissingContext("agent_path".into()))?;
        Ok(Candidate::new(
            content,
            injection_context(agent_path, &self.config.inject_var),
        )
        .with_meta("strategy", "seed"))
    }

    /// Index of the highest-scoring survivor.
    fn best_index(evaluations: &[EvaluationResult]) -> Option<usize> {
        (0..evaluations.len()).max_by(|&a, &b| {
            evaluations[a]
                .score
                .partial_cmp(&evaluations[b].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[async_trait]
impl Generator for SimInjectGenerator {
    async fn initialize(&mut self, target: &str, ctx: &RunContext) -> Result<Vec<Candidate>> {
        if target.trim().is_empty() {
            return Err(ShoalError::InvalidTarget(
                "injection optimization needs a non-empty task description".into(),
            ));
        }

        let mut seeds: Vec<String> = ctx
            .initial_injects
            .iter()
            .filter(|s| !s.trim().is_empty())
            .take(self.config.initial_size)
            .cloned()
            .collect();
        for fallback in FALLBACK_SEEDS {
            if seeds.len() >= self.config.initial_size {
                break;
            }
            seeds.push((*fallback).to_string());
        }

        debug!(count = seeds.len(), "seeding injection population");
        seeds
            .iter()
            .map(|s| self.seed_candidate(s, ctx))
            .collect()
    }

    async fn evolve(
        &mut self,
        selected: &[Candidate],
        evaluations: &[EvaluationResult],
        _ctx: &RunContext,
    ) -> Result<Vec<Candidate>> {
        let Some(best_idx) = Self::best_index(evaluations) else {
            return Ok(vec![]);
        };
        let Some(best) = selected.get(best_idx) else {
            return Ok(vec![]);
        };

        // The next population is entirely feedback-driven; survivors do
        // not carry over. The engine keeps the last real selection, so a
        // weaker generation cannot lose the best seen so far.
        let mut next = Vec::new();

        let detail = evaluations[best_idx].detail.as_ref();
        let injects: Vec<&String> = detail
            .map(|d| d.candidate_injects.iter().collect())
            .unwrap_or_default();

        if !injects.is_empty() {
            // Judge-proposed injects are used verbatim
            for inject in injects {
                next.push(
                    Candidate::new(inject.clone(), best.execution.clone())
                        .with_parent(best.id.clone())
                        .with_meta("strategy", "judge_inject"),
                );
            }
        } else if let Some(d) = detail.filter(|d| !d.action_vector.is_empty()) {
            // No concrete proposals; append the correction directions to
            // the best content instead.
            let content = format!("{}\n\n{}", best.content, d.action_vector.join("\n"));
            next.push(
                Candidate::new(content, best.execution.clone())
                    .with_parent(best.id.clone())
                    .with_meta("strategy", "action_append"),
            );
        }

        if next.is_empty() {
            // Nothing actionable in the feedback; the search has stalled.
            debug!("no judge feedback to evolve from");
        }
        Ok(next)
    }

    fn name(&self) -> &'static str {
        "sim_inject"
    }
}
