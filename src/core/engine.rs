// src/core/engine.rs — Evolution optimization engine

use std::collections::HashMap;

use super::traits::{Controller, Evaluator, Generator, Selector};
use super::types::{
    Budget, Candidate, ComponentSet, EvaluationResult, IterationStats, OptimizationResult,
    RunContext, RunMetrics,
};
use crate::infra::errors::Result;

/// Generic Generate → Evaluate → Select → Iterate loop over interchangeable
/// strategy components. The engine carries no error handling of its own:
/// component errors propagate unmodified.
pub struct EvolutionEngine {
    generator: Box<dyn Generator>,
    evaluator: Box<dyn Evaluator>,
    selector: Box<dyn Selector>,
    controller: Box<dyn Controller>,
}

impl EvolutionEngine {
    pub fn new(
        generator: Box<dyn Generator>,
        evaluator: Box<dyn Evaluator>,
        selector: Box<dyn Selector>,
        controller: Box<dyn Controller>,
    ) -> Self {
        Self {
            generator,
            evaluator,
            selector,
            controller,
        }
    }

    fn components(&self) -> ComponentSet {
        ComponentSet {
            generator: self.generator.name().into(),
            evaluator: self.evaluator.name().into(),
            selector: self.selector.name().into(),
            controller: self.controller.name().into(),
        }
    }

    /// Run the optimization loop until the budget or the controller ends it.
    ///
    /// The final best candidate is taken from the last non-empty selection,
    /// not the historical maximum: optimization is not guaranteed monotonic
    /// and the survivors of the final round are what the caller can act on.
    pub async fn optimize(
        &mut self,
        target: &str,
        ctx: &RunContext,
        budget: &Budget,
    ) -> Result<OptimizationResult> {
        let mut population = self.generator.initialize(target, ctx).await?;
        if population.is_empty() {
            tracing::warn!("generator produced no initial candidates");
            return Ok(self.empty_result());
        }

        let mut history: Vec<IterationStats> = Vec::new();
        let mut final_selection: Vec<Candidate> = Vec::new();
        let mut final_evals: Vec<EvaluationResult> = Vec::new();

        self.controller.start();
        let mut iteration: u32 = 0;
        while self.controller.within_budget(budget, iteration) {
            let evaluations = self.evaluator.batch_evaluate(&population, ctx).await?;
            let selected = self.selector.select(&population, &evaluations)?;
            let selected_evals = map_selected_evaluations(&population, &evaluations, &selected);

            history.push(round_stats(iteration, &population, &evaluations));
            tracing::debug!(
                iteration,
                population = population.len(),
                selected = selected.len(),
                best = history.last().map(|h| h.best_score).unwrap_or(0.0),
                "round complete",
            );

            // Keep the last round that actually selected something, so a
            // stalled search reports the final real survivors.
            if !selected.is_empty() {
                final_selection = selected.clone();
                final_evals = selected_evals.clone();
            }

            if self
                .controller
                .should_stop(&selected, &selected_evals, iteration)
            {
                tracing::info!(iteration, "controller requested stop");
                break;
            }

            // An empty next generation is allowed: the loop keeps burning
            // budget on empty rounds until the controller ends the run.
            population = self.generator.evolve(&selected, &selected_evals, ctx).await?;
            iteration += 1;
        }

        let (best_candidate, best_score) = best_of(&final_selection, &final_evals);

        let total_cost_tokens = history.iter().map(|h| h.total_cost_tokens).sum();
        let score_improvement = match (history.first(), history.last()) {
            (Some(first), Some(last)) => last.best_score - first.best_score,
            _ => 0.0,
        };
        let metrics = RunMetrics {
            total_iterations: history.len(),
            total_cost_tokens,
            best_score,
            score_improvement,
        };

        Ok(OptimizationResult {
            best_candidate,
            best_score,
            history,
            metrics,
            components: self.components(),
        })
    }

    fn empty_result(&self) -> OptimizationResult {
        OptimizationResult {
            best_candidate: None,
            best_score: 0.0,
            history: Vec::new(),
            metrics: RunMetrics::default(),
            components: self.components(),
        }
    }
}

/// Map survivors back to their evaluations by candidate id. Evaluations are
/// never recomputed for selection bookkeeping.
fn map_selected_evaluations(
    population: &[Candidate],
    evaluations: &[EvaluationResult],
    selected: &[Candidate],
) -> Vec<EvaluationResult> {
    let index: HashMap<&str, usize> = population
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    selected
        .iter()
        .filter_map(|c| index.get(c.id.as_str()).map(|&i| evaluations[i].clone()))
        .collect()
}

fn round_stats(
    iteration: u32,
    population: &[Candidate],
    evaluations: &[EvaluationResult],
) -> IterationStats {
    let best_score = evaluations.iter().map(|e| e.score).fold(0.0, f64::max);
    let avg_score = if evaluations.is_empty() {
        0.0
    } else {
        evaluations.iter().map(|e| e.score).sum::<f64>() / evaluations.len() as f64
    };
    IterationStats {
        iteration,
        population_size: population.len(),
        best_score,
        avg_score,
        total_cost_tokens: evaluations.iter().map(|e| e.cost_tokens).sum(),
    }
}

fn best_of(
    selected: &[Candidate],
    evaluations: &[EvaluationResult],
) -> (Option<Candidate>, f64) {
    let mut best: Option<(usize, f64)> = None;
    for (i, eval) in evaluations.iter().enumerate() {
        if best.map(|(_, s)| eval.score > s).unwrap_or(true) {
            best = Some((i, eval.score));
        }
    }
    match best {
        Some((i, score)) if i < selected.len() => (Some(selected[i].clone()), score),
        _ => (None, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ExecutionContext;

    fn candidate(content: &str) -> Candidate {
        Candidate::new(
            content,
            ExecutionContext::Variable {
                base_path: None,
                variables: HashMap::new(),
            },
        )
    }

    #[test]
    fn test_map_selected_evaluations_by_id() {
        let population = vec![candidate("a"), candidate("b"), candidate("c")];
        let evaluations = vec![
            EvaluationResult::scored(0.1),
            EvaluationResult::scored(0.9),
            EvaluationResult::scored(0.5),
        ];
        let selected = vec![population[2].clone(), population[1].clone()];

        let mapped = map_selected_evaluations(&population, &evaluations, &selected);
        assert_eq!(mapped.len(), 2);
        assert!((mapped[0].score - 0.5).abs() < f64::EPSILON);
        assert!((mapped[1].score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_round_stats_empty_round() {
        let stats = round_stats(4, &[], &[]);
        assert_eq!(stats.population_size, 0);
        assert_eq!(stats.best_score, 0.0);
        assert_eq!(stats.avg_score, 0.0);
        assert_eq!(stats.total_cost_tokens, 0);
    }

    #[test]
    fn test_round_stats_aggregates_all_evaluations() {
        let population = vec![candidate("a"), candidate("b")];
        let evaluations = vec![
            EvaluationResult::scored(0.4).with_cost(10),
            EvaluationResult::scored(0.8).with_cost(30),
        ];
        let stats = round_stats(0, &population, &evaluations);
        assert!((stats.best_score - 0.8).abs() < f64::EPSILON);
        assert!((stats.avg_score - 0.6).abs() < f64::EPSILON);
        assert_eq!(stats.total_cost_tokens, 40);
    }

    #[test]
    fn test_best_of_empty() {
        let (best, score) = best_of(&[], &[]);
        assert!(best.is_none());
        assert_eq!(score, 0.0);
    }
}
