// src/controllers/budget.rs — Budget-gated iteration and early stopping

use std::time::Instant;

use crate::core::traits::Controller;
use crate::core::types::{Budget, Candidate, EvaluationResult};

/// Controller that stops purely on budget exhaustion: iteration count,
/// wall-clock time, or accumulated token cost. `max_cost_usd` is declared
/// on `Budget` but not enforced here.
pub struct BudgetController {
    started_at: Option<Instant>,
    total_tokens: u64,
}

impl Default for BudgetController {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetController {
    pub fn new() -> Self {
        Self {
            started_at: None,
            total_tokens: 0,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    fn record_tokens(&mut self, evaluations: &[EvaluationResult]) {
        self.total_tokens += evaluations.iter().map(|e| e.cost_tokens).sum::<u64>();
    }

    fn budget_allows(&self, budget: &Budget, iteration: u32) -> bool {
        if let Some(max_iters) = budget.max_iters {
            if iteration >= max_iters {
                return false;
            }
        }
        if let Some(max_duration) = budget.max_duration {
            let elapsed = self
                .started_at
                .map(|t| t.elapsed())
                .unwrap_or_default();
            if elapsed >= max_duration {
                return false;
            }
        }
        if let Some(max_tokens) = budget.max_tokens {
            if self.total_tokens >= max_tokens {
                return false;
            }
        }
        true
    }
}

impl Controller for BudgetController {
    fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.total_tokens = 0;
    }

    fn within_budget(&mut self, budget: &Budget, iteration: u32) -> bool {
        self.budget_allows(budget, iteration)
    }

    fn should_stop(
        &mut self,
        _selected: &[Candidate],
        evaluations: &[EvaluationResult],
        _iteration: u32,
    ) -> bool {
        self.record_tokens(evaluations);
        false
    }

    fn name(&self) -> &'static str {
        "budget"
    }
}

/// Budget controller plus convergence-based early stopping: stops after
/// `patience` consecutive rounds without an improvement strictly greater
/// than `best + min_improvement`.
pub struct EarlyStoppingController {
    inner: BudgetController,
    patience: u32,
    min_improvement: f64,
    best_score: f64,
    rounds_without_improvement: u32,
}

impl EarlyStoppingController {
    pub fn new(patience: u32, min_improvement: f64) -> Self {
        Self {
            inner: BudgetController::new(),
            patience,
            min_improvement,
            best_score: 0.0,
            rounds_without_improvement: 0,
        }
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }
}

impl Controller for EarlyStoppingController {
    fn start(&mut self) {
        self.inner.start();
        self.best_score = 0.0;
        self.rounds_without_improvement = 0;
    }

    fn within_budget(&mut self, budget: &Budget, iteration: u32) -> bool {
        self.inner.within_budget(budget, iteration)
    }

    fn should_stop(
        &mut self,
        _selected: &[Candidate],
        evaluations: &[EvaluationResult],
        _iteration: u32,
    ) -> bool {
        self.inner.record_tokens(evaluations);

        if evaluations.is_empty() {
            return false;
        }

        let current_best = evaluations.iter().map(|e| e.score).fold(f64::MIN, f64::max);

        if current_best > self.best_score + self.min_improvement {
            self.best_score = current_best;
            self.rounds_without_improvement = 0;
        } else {
            self.rounds_without_improvement += 1;
        }

        self.rounds_without_improvement >= self.patience
    }

    fn name(&self) -> &'static str {
        "early_stopping"
    }
}
