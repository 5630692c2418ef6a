// src/selectors/topk.rs — Top-K selection by score

use crate::core::traits::Selector;
use crate::core::types::{Candidate, EvaluationResult};
use crate::infra::errors::{Result, ShoalError};

/// Keep the `k` highest-scoring candidates. Ties are stable: candidates
/// with equal scores keep their input order.
pub struct TopKSelector {
    k: usize,
}

impl TopKSelector {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Selector for TopKSelector {
    fn select(
        &mut self,
        candidates: &[Candidate],
        evaluations: &[EvaluationResult],
    ) -> Result<Vec<Candidate>> {
        if candidates.len() != evaluations.len() {
            return Err(ShoalError::LengthMismatch {
                candidates: candidates.len(),
                evaluations: evaluations.len(),
            });
        }

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            evaluations[b]
                .score
                .partial_cmp(&evaluations[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(order
            .into_iter()
            .take(self.k)
            .map(|i| candidates[i].clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "topk"
    }
}
