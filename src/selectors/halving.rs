// src/selectors/halving.rs — Successive-halving selection family
//
// Inspired by Hyperband-style successive halving: each round keeps only the
// top fraction of the population, concentrating evaluation budget on the
// strongest candidates while optionally protecting a slice of diverse ones
// against premature convergence.

use crate::core::traits::Selector;
use crate::core::types::{Candidate, EvaluationResult};
use crate::infra::errors::{Result, ShoalError};

#[derive(Debug, Clone)]
pub struct HalvingConfig {
    /// Fraction of the population kept each round.
    pub halving_ratio: f64,
    /// Floor on the retained population size.
    pub min_candidates: usize,
    /// Whether to pad the survivors with diversity-protected candidates.
    pub diversity_boost: bool,
    /// Fraction of the target size reserved for diverse candidates.
    pub diversity_ratio: f64,
}

impl Default for HalvingConfig {
    fn default() -> Self {
        Self {
            halving_ratio: 0.5,
            min_candidates: 1,
            diversity_boost: true,
            diversity_ratio: 0.2,
        }
    }
}

pub struct SuccessiveHalvingSelector {
    config: HalvingConfig,
    round: u32,
}

impl Default for SuccessiveHalvingSelector {
    fn default() -> Self {
        Self::new(HalvingConfig::default())
    }
}

impl SuccessiveHalvingSelector {
    pub fn new(config: HalvingConfig) -> Self {
        Self { config, round: 0 }
    }

    /// Keeps only 30% per round, no diversity protection. For very large
    /// candidate pools.
    pub fn aggressive() -> Self {
        Self::new(HalvingConfig {
            halving_ratio: 0.3,
            min_candidates: 1,
            diversity_boost: false,
            diversity_ratio: 0.0,
        })
    }

    /// Keeps 70% per round with a 30% diversity slice. Preserves more
    /// exploration.
    pub fn conservative() -> Self {
        Self::new(HalvingConfig {
            halving_ratio: 0.7,
            min_candidates: 2,
            diversity_boost: true,
            diversity_ratio: 0.3,
        })
    }

    pub fn reset(&mut self) {
        self.round = 0;
    }

    /// Pick up to `count` candidates outside the already-selected set that
    /// come from distinct score bands and diverge from the survivors by
    /// lineage, declared direction, or content length.
    fn select_diverse(
        &self,
        candidates: &[Candidate],
        evaluations: &[EvaluationResult],
        already_selected: &[Candidate],
        count: usize,
    ) -> Vec<Candidate> {
        let selected_ids: Vec<&str> = already_selected.iter().map(|c| c.id.as_str()).collect();
        let pool: Vec<(&Candidate, &EvaluationResult)> = candidates
            .iter()
            .zip(evaluations.iter())
            .filter(|(c, _)| !selected_ids.contains(&c.id.as_str()))
            .collect();

        if pool.is_empty() {
            return Vec::new();
        }

        let mut diverse: Vec<Candidate> = Vec::new();
        for (lo, hi) in score_bands(evaluations, 3) {
            for (c, e) in &pool {
                if e.score < lo || e.score > hi {
                    continue;
                }
                // Zero-width bands revisit the same pool; never pick a
                // candidate twice.
                if diverse.iter().any(|d| d.id == c.id) {
                    continue;
                }
                if is_diverse(c, already_selected) {
                    diverse.push((*c).clone());
                    break;
                }
            }
            if diverse.len() >= count {
                break;
            }
        }

        diverse.truncate(count);
        diverse
    }
}

impl Selector for SuccessiveHalvingSelector {
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
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let current_size = candidates.len();
        let target_size = self
            .config
            .min_candidates
            .max((current_size as f64 * self.config.halving_ratio) as usize);

        let mut order: Vec<usize> = (0..current_size).collect();
        order.sort_by(|&a, &b| {
            evaluations[b]
                .score
                .partial_cmp(&evaluations[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selected: Vec<Candidate> = order
            .iter()
            .take(target_size)
            .map(|&i| candidates[i].clone())
            .collect();

        if self.config.diversity_boost && current_size > target_size {
            let diversity_count =
                ((target_size as f64 * self.config.diversity_ratio) as usize).max(1);
            let diverse = self.select_diverse(candidates, evaluations, &selected, diversity_count);
            selected.extend(diverse);
            // Cap with the same slice size the picks were budgeted from
            selected.truncate(target_size + diversity_count);
        }

        self.round += 1;
        tracing::debug!(
            round = self.round,
            from = current_size,
            to = selected.len(),
            "successive halving",
        );

        Ok(selected)
    }

    fn name(&self) -> &'static str {
        "successive_halving"
    }
}

/// Splits the observed score range into `n` contiguous bands.
fn score_bands(evaluations: &[EvaluationResult], n: usize) -> Vec<(f64, f64)> {
    if evaluations.is_empty() || n == 0 {
        return Vec::new();
    }
    let min = evaluations.iter().map(|e| e.score).fold(f64::MAX, f64::min);
    let max = evaluations.iter().map(|e| e.score).fold(f64::MIN, f64::max);
    let width = (max - min) / n as f64;

    (0..n)
        .map(|i| {
            let lo = min + i as f64 * width;
            (lo, lo + width)
        })
        .collect()
}

/// A candidate counts as diverse when its evolutionary path, declared
/// direction, or content length diverges from the selected set.
fn is_diverse(candidate: &Candidate, others: &[Candidate]) -> bool {
    if let Some(parent) = &candidate.parent_id {
        if !others.iter().any(|c| c.parent_id.as_ref() == Some(parent)) {
            return true;
        }
    }

    if let Some(direction) = candidate.metadata.get("direction") {
        if !direction.is_empty()
            && !others
                .iter()
                .any(|c| c.metadata.get("direction") == Some(direction))
        {
            return true;
        }
    }

    let lens: Vec<usize> = others.iter().map(|c| c.content.len()).collect();
    if !lens.is_empty() {
        let avg = lens.iter().sum::<usize>() as f64 / lens.len() as f64;
        if (candidate.content.len() as f64 - avg).abs() > avg * 0.2 {
            return true;
        }
    }

    false
}

/// Adjusts the retained fraction round by round from the score spread:
/// a wide spread means the ranking is informative, so cut harder; a tight
/// cluster means scores barely discriminate, so keep more and explore.
pub struct DynamicHalvingSelector {
    base_ratio: f64,
    min_candidates: usize,
    round: u32,
}

impl DynamicHalvingSelector {
    pub fn new(base_ratio: f64, min_candidates: usize) -> Self {
        Self {
            base_ratio,
            min_candidates,
            round: 0,
        }
    }

    pub fn reset(&mut self) {
        self.round = 0;
    }
}

impl Default for DynamicHalvingSelector {
    fn default() -> Self {
        Self::new(0.5, 1)
    }
}

impl Selector for DynamicHalvingSelector {
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
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let scores: Vec<f64> = evaluations.iter().map(|e| e.score).collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        let std_dev = variance.sqrt();

        let ratio = if std_dev > 0.2 {
            self.base_ratio * 0.8
        } else if std_dev < 0.05 {
            self.base_ratio * 1.2
        } else {
            self.base_ratio
        }
        .clamp(0.1, 0.9);

        let target_size = self
            .min_candidates
            .max((candidates.len() as f64 * ratio) as usize);

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let selected: Vec<Candidate> = order
            .iter()
            .take(target_size)
            .map(|&i| candidates[i].clone())
            .collect();

        self.round += 1;
        tracing::debug!(
            round = self.round,
            from = candidates.len(),
            to = selected.len(),
            ratio,
            std_dev,
            "dynamic halving",
        );

        Ok(selected)
    }

    fn name(&self) -> &'static str {
        "dynamic_halving"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Selector;
    use crate::core::types::ExecutionContext;
    use std::collections::HashMap;

    fn candidate(content: &str) -> Candidate {
        Candidate::new(
            content,
            ExecutionContext::Variable {
                base_path: None,
                variables: HashMap::new(),
            },
        )
    }

    fn population(n: usize) -> Vec<Candidate> {
        (0..n).map(|i| candidate(&format!("candidate {i}"))).collect()
    }

    fn evals(scores: &[f64]) -> Vec<EvaluationResult> {
        scores.iter().map(|&s| EvaluationResult::scored(s)).collect()
    }

    // ─── SuccessiveHalvingSelector ──────────────────────────────

    #[test]
    fn test_halves_population() {
        let mut s = SuccessiveHalvingSelector::new(HalvingConfig {
            diversity_boost: false,
            ..HalvingConfig::default()
        });
        let pop = population(8);
        let scores: Vec<f64> = (0..8).map(|i| i as f64 / 10.0).collect();
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        assert_eq!(selected.len(), 4);
        // Highest scorers survive
        assert_eq!(selected[0].content, "candidate 7");
    }

    #[test]
    fn test_retained_size_never_increases() {
        let mut s = SuccessiveHalvingSelector::aggressive();
        let mut pop = population(20);
        let mut last = pop.len();
        for round in 0..5 {
            let scores: Vec<f64> = (0..pop.len()).map(|i| (i + round) as f64 / 30.0).collect();
            pop = s.select(&pop, &evals(&scores)).unwrap();
            assert!(pop.len() <= last, "round {round}: {} > {last}", pop.len());
            last = pop.len();
        }
        assert_eq!(pop.len(), 1); // floor reached
    }

    #[test]
    fn test_min_candidates_floor() {
        let mut s = SuccessiveHalvingSelector::conservative();
        let pop = population(2);
        let selected = s.select(&pop, &evals(&[0.1, 0.9])).unwrap();
        assert_eq!(selected.len(), 2); // min_candidates=2 beats floor(2*0.7)=1
    }

    #[test]
    fn test_diversity_padding_bounded() {
        let mut s = SuccessiveHalvingSelector::new(HalvingConfig {
            halving_ratio: 0.5,
            min_candidates: 1,
            diversity_boost: true,
            diversity_ratio: 0.2,
        });
        let pop = population(10);
        let scores: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        // target 5 plus at most floor(5*0.2)=1 diversity pick
        assert!(selected.len() <= 6);
        assert!(selected.len() >= 5);
    }

    #[test]
    fn test_output_subset_with_diversity() {
        let mut s = SuccessiveHalvingSelector::default();
        let pop = population(10);
        let scores: Vec<f64> = (0..10).map(|i| i as f64 / 10.0).collect();
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        let ids: Vec<&str> = pop.iter().map(|c| c.id.as_str()).collect();
        assert!(selected.iter().all(|c| ids.contains(&c.id.as_str())));
        // No duplicates
        let mut seen: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), selected.len());
    }

    #[test]
    fn test_equal_scores_yield_unique_survivors() {
        // All-equal scores collapse every score band to zero width; the
        // diverse pick must still appear at most once in the output.
        let mut s = SuccessiveHalvingSelector::default();
        let parent = candidate("ancestor");
        let mut pop = population(20);
        pop[15] = pop[15].clone().with_parent(parent.id.clone());
        let scores = [0.5; 20];

        let selected = s.select(&pop, &evals(&scores)).unwrap();
        let mut ids: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), selected.len(), "duplicate candidate ids");
        assert_eq!(
            selected.iter().filter(|c| c.id == pop[15].id).count(),
            1
        );
    }

    #[test]
    fn test_small_target_keeps_one_diversity_pick() {
        // floor(target * diversity_ratio) is 0 here; the guaranteed single
        // diversity pick must survive the final cap.
        let mut s = SuccessiveHalvingSelector::default();
        let parent = candidate("ancestor");
        let mut pop = population(4);
        pop[2] = pop[2].clone().with_parent(parent.id.clone());

        let selected = s.select(&pop, &evals(&[0.9, 0.8, 0.2, 0.1])).unwrap();
        assert_eq!(selected.len(), 3); // target 2 + 1 diversity pick
        assert!(selected.iter().any(|c| c.id == pop[2].id));
    }

    #[test]
    fn test_length_mismatch_raises() {
        let mut s = SuccessiveHalvingSelector::default();
        let err = s.select(&population(3), &evals(&[0.1])).unwrap_err();
        assert!(matches!(err, ShoalError::LengthMismatch { .. }));
    }

    #[test]
    fn test_empty_input() {
        let mut s = SuccessiveHalvingSelector::default();
        assert!(s.select(&[], &[]).unwrap().is_empty());
    }

    // ─── is_diverse ─────────────────────────────────────────────

    #[test]
    fn test_distinct_lineage_is_diverse() {
        let parent_a = candidate("a");
        let parent_b = candidate("b");
        let selected = vec![candidate("x").with_parent(parent_a.id.clone())];
        let other = candidate("y").with_parent(parent_b.id.clone());
        assert!(is_diverse(&other, &selected));
    }

    #[test]
    fn test_distinct_direction_is_diverse() {
        let selected = vec![candidate("same length").with_meta("direction", "clarify steps")];
        let other = candidate("same length").with_meta("direction", "tighten format");
        assert!(is_diverse(&other, &selected));
    }

    #[test]
    fn test_same_everything_not_diverse() {
        let selected = vec![candidate("identical content")];
        let other = candidate("identical content");
        assert!(!is_diverse(&other, &selected));
    }

    // ─── DynamicHalvingSelector ─────────────────────────────────

    #[test]
    fn test_high_variance_narrows() {
        let mut s = DynamicHalvingSelector::new(0.5, 1);
        let pop = population(10);
        // Wide spread: std dev well above 0.2
        let scores = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        assert_eq!(selected.len(), 4); // 10 * 0.5 * 0.8
    }

    #[test]
    fn test_low_variance_widens() {
        let mut s = DynamicHalvingSelector::new(0.5, 1);
        let pop = population(10);
        let scores = [0.5; 10];
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        assert_eq!(selected.len(), 6); // 10 * 0.5 * 1.2
    }

    #[test]
    fn test_ratio_clamped() {
        let mut s = DynamicHalvingSelector::new(0.9, 1);
        let pop = population(10);
        let scores = [0.5; 10]; // would give 0.9 * 1.2 = 1.08, clamped to 0.9
        let selected = s.select(&pop, &evals(&scores)).unwrap();
        assert_eq!(selected.len(), 9);
    }

    #[test]
    fn test_dynamic_length_mismatch_raises() {
        let mut s = DynamicHalvingSelector::default();
        let err = s.select(&population(2), &evals(&[0.5])).unwrap_err();
        assert!(matches!(err, ShoalError::LengthMismatch { .. }));
    }
}
