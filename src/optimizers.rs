// src/optimizers.rs — Preassembled engines for the two optimization tasks
//
// Callers supply the external collaborators (judge, rewriter); everything
// else is wired from configuration.

use std::time::Duration;

use crate::controllers::budget::{BudgetController, EarlyStoppingController};
use crate::core::engine::EvolutionEngine;
use crate::core::registry::ComponentRegistry;
use crate::core::traits::{SemanticJudge, TextRewriter};
use crate::evaluators::approximate::{ApproximateConfig, ApproximateEvaluator};
use crate::evaluators::judge::SemanticJudgeEvaluator;
use crate::evaluators::safe::SafeEvaluator;
use crate::evaluators::two_phase::{TwoPhaseConfig, TwoPhaseEvaluator};
use crate::generators::prompt_modifier::{PromptModifierConfig, PromptModifierGenerator};
use crate::generators::sim_inject::SimInjectGenerator;
use crate::infra::config::Config;
use crate::infra::errors::Result;
use crate::runtime::agent::AgentRuntime;
use crate::selectors::halving::{DynamicHalvingSelector, HalvingConfig, SuccessiveHalvingSelector};
use crate::selectors::topk::TopKSelector;

fn agent_runtime(config: &Config) -> AgentRuntime {
    AgentRuntime::new(config.runtime.program.clone())
        .with_timeout(Duration::from_secs(config.runtime.timeout_seconds))
}

fn exact_evaluator(judge: Option<Box<dyn SemanticJudge>>, config: &Config) -> SemanticJudgeEvaluator {
    SemanticJudgeEvaluator::new(judge)
        .with_executor(Box::new(SafeEvaluator::new(agent_runtime(config))))
}

/// Runtime-injection optimization: small populations of hint strings,
/// judge-driven evolution, top-k survival with early stopping.
pub fn sim_inject_engine(judge: Option<Box<dyn SemanticJudge>>, config: &Config) -> EvolutionEngine {
    EvolutionEngine::new(
        Box::new(SimInjectGenerator::default()),
        Box::new(exact_evaluator(judge, config)),
        Box::new(TopKSelector::new(config.selection.top_k)),
        Box::new(EarlyStoppingController::new(
            config.selection.patience,
            config.selection.min_improvement,
        )),
    )
}

/// Prompt-source optimization: larger rewritten-prompt populations,
/// staged cheap-then-exact evaluation, successive halving survival.
pub fn prompt_engine(
    rewriter: Box<dyn TextRewriter>,
    judge: Option<Box<dyn SemanticJudge>>,
    config: &Config,
) -> Result<EvolutionEngine> {
    let generator = PromptModifierGenerator::new(rewriter, PromptModifierConfig::default())?;

    let exact = exact_evaluator(judge, config);
    let evaluator: Box<dyn crate::core::traits::Evaluator> = if config.evaluation.two_phase {
        Box::new(TwoPhaseEvaluator::with_config(
            ApproximateEvaluator::new(ApproximateConfig {
                min_confidence: config.evaluation.min_confidence,
                max_candidates: config.evaluation.phase1_max_candidates,
                ..ApproximateConfig::default()
            }),
            Box::new(exact),
            TwoPhaseConfig {
                phase1_max_candidates: config.evaluation.phase1_max_candidates,
            },
        ))
    } else {
        Box::new(exact)
    };

    let selector = SuccessiveHalvingSelector::new(HalvingConfig {
        halving_ratio: config.selection.halving_ratio,
        min_candidates: config.selection.min_candidates,
        ..HalvingConfig::default()
    });

    Ok(EvolutionEngine::new(
        Box::new(generator),
        evaluator,
        Box::new(selector),
        Box::new(EarlyStoppingController::new(
            config.selection.patience,
            config.selection.min_improvement,
        )),
    ))
}

/// Registry preloaded with every component that needs no external
/// collaborator. Generators and exact evaluators require a judge or a
/// rewriter and are registered by the caller.
pub fn default_registry(config: &Config) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    let top_k = config.selection.top_k;
    registry.register_selector("topk", move || Box::new(TopKSelector::new(top_k)));

    let halving_ratio = config.selection.halving_ratio;
    let min_candidates = config.selection.min_candidates;
    registry.register_selector("halving", move || {
        Box::new(SuccessiveHalvingSelector::new(HalvingConfig {
            halving_ratio,
            min_candidates,
            ..HalvingConfig::default()
        }))
    });
    registry.register_selector("dynamic_halving", move || {
        Box::new(DynamicHalvingSelector::new(halving_ratio, min_candidates))
    });

    registry.register_controller("budget", || Box::new(BudgetController::new()));
    let patience = config.selection.patience;
    let min_improvement = config.selection.min_improvement;
    registry.register_controller("early_stopping", move || {
        Box::new(EarlyStoppingController::new(patience, min_improvement))
    });

    let min_confidence = config.evaluation.min_confidence;
    registry.register_evaluator("approximate", move || {
        Box::new(ApproximateEvaluator::new(ApproximateConfig {
            min_confidence,
            ..ApproximateConfig::default()
        }))
    });

    registry.register_generator("sim_inject", || Box::new(SimInjectGenerator::default()));

    registry
}
