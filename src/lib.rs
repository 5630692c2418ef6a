// src/lib.rs — Shoal: evolutionary optimization for agent prompts and injections
//
// A Generate → Evaluate → Select → Iterate loop over pluggable strategy
// components. Candidates are prompt rewrites or runtime hint injections;
// evaluation ranges from cheap heuristics to sandboxed agent runs scored
// by an external semantic judge; budgets and early stopping bound every
// run.

pub mod controllers;
pub mod core;
pub mod evaluators;
pub mod generators;
pub mod infra;
pub mod optimizers;
pub mod runtime;
pub mod selectors;

pub use crate::core::engine::EvolutionEngine;
pub use crate::core::types::{
    Budget, Candidate, EvaluationResult, ExecutionContext, OptimizationResult, RunContext,
};
pub use crate::infra::errors::{Result, ShoalError};
