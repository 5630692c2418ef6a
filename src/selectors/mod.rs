// src/selectors/mod.rs — Survivor selection strategies

pub mod halving;
pub mod topk;
