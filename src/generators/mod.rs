// src/generators/mod.rs — Candidate generation strategies

pub mod prompt_modifier;
pub mod sim_inject;
