// src/controllers/mod.rs — Iteration control strategies

pub mod budget;
