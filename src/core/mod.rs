// src/core/mod.rs — Engine, shared types, trait seams

pub mod context;
pub mod engine;
pub mod registry;
pub mod traits;
pub mod types;
