// src/runtime/mod.rs — Agent program execution

pub mod agent;
