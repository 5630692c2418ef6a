// src/evaluators/mod.rs — Candidate scoring strategies
//
// Cheap screening (`approximate`), staged screening-then-exact
// (`two_phase`), sandboxed execution (`safe`), and judge-backed exact
// scoring (`judge`).

pub mod approximate;
pub mod judge;
pub mod safe;
pub mod two_phase;
