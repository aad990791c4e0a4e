//! `rk-lmm` — the fair-share solver seam of the `rk` kernel.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                      |
//! |-------------|---------------------------------------------------------------|
//! | [`solver`]  | `FairShareSolver` trait (what the kernel consumes)            |
//! | [`maxmin`]  | `MaxMinSystem` — weighted max-min progressive-filling solver  |
//! | [`error`]   | `SolverError`, `SolverResult<T>`                              |
//!
//! Models own exactly one solver instance each; nothing here is global.

pub mod error;
pub mod maxmin;
pub mod solver;

#[cfg(test)]
mod tests;

pub use error::{SolverError, SolverResult};
pub use maxmin::MaxMinSystem;
pub use solver::FairShareSolver;
