//! The `FairShareSolver` trait — the seam between the kernel and the
//! allocation numerics.

use rk_core::{ConstraintId, VariableId};

use crate::SolverResult;

/// A weighted max-min allocator over shared linear constraints.
///
/// Each *variable* is one demand.  It consumes `coefficient × share` of every
/// constraint it is attached to, and its share on a saturated constraint is
/// proportional to `1 / weight`.  A weight of `0` disables the demand: it is
/// excluded from the allocation and granted nothing.
///
/// The kernel only ever talks to the solver through this trait, so a model can
/// be wired to any implementation (the bundled [`MaxMinSystem`][crate::MaxMinSystem],
/// an instrumented wrapper in tests, or an external numeric library).
///
/// # Modified set
///
/// [`solve`][Self::solve] returns the *enabled* variables whose granted share
/// changed since the previous solve, plus those whose weight or bound was
/// updated in between, in ascending `VariableId` order.
pub trait FairShareSolver {
    /// Add a shared capacity.
    fn create_constraint(&mut self, capacity: f64) -> SolverResult<ConstraintId>;

    /// Change a capacity (e.g. a resource slowing down).
    fn update_constraint_capacity(&mut self, constraint: ConstraintId, capacity: f64) -> SolverResult<()>;

    /// Add a demand attached to `constraints` (`(constraint, coefficient)` pairs).
    fn create_variable(
        &mut self,
        constraints: &[(ConstraintId, f64)],
        weight:      f64,
        bound:       Option<f64>,
    ) -> SolverResult<VariableId>;

    fn update_variable_weight(&mut self, variable: VariableId, weight: f64) -> SolverResult<()>;

    fn update_variable_bound(&mut self, variable: VariableId, bound: Option<f64>) -> SolverResult<()>;

    /// Release a demand.
    ///
    /// # Panics
    /// Releasing a variable twice is an invariant violation and panics.
    fn variable_free(&mut self, variable: VariableId);

    /// Recompute every granted share and return the modified set.
    fn solve(&mut self) -> Vec<VariableId>;

    /// Share granted to `variable` by the last solve (`0.0` if unknown).
    fn variable_granted_share(&self, variable: VariableId) -> f64;

    fn variable_weight(&self, variable: VariableId) -> f64;

    fn variable_bound(&self, variable: VariableId) -> Option<f64>;

    /// Drop `variable` from the pending modified set, if present.
    fn forget_modified(&mut self, variable: VariableId);
}
