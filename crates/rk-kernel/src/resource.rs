//! The `ResourceModel` trait — the extension point for resource kinds.

use rk_core::UpdateAlgorithm;
use rk_lmm::FairShareSolver;

use crate::{KernelError, KernelResult, Model};

/// A concrete resource kind (processor, link, storage, …) built around a
/// [`Model`].
///
/// The kind owns its model and decides what "an action reached its
/// completion date" means for its resource by overriding the
/// `update_actions_state_*` hook matching the algorithm it is configured
/// with.  Most kinds delegate to [`Model::finish_due_lazy`] and
/// [`Model::advance_full`].
///
/// # Required methods
///
/// [`name`][Self::name], [`model`][Self::model] and
/// [`model_mut`][Self::model_mut].  The two update hooks default to
/// [`KernelError::Unimplemented`], raised the first time the outer loop
/// reaches them.
///
/// # Example
///
/// ```rust,ignore
/// struct Cpu { model: Model<MaxMinSystem> }
///
/// impl ResourceModel for Cpu {
///     type Solver = MaxMinSystem;
///     fn name(&self) -> &str { "cpu" }
///     fn model(&self) -> &Model<MaxMinSystem> { &self.model }
///     fn model_mut(&mut self) -> &mut Model<MaxMinSystem> { &mut self.model }
///     fn update_actions_state_lazy(&mut self, now: f64, _delta: f64) -> KernelResult<()> {
///         self.model.finish_due_lazy(now, ActionState::Done).map(drop)
///     }
/// }
/// ```
pub trait ResourceModel {
    type Solver: FairShareSolver;

    /// Human-readable kind name, used in diagnostics.
    fn name(&self) -> &str;

    fn model(&self) -> &Model<Self::Solver>;

    fn model_mut(&mut self) -> &mut Model<Self::Solver>;

    /// Advance actions whose heap date equals `now`.
    fn update_actions_state_lazy(&mut self, _now: f64, _delta: f64) -> KernelResult<()> {
        Err(KernelError::Unimplemented {
            kind:      self.name().to_owned(),
            algorithm: UpdateAlgorithm::Lazy,
        })
    }

    /// Advance every running action by `delta`, finishing those that complete.
    fn update_actions_state_full(&mut self, _now: f64, _delta: f64) -> KernelResult<()> {
        Err(KernelError::Unimplemented {
            kind:      self.name().to_owned(),
            algorithm: UpdateAlgorithm::Full,
        })
    }

    /// Delta to this model's next event, or `None` if nothing is pending.
    fn next_occuring_event(&mut self, now: f64) -> Option<f64> {
        self.model_mut().next_occuring_event(now)
    }

    /// Dispatch to the hook of the configured algorithm.  `now` is the
    /// already-advanced clock.
    fn update_actions_state(&mut self, now: f64, delta: f64) -> KernelResult<()> {
        self.model_mut().set_now(now);
        match self.model().update_algorithm() {
            UpdateAlgorithm::Lazy => self.update_actions_state_lazy(now, delta),
            UpdateAlgorithm::Full => self.update_actions_state_full(now, delta),
        }
    }
}
