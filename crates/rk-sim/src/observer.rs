//! Engine observer trait for progress reporting and completion collection.

use rk_kernel::Action;

/// Callbacks invoked by [`Engine::solve`][crate::Engine::solve] and
/// [`Engine::run`][crate::Engine::run].
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example — completion log
///
/// ```rust,ignore
/// struct Log(Vec<(f64, ActionId)>);
///
/// impl SimObserver for Log {
///     fn on_action_done(&mut self, _resource: &str, action: &Action) {
///         self.0.push((action.finish_time().unwrap_or_default(), action.id()));
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called after the clock moved to `now`, before any resource is updated.
    fn on_step(&mut self, _now: f64, _delta: f64) {}

    /// Called once per action that finished DONE during the last step.
    fn on_action_done(&mut self, _resource: &str, _action: &Action) {}

    /// Called once per action that finished FAILED during the last step
    /// (canceled, cut off by its deadline, or failed by its resource).
    fn on_action_failed(&mut self, _resource: &str, _action: &Action) {}

    /// Called once when [`Engine::run`][crate::Engine::run] returns.
    fn on_sim_end(&mut self, _now: f64) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
