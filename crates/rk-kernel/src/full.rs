//! Full completion-date algorithm.
//!
//! Every step re-solves and rescans all RUNNING actions.  No heap is kept, so
//! there is nothing to invalidate when sharing parameters change; the price is
//! O(running actions) per step.

use rk_core::{ActionId, double_update};
use rk_lmm::FairShareSolver;
use tracing::debug;

use crate::{ActionState, KernelResult, Model, SuspendState};

impl<S: FairShareSolver> Model<S> {
    pub(crate) fn next_occuring_event_full(&mut self, now: f64) -> Option<f64> {
        self.solver.solve();
        self.stale.clear();

        let mut min: Option<f64> = None;
        for id in self.sets.iter(ActionState::Running) {
            let Some(action) = self.actions.get(&id) else {
                continue;
            };
            let share = action
                .variable
                .map_or(0.0, |v| self.solver.variable_granted_share(v));

            if share > 0.0 {
                let value = if action.remains > 0.0 { action.remains / share } else { 0.0 };
                if min.is_none_or(|m| value < m) {
                    min = Some(value);
                    debug!(%id, min = value, "updating min (work)");
                }
            }
            if let Some(deadline) = action.deadline() {
                let value = (deadline - now).max(0.0);
                if min.is_none_or(|m| value < m) {
                    min = Some(value);
                    debug!(%id, min = value, "updating min (duration)");
                }
            }
        }
        debug!(?min, "full scan complete");
        min
    }

    /// Standard full update: advance every RUNNING action by `delta` at its
    /// granted share, then finish those whose work is exhausted (DONE) or
    /// whose deadline has passed (`on_deadline`, `remains` left as is).
    ///
    /// `now` is the already-advanced clock.  Returns the actions that reached
    /// a terminal state, in collection order.
    pub fn advance_full(
        &mut self,
        now:         f64,
        delta:       f64,
        on_deadline: ActionState,
    ) -> KernelResult<Vec<ActionId>> {
        self.now = now;
        let precision = self.precision();
        let running: Vec<ActionId> = self.sets.iter(ActionState::Running).collect();
        let mut finished = Vec::new();

        for id in running {
            let Some(action) = self.actions.get_mut(&id) else {
                continue;
            };
            let share = action
                .variable
                .map_or(0.0, |v| self.solver.variable_granted_share(v));
            double_update(&mut action.remains, share * delta, precision.remains_epsilon());
            action.last_update = now;
            action.last_value = share;

            let active = action.sharing_priority > 0.0 && action.suspended == SuspendState::NotSuspended;
            let exhausted = active && action.remains <= 0.0;
            let expired = action.deadline().is_some_and(|d| d <= now + precision.surf);

            if exhausted {
                self.finish(id, ActionState::Done)?;
                debug!(%id, at = now, "action finished");
                finished.push(id);
            } else if expired {
                self.cut_off(id, on_deadline)?;
                debug!(%id, at = now, state = %on_deadline, "action cut off by its deadline");
                finished.push(id);
            }
        }
        Ok(finished)
    }
}
