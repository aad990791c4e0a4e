//! Lazy completion-date algorithm.
//!
//! Only actions touched since the previous step are reconsidered:
//!
//! ```text
//! next_occuring_event_lazy(now):
//!   modified = solver.solve() ∪ stale
//!   for action in modified (ascending ActionId):
//!     skip unless RUNNING, weight > 0, not latency-scheduled
//!     resample remains at now                 (unless suspended or sleeping)
//!     date = now + remains / share            (if share > 0)
//!     date = start + max_duration             (if earlier, or no work date)
//!     heap.update(action, date, Normal | MaxDuration)
//!   return heap.top_date() - now
//! ```
//!
//! Actions whose share did not change keep their heap entry: with a constant
//! share, the date computed when it was last resampled is still exact.

use rk_core::{ActionId, double_update};
use rk_lmm::FairShareSolver;
use tracing::{debug, trace};

use crate::{ActionState, HeapEntry, HeapEntryKind, KernelResult, Model};

impl<S: FairShareSolver> Model<S> {
    pub(crate) fn next_occuring_event_lazy(&mut self, now: f64) -> Option<f64> {
        let modified = self.solver.solve();
        debug!(modified = modified.len(), stale = self.stale.len(), "lazy solve complete");

        let mut candidates = std::mem::take(&mut self.stale);
        candidates.extend(modified.iter().filter_map(|var| self.by_variable.get(var).copied()));

        for id in candidates {
            let Some(action) = self.actions.get(&id) else {
                continue;
            };
            if action.state != ActionState::Running
                || action.sharing_priority <= 0.0
                || action.heap_kind == HeapEntryKind::Latency
            {
                continue;
            }
            let consuming = action.is_consuming();
            let has_variable = action.variable.is_some();
            let weight = action.sharing_priority;

            self.update_remains_lazy(id, now);

            let Some(action) = self.actions.get(&id) else {
                continue;
            };
            let share = action
                .variable
                .map_or(0.0, |v| self.solver.variable_granted_share(v));

            let mut date = None;
            let mut kind = HeapEntryKind::Normal;
            if share > 0.0 {
                let time_to_completion =
                    if action.remains > 0.0 { action.remains / share } else { 0.0 };
                date = Some(now + time_to_completion);
            }
            if let Some(deadline) = action.deadline()
                && date.is_none_or(|d| deadline < d)
            {
                date = Some(deadline.max(now));
                kind = HeapEntryKind::MaxDuration;
            }

            trace!(
                %id,
                start = action.start_time,
                share,
                max_duration = ?action.max_duration,
                may_finish_at = ?date,
                "candidate completion date"
            );

            match date {
                Some(date) => self.heap_schedule(id, date, kind),
                None if consuming && has_variable => panic!(
                    "invariant violation: running action {id} with weight {weight} was resolved but has \
                     neither a positive share nor a deadline"
                ),
                // Suspended or sleeping without deadline, or not backed by the solver.
                None => {}
            }
        }

        match self.heap_top_date() {
            Some(top) => {
                debug!(min = top - now, "minimum with the heap");
                Some(top - now)
            }
            None => {
                debug!("heap is empty, no pending event");
                None
            }
        }
    }

    /// Resample `remains` at `now` using the share granted since the last
    /// sampling, then record the freshly solved share for the next interval.
    ///
    /// No-op unless the action is running, positively weighted and not
    /// suspended.
    pub(crate) fn update_remains_lazy(&mut self, id: ActionId, now: f64) {
        let epsilon = self.precision().remains_epsilon();
        let Some(action) = self.actions.get_mut(&id) else {
            return;
        };
        if !action.is_consuming() {
            return;
        }
        let delta = now - action.last_update;
        if action.remains > 0.0 {
            double_update(&mut action.remains, action.last_value * delta, epsilon);
        }
        action.last_update = now;
        action.last_value = action
            .variable
            .map_or(0.0, |v| self.solver.variable_granted_share(v));
        trace!(%id, remains = action.remains, share = action.last_value, "remains resampled");
    }

    /// Pop every heap entry due at `now` (within the time precision).
    ///
    /// The popped actions no longer have a heap entry; the caller decides
    /// what each entry kind means for its resource.
    pub fn pop_due(&mut self, now: f64) -> Vec<HeapEntry<ActionId>> {
        let surf = self.precision().surf;
        let mut due = Vec::new();
        while let Some(top) = self.heap_top_date()
            && top <= now + surf
        {
            let Some(entry) = self.heap.as_mut().and_then(|h| h.pop()) else {
                break;
            };
            if let Some(action) = self.actions.get_mut(&entry.item) {
                action.heap_handle = None;
                action.heap_kind = HeapEntryKind::NotSet;
            }
            due.push(entry);
        }
        due
    }

    /// Standard lazy completion: finish every action due at `now`.
    ///
    /// - `Normal` entries finish DONE (work exhausted);
    /// - `MaxDuration` entries are cut off into `on_deadline` with `remains`
    ///   frozen at its resampled value;
    /// - `Latency` entries are requeued for the next scan.
    ///
    /// Returns the actions that reached a terminal state, in pop order.
    pub fn finish_due_lazy(&mut self, now: f64, on_deadline: ActionState) -> KernelResult<Vec<ActionId>> {
        self.now = now;
        let mut finished = Vec::new();
        for entry in self.pop_due(now) {
            let id = entry.item;
            match entry.kind {
                HeapEntryKind::Normal | HeapEntryKind::NotSet => {
                    self.finish(id, ActionState::Done)?;
                    debug!(%id, at = now, "action finished");
                    finished.push(id);
                }
                HeapEntryKind::MaxDuration => {
                    self.update_remains_lazy(id, now);
                    self.cut_off(id, on_deadline)?;
                    debug!(%id, at = now, state = %on_deadline, "action cut off by its deadline");
                    finished.push(id);
                }
                HeapEntryKind::Latency => {
                    trace!(%id, "latency paid");
                    self.stale.insert(id);
                }
            }
        }
        Ok(finished)
    }
}
