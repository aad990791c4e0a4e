//! `Model` — owner of every action of one resource kind.
//!
//! # Ownership
//!
//! A model exclusively owns:
//!
//! - its fair-share solver instance (`S: FairShareSolver`),
//! - the action arena (`ActionId → Action`),
//! - the state-tagged collections ([`ActionSets`]),
//! - under the lazy algorithm, the [`EventHeap`] of pending dates.
//!
//! Actions refer back to the solver only through their `VariableId` and to the
//! heap only through an optional [`HeapHandle`][crate::HeapHandle]; there are
//! no back-pointers and no process-wide tables.
//!
//! # Destruction order
//!
//! When the last reference to an action is released (`unref` reaching zero)
//! the model finalizes it in a fixed sequence: unlink from its collection,
//! remove the heap entry, release the solver variable, drop the record.

use std::collections::BTreeSet;

use rk_core::{ActionId, ConstraintId, KernelConfig, Precision, UpdateAlgorithm, VariableId};
use rk_lmm::FairShareSolver;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::{
    Action, ActionSets, ActionState, Completion, EventHeap, HeapEntryKind, KernelError,
    KernelResult, SuspendState,
};

/// Whether an action in `state` takes part in the allocation.  Only RUNNING
/// actions are admitted to the solver.
#[inline]
fn participates(state: ActionState) -> bool {
    state == ActionState::Running
}

fn check_non_negative(what: &str, value: f64) -> KernelResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(KernelError::InvalidArgument(format!(
            "{what} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Per-resource-kind action owner and completion-date engine.
pub struct Model<S: FairShareSolver> {
    config:                 KernelConfig,
    pub(crate) solver:      S,
    pub(crate) actions:     FxHashMap<ActionId, Action>,
    pub(crate) sets:        ActionSets,
    /// `Some` iff the model runs the lazy algorithm.
    pub(crate) heap:        Option<EventHeap<ActionId>>,
    /// Actions whose heap entry was invalidated by a kernel-side change the
    /// solver does not see (deadline edits, suspend, resume, re-entering
    /// RUNNING).  Merged into the modified set on the next lazy scan.
    pub(crate) stale:       BTreeSet<ActionId>,
    pub(crate) by_variable: FxHashMap<VariableId, ActionId>,
    next_id:                u64,
    pub(crate) now:         f64,
}

impl<S: FairShareSolver> Model<S> {
    /// Create a model.  The update algorithm is fixed for its whole lifetime.
    pub fn new(config: KernelConfig, solver: S) -> KernelResult<Self> {
        config.validate()?;
        let heap = match config.update_algorithm {
            UpdateAlgorithm::Lazy => Some(EventHeap::new()),
            UpdateAlgorithm::Full => None,
        };
        debug!(algorithm = %config.update_algorithm, "model created");
        Ok(Self {
            config,
            solver,
            actions: FxHashMap::default(),
            sets: ActionSets::new(),
            heap,
            stale: BTreeSet::new(),
            by_variable: FxHashMap::default(),
            next_id: 0,
            now: 0.0,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn update_algorithm(&self) -> UpdateAlgorithm {
        self.config.update_algorithm
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.config.update_algorithm == UpdateAlgorithm::Lazy
    }

    pub fn precision(&self) -> Precision {
        self.config.precision
    }

    /// The model's view of the virtual clock.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Align the model with the outer clock.  Called by the outer loop; also
    /// useful to resource kinds creating actions between steps.
    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Direct solver access for resource kinds (constraints, capacities).
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    pub fn get(&self, id: ActionId) -> KernelResult<&Action> {
        self.actions.get(&id).ok_or(KernelError::ActionNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: ActionId) -> KernelResult<&mut Action> {
        self.actions.get_mut(&id).ok_or(KernelError::ActionNotFound(id))
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.actions.contains_key(&id)
    }

    /// Number of live actions (tracked or detached).
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Members of the collection for `state`, oldest first.
    pub fn actions_in(&self, state: ActionState) -> impl Iterator<Item = ActionId> + '_ {
        self.sets.iter(state)
    }

    pub fn count(&self, state: ActionState) -> usize {
        self.sets.len(state)
    }

    pub fn sets(&self) -> &ActionSets {
        &self.sets
    }

    /// Number of pending heap entries (always `0` under the full algorithm).
    pub fn heap_len(&self) -> usize {
        self.heap.as_ref().map_or(0, EventHeap::len)
    }

    pub fn heap_top_date(&self) -> Option<f64> {
        self.heap.as_ref().and_then(EventHeap::top_date)
    }

    /// Date and kind of the pending heap entry of `id`, if any.
    pub fn heap_entry(&self, id: ActionId) -> Option<(f64, HeapEntryKind)> {
        let handle = self.actions.get(&id)?.heap_handle?;
        self.heap.as_ref()?.get(handle)
    }

    // ── Creation & reference counting ─────────────────────────────────────

    /// Create an action with no solver variable.
    pub fn create_action(&mut self, cost: f64, failed: bool) -> KernelResult<ActionId> {
        self.create_action_with_variable(cost, failed, None)
    }

    /// Create an action wrapping a variable the caller already configured.
    ///
    /// The action starts at `now` in RUNNING (or FAILED if `failed`).  Its
    /// sharing priority is read back from the variable's weight (`1.0` when
    /// there is no variable).
    pub fn create_action_with_variable(
        &mut self,
        cost:     f64,
        failed:   bool,
        variable: Option<VariableId>,
    ) -> KernelResult<ActionId> {
        check_non_negative("cost", cost)?;
        if let Some(var) = variable
            && let Some(owner) = self.by_variable.get(&var)
        {
            return Err(KernelError::InvalidArgument(format!(
                "{var} is already wrapped by {owner}"
            )));
        }

        let id = ActionId(self.next_id);
        self.next_id += 1;
        let state = if failed { ActionState::Failed } else { ActionState::Running };
        let weight = variable.map_or(1.0, |v| self.solver.variable_weight(v));
        if failed && let Some(var) = variable {
            self.solver.update_variable_weight(var, 0.0)?;
            self.solver.forget_modified(var);
        }

        self.actions.insert(id, Action::new(id, cost, state, variable, weight, self.now));
        self.sets.insert(state, id);
        if let Some(var) = variable {
            self.by_variable.insert(var, id);
        }
        debug!(%id, cost, %state, start = self.now, "action created");
        Ok(id)
    }

    /// Create a RUNNING action together with its solver variable.
    pub fn create_action_on(
        &mut self,
        cost:        f64,
        constraints: &[(ConstraintId, f64)],
        weight:      f64,
        bound:       Option<f64>,
    ) -> KernelResult<ActionId> {
        check_non_negative("cost", cost)?;
        check_non_negative("weight", weight)?;
        if let Some(b) = bound {
            check_positive_bound(b)?;
        }
        let var = self.solver.create_variable(constraints, weight, bound)?;
        self.create_action_with_variable(cost, false, Some(var))
    }

    /// Take an additional reference.  Returns the new count.
    pub fn ref_action(&mut self, id: ActionId) -> KernelResult<u32> {
        let action = self.get_mut(id)?;
        action.refcount += 1;
        Ok(action.refcount)
    }

    /// Release one reference.  Returns `true` if this destroyed the action.
    pub fn unref(&mut self, id: ActionId) -> KernelResult<bool> {
        let action = self.get_mut(id)?;
        action.refcount -= 1;
        if action.refcount > 0 {
            return Ok(false);
        }
        self.destroy(id);
        Ok(true)
    }

    fn destroy(&mut self, id: ActionId) {
        let Some(action) = self.actions.get_mut(&id) else {
            return;
        };
        let state = action.state;
        let variable = action.variable.take();

        self.sets.remove(state, id);
        self.drop_heap_entry(id);
        self.stale.remove(&id);
        if let Some(var) = variable {
            self.by_variable.remove(&var);
            self.solver.variable_free(var);
        }
        self.actions.remove(&id);
        debug!(%id, "action destroyed");
    }

    // ── State transitions ─────────────────────────────────────────────────

    /// Move `id` into the collection for `state`.
    ///
    /// This is the only place collection membership changes.  Leaving RUNNING
    /// drops any heap entry and withdraws the demand from the allocation
    /// (weight 0) while keeping its variable alive.  Entering RUNNING restores
    /// the weight, restarts the resampling interval at `now` and queues the
    /// action for the next lazy scan.
    pub fn set_state(&mut self, id: ActionId, state: ActionState) -> KernelResult<()> {
        let now = self.now;
        let action = self.actions.get_mut(&id).ok_or(KernelError::ActionNotFound(id))?;
        let old = action.state;
        self.sets.remove(old, id);
        self.sets.insert(state, id);
        action.state = state;

        let entering = !participates(old) && participates(state);
        if entering {
            action.last_update = now;
            action.last_value = 0.0;
        }
        let variable = action.variable;
        let weight = action.sharing_priority;
        let suspended = action.suspended != SuspendState::NotSuspended;
        trace!(%id, from = %old, to = %state, "state change");

        if state != ActionState::Running {
            self.drop_heap_entry(id);
            self.stale.remove(&id);
        }
        if let Some(var) = variable {
            if participates(old) && !participates(state) {
                self.solver.update_variable_weight(var, 0.0)?;
                self.solver.forget_modified(var);
            } else if entering && !suspended {
                self.solver.update_variable_weight(var, weight)?;
            }
        }
        if entering {
            self.invalidate(id);
        }
        Ok(())
    }

    /// Terminal transition: freeze `remains` at 0, stamp `finish_time`.
    pub fn finish(&mut self, id: ActionId, state: ActionState) -> KernelResult<()> {
        if !state.is_terminal() {
            return Err(KernelError::NotTerminal { action: id, state });
        }
        let now = self.now;
        let action = self.get_mut(id)?;
        action.finish_time = Some(now);
        action.remains = 0.0;
        action.completion = Some(match state {
            ActionState::Done => Completion::WorkExhausted,
            _ => Completion::ResourceFailure,
        });
        self.set_state(id, state)
    }

    /// Terminal transition caused by the deadline: `remains` keeps its
    /// (already resampled) value.
    pub(crate) fn cut_off(&mut self, id: ActionId, state: ActionState) -> KernelResult<()> {
        let now = self.now;
        let action = self.get_mut(id)?;
        action.finish_time = Some(now);
        action.completion = Some(Completion::Deadline);
        self.set_state(id, state)
    }

    /// Force the action to FAILED.  No-op on terminal or detached actions.
    pub fn cancel(&mut self, id: ActionId) -> KernelResult<()> {
        let now = self.now;
        let action = self.get_mut(id)?;
        if action.state.is_terminal() || action.state == ActionState::Detached {
            return Ok(());
        }
        action.completion = Some(Completion::Canceled);
        action.finish_time = Some(now);
        let variable = action.variable;

        self.set_state(id, ActionState::Failed)?;
        if self.is_lazy() {
            self.drop_heap_entry(id);
            if let Some(var) = variable {
                self.solver.forget_modified(var);
            }
        }
        debug!(%id, "action canceled");
        Ok(())
    }

    /// Detach the oldest DONE action, so it is reported once.
    pub fn extract_done(&mut self) -> KernelResult<Option<ActionId>> {
        self.extract(ActionState::Done)
    }

    /// Detach the oldest FAILED action, so it is reported once.
    pub fn extract_failed(&mut self) -> KernelResult<Option<ActionId>> {
        self.extract(ActionState::Failed)
    }

    fn extract(&mut self, state: ActionState) -> KernelResult<Option<ActionId>> {
        let Some(id) = self.sets.iter(state).next() else {
            return Ok(None);
        };
        self.set_state(id, ActionState::Detached)?;
        Ok(Some(id))
    }

    // ── Suspension ────────────────────────────────────────────────────────

    /// Withdraw the demand from the allocation without destroying it.
    pub fn suspend(&mut self, id: ActionId) -> KernelResult<()> {
        let action = self.get(id)?;
        if action.suspended == SuspendState::Sleeping {
            return Ok(());
        }
        let variable = action.variable;
        let consuming = action.is_consuming();

        if let Some(var) = variable {
            self.solver.update_variable_weight(var, 0.0)?;
        }
        if self.is_lazy() && consuming {
            self.update_remains_lazy(id, self.now);
        }
        let action = self.get_mut(id)?;
        action.last_value = 0.0;
        action.suspended = SuspendState::Suspended;
        // Only a deadline can end it now; the next scan reschedules on that.
        self.invalidate(id);
        trace!(%id, "action suspended");
        Ok(())
    }

    /// Restore the stored sharing priority at the solver.
    pub fn resume(&mut self, id: ActionId) -> KernelResult<()> {
        let action = self.get(id)?;
        if action.suspended == SuspendState::Sleeping {
            return Ok(());
        }
        let (variable, weight, state) = (action.variable, action.sharing_priority, action.state);

        if let Some(var) = variable
            && participates(state)
        {
            self.solver.update_variable_weight(var, weight)?;
        }
        self.get_mut(id)?.suspended = SuspendState::NotSuspended;
        self.invalidate(id);
        trace!(%id, "action resumed");
        Ok(())
    }

    pub fn is_suspended(&self, id: ActionId) -> KernelResult<bool> {
        Ok(self.get(id)?.is_suspended())
    }

    /// Mark a sleep-like action: it consumes nothing and only its deadline
    /// can complete it.  Suspend and resume ignore sleeping actions.
    pub fn set_sleeping(&mut self, id: ActionId) -> KernelResult<()> {
        let action = self.get(id)?;
        let (variable, consuming) = (action.variable, action.is_consuming());
        if self.is_lazy() && consuming {
            self.update_remains_lazy(id, self.now);
        }
        if let Some(var) = variable {
            self.solver.update_variable_weight(var, 0.0)?;
        }
        let action = self.get_mut(id)?;
        action.last_value = 0.0;
        action.suspended = SuspendState::Sleeping;
        self.invalidate(id);
        Ok(())
    }

    // ── Sharing parameters ────────────────────────────────────────────────

    /// Change the fairness weight.  `0` stops consumption without suspending.
    pub fn set_priority(&mut self, id: ActionId, weight: f64) -> KernelResult<()> {
        check_non_negative("weight", weight)?;
        if self.is_lazy() && self.get(id)?.is_consuming() {
            self.update_remains_lazy(id, self.now);
        }
        let action = self.get_mut(id)?;
        action.sharing_priority = weight;
        if weight == 0.0 {
            action.last_value = 0.0;
        }
        let push = participates(action.state) && action.suspended == SuspendState::NotSuspended;
        if let Some(var) = action.variable
            && push
        {
            self.solver.update_variable_weight(var, weight)?;
        }
        self.invalidate(id);
        trace!(%id, weight, "priority updated");
        Ok(())
    }

    /// Cap the granted share independently of the weight (`None` removes it).
    pub fn set_bound(&mut self, id: ActionId, bound: Option<f64>) -> KernelResult<()> {
        if let Some(b) = bound {
            check_positive_bound(b)?;
        }
        let now = self.now;
        let action = self.get(id)?;
        let sampled_now = action.last_update == now;
        let (variable, consuming) = (action.variable, action.is_consuming());

        if self.is_lazy() && consuming && !sampled_now {
            self.update_remains_lazy(id, now);
        }
        if let Some(var) = variable {
            self.solver.update_variable_bound(var, bound)?;
        }
        if !sampled_now {
            self.invalidate(id);
        }
        trace!(%id, ?bound, "bound updated");
        Ok(())
    }

    /// Current cap, read back from the solver variable.
    pub fn bound(&self, id: ActionId) -> KernelResult<Option<f64>> {
        Ok(self.get(id)?.variable.and_then(|v| self.solver.variable_bound(v)))
    }

    /// Overwrite the deadline (`start_time + duration`); `None` clears it.
    pub fn set_max_duration(&mut self, id: ActionId, duration: Option<f64>) -> KernelResult<()> {
        if let Some(d) = duration {
            check_non_negative("max_duration", d)?;
        }
        self.get_mut(id)?.max_duration = duration;
        self.invalidate(id);
        Ok(())
    }

    /// Share granted by the last solve.
    pub fn granted_share(&self, id: ActionId) -> KernelResult<f64> {
        Ok(self
            .get(id)?
            .variable
            .map_or(0.0, |v| self.solver.variable_granted_share(v)))
    }

    /// Remaining work.  Under the lazy algorithm the value is resampled at
    /// `now` first; under the full algorithm the stored value is current.
    pub fn remains(&mut self, id: ActionId) -> KernelResult<f64> {
        if self.is_lazy() && self.get(id)?.is_consuming() {
            self.update_remains_lazy(id, self.now);
        }
        Ok(self.get(id)?.remains)
    }

    // ── Heap helpers ──────────────────────────────────────────────────────

    /// Insert a fresh heap entry for `id` (replacing any existing one).
    ///
    /// For resource kinds scheduling their own entries (e.g. latency).
    pub fn heap_insert(&mut self, id: ActionId, date: f64, kind: HeapEntryKind) -> KernelResult<()> {
        self.check_schedulable(id, date)?;
        self.drop_heap_entry(id);
        self.heap_schedule(id, date, kind);
        Ok(())
    }

    /// Move the heap entry of `id`, inserting one if it has none.
    pub fn heap_update(&mut self, id: ActionId, date: f64, kind: HeapEntryKind) -> KernelResult<()> {
        self.check_schedulable(id, date)?;
        self.heap_schedule(id, date, kind);
        Ok(())
    }

    pub fn heap_remove(&mut self, id: ActionId) -> KernelResult<()> {
        if !self.is_lazy() {
            return Err(KernelError::HeapUnavailable(self.update_algorithm()));
        }
        self.get(id)?;
        self.drop_heap_entry(id);
        Ok(())
    }

    fn check_schedulable(&self, id: ActionId, date: f64) -> KernelResult<()> {
        if !self.is_lazy() {
            return Err(KernelError::HeapUnavailable(self.update_algorithm()));
        }
        if !date.is_finite() || date < self.now {
            return Err(KernelError::InvalidArgument(format!(
                "heap date must be finite and not before now ({}), got {date}",
                self.now
            )));
        }
        let action = self.get(id)?;
        if action.state != ActionState::Running || action.sharing_priority <= 0.0 {
            return Err(KernelError::InvalidArgument(format!(
                "{id} is {} with weight {}; only running, positively weighted actions are scheduled",
                action.state, action.sharing_priority
            )));
        }
        Ok(())
    }

    /// Update-or-insert the heap entry of `id`.  No-op under the full algorithm.
    pub(crate) fn heap_schedule(&mut self, id: ActionId, date: f64, kind: HeapEntryKind) {
        let (Some(heap), Some(action)) = (self.heap.as_mut(), self.actions.get_mut(&id)) else {
            return;
        };
        action.heap_kind = kind;
        match action.heap_handle {
            Some(handle) if heap.update(handle, date, kind) => {}
            _ => action.heap_handle = Some(heap.push(date, id.0, kind, id)),
        }
        trace!(%id, date, ?kind, "heap entry scheduled");
    }

    pub(crate) fn drop_heap_entry(&mut self, id: ActionId) {
        let Some(action) = self.actions.get_mut(&id) else {
            return;
        };
        action.heap_kind = HeapEntryKind::NotSet;
        if let (Some(handle), Some(heap)) = (action.heap_handle.take(), self.heap.as_mut()) {
            heap.remove(handle);
        }
    }

    /// Drop the pending date of `id` and queue it for the next lazy scan.
    fn invalidate(&mut self, id: ActionId) {
        if self.is_lazy() {
            self.drop_heap_entry(id);
            self.stale.insert(id);
        }
    }

    // ── Completion-date dispatch ──────────────────────────────────────────

    /// Delta from `now` to the next date at which one of this model's
    /// actions changes state, or `None` if nothing is pending.
    pub fn next_occuring_event(&mut self, now: f64) -> Option<f64> {
        self.now = now;
        match self.config.update_algorithm {
            UpdateAlgorithm::Lazy => self.next_occuring_event_lazy(now),
            UpdateAlgorithm::Full => self.next_occuring_event_full(now),
        }
    }
}

fn check_positive_bound(bound: f64) -> KernelResult<()> {
    if bound.is_nan() || bound <= 0.0 {
        return Err(KernelError::InvalidArgument(format!("bound must be positive, got {bound}")));
    }
    Ok(())
}
