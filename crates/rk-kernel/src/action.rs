//! `Action` — one in-flight demand for a share of a resource's capacity.
//!
//! Actions are plain data owned by their [`Model`][crate::Model].  Every
//! mutation goes through the model (keyed by [`ActionId`]) because almost all
//! of them also touch the model's solver, event heap, or state collections.

use std::fmt;

use rk_core::{ActionId, VariableId};

use crate::{HeapEntryKind, HeapHandle};

// ── ActionState ───────────────────────────────────────────────────────────────

/// Lifecycle state.  Each state except `Detached` maps to exactly one of the
/// model's collections.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ActionState {
    /// Created but not yet admitted to the solver.
    Inited,
    /// Admitted, waiting to start.
    Ready,
    /// Consuming capacity.
    Running,
    /// Terminated unsuccessfully (resource failure, cancel, forced cutoff).
    Failed,
    /// Terminated successfully.
    Done,
    /// No longer tracked by any collection of its model.
    Detached,
}

impl ActionState {
    /// States backed by a model collection, in collection order.
    pub const TRACKED: [ActionState; 5] = [
        ActionState::Inited,
        ActionState::Ready,
        ActionState::Running,
        ActionState::Failed,
        ActionState::Done,
    ];

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionState::Failed | ActionState::Done)
    }

    /// Index of the backing collection, or `None` for `Detached`.
    #[inline]
    pub(crate) fn collection(self) -> Option<usize> {
        match self {
            ActionState::Inited   => Some(0),
            ActionState::Ready    => Some(1),
            ActionState::Running  => Some(2),
            ActionState::Failed   => Some(3),
            ActionState::Done     => Some(4),
            ActionState::Detached => None,
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionState::Inited   => "inited",
            ActionState::Ready    => "ready",
            ActionState::Running  => "running",
            ActionState::Failed   => "failed",
            ActionState::Done     => "done",
            ActionState::Detached => "detached",
        };
        f.write_str(s)
    }
}

/// Suspension tri-state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum SuspendState {
    #[default]
    NotSuspended,
    Suspended,
    /// Set by resource kinds for sleep-like actions; suspend/resume ignore it.
    Sleeping,
}

/// Why an action reached its terminal state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Completion {
    /// All work consumed.
    WorkExhausted,
    /// Cut off at `start_time + max_duration` with work possibly left.
    Deadline,
    /// `cancel()` was called.
    Canceled,
    /// Finished as FAILED by its resource kind.
    ResourceFailure,
}

// ── Action ────────────────────────────────────────────────────────────────────

/// Kernel-side record of one demand.
///
/// Read through the getters; mutate through [`Model`][crate::Model].
#[derive(Clone, Debug)]
pub struct Action {
    pub(crate) id:               ActionId,
    pub(crate) cost:             f64,
    pub(crate) remains:          f64,
    pub(crate) sharing_priority: f64,
    pub(crate) max_duration:     Option<f64>,
    pub(crate) start_time:       f64,
    pub(crate) finish_time:      Option<f64>,
    /// Date of the last lazy resampling of `remains`.
    pub(crate) last_update:      f64,
    /// Share granted over the interval since `last_update`.
    pub(crate) last_value:       f64,
    pub(crate) state:            ActionState,
    pub(crate) suspended:        SuspendState,
    pub(crate) refcount:         u32,
    pub(crate) heap_handle:      Option<HeapHandle>,
    pub(crate) heap_kind:        HeapEntryKind,
    pub(crate) variable:         Option<VariableId>,
    pub(crate) completion:       Option<Completion>,
}

impl Action {
    pub(crate) fn new(
        id:       ActionId,
        cost:     f64,
        state:    ActionState,
        variable: Option<VariableId>,
        weight:   f64,
        now:      f64,
    ) -> Self {
        Self {
            id,
            cost,
            remains: cost,
            sharing_priority: weight,
            max_duration: None,
            start_time: now,
            finish_time: None,
            last_update: now,
            last_value: 0.0,
            state,
            suspended: SuspendState::NotSuspended,
            refcount: 1,
            heap_handle: None,
            heap_kind: HeapEntryKind::NotSet,
            variable,
            completion: None,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Stored remaining work, without lazy resampling.
    ///
    /// Use [`Model::remains`][crate::Model::remains] for the up-to-date value.
    pub fn remains_no_update(&self) -> f64 {
        self.remains
    }

    pub fn sharing_priority(&self) -> f64 {
        self.sharing_priority
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.max_duration
    }

    /// `start_time + max_duration`, if a deadline is set.
    pub fn deadline(&self) -> Option<f64> {
        self.max_duration.map(|d| self.start_time + d)
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn suspend_state(&self) -> SuspendState {
        self.suspended
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended == SuspendState::Suspended
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// Kind of the pending heap entry (`NotSet` when none).
    pub fn heap_kind(&self) -> HeapEntryKind {
        self.heap_kind
    }

    pub fn has_heap_entry(&self) -> bool {
        self.heap_handle.is_some()
    }

    pub fn variable(&self) -> Option<VariableId> {
        self.variable
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    /// Whether the action should be resampled lazily right now.
    #[inline]
    pub(crate) fn is_consuming(&self) -> bool {
        self.state == ActionState::Running
            && self.sharing_priority > 0.0
            && self.suspended == SuspendState::NotSuspended
    }
}
