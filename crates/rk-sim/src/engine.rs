//! The `Engine` struct and its event loop.

use rk_core::{ActionId, VirtualClock};
use rk_kernel::{ActionState, KernelError, ResourceModel};
use rk_lmm::{FairShareSolver, MaxMinSystem};
use tracing::{debug, info, trace};

use crate::{SimError, SimObserver, SimResult};

type Resource<S> = Box<dyn ResourceModel<Solver = S>>;

// ── Engine ────────────────────────────────────────────────────────────────────

/// The outer simulation loop.
///
/// `Engine<S>` owns the [`VirtualClock`] and every registered resource kind.
/// Each call to [`solve`][Self::solve] performs one step:
///
/// 1. **Next event**: ask every resource for the delta to its next event and
///    keep the smallest.
/// 2. **Advance**: move the clock by that delta (capped by `max_date`).
/// 3. **Update**: call [`ResourceModel::update_actions_state`] on every
///    resource, in registration order, with the advanced date.
/// 4. **Report**: drain each resource's DONE and FAILED collections into the
///    observer, so every terminated action is reported exactly once.
///
/// Create via [`EngineBuilder`][crate::EngineBuilder].
pub struct Engine<S: FairShareSolver + 'static = MaxMinSystem> {
    pub(crate) clock:            VirtualClock,
    pub(crate) stop_at:          Option<f64>,
    /// Drop the engine's reference to an action once it has been reported.
    pub(crate) release_finished: bool,
    pub(crate) resources:        Vec<Resource<S>>,
}

impl<S: FairShareSolver + 'static> Engine<S> {
    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn stop_at(&self) -> Option<f64> {
        self.stop_at
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, index: usize) -> SimResult<&(dyn ResourceModel<Solver = S> + 'static)> {
        self.resources
            .get(index)
            .map(Box::as_ref)
            .ok_or(SimError::UnknownResource(index))
    }

    /// Mutable access to a registered resource, e.g. to create actions
    /// between steps.
    pub fn resource_mut(
        &mut self,
        index: usize,
    ) -> SimResult<&mut (dyn ResourceModel<Solver = S> + 'static)> {
        self.resources
            .get_mut(index)
            .map(Box::as_mut)
            .ok_or(SimError::UnknownResource(index))
    }

    /// Register another resource kind mid-run.  Its model is aligned with the
    /// engine clock.  Returns its index.
    pub fn add_resource<R>(&mut self, mut resource: R) -> usize
    where
        R: ResourceModel<Solver = S> + 'static,
    {
        resource.model_mut().set_now(self.clock.now());
        self.resources.push(Box::new(resource));
        self.resources.len() - 1
    }

    // ── Event loop ────────────────────────────────────────────────────────

    /// Perform one step and return the new date, or `None` if nothing is
    /// pending before `max_date` (the clock is left untouched).
    ///
    /// With `max_date`, the clock never moves past it; when no event is
    /// pending the clock jumps straight to it.
    pub fn solve<O: SimObserver>(
        &mut self,
        max_date: Option<f64>,
        observer: &mut O,
    ) -> SimResult<Option<f64>> {
        if max_date.is_some_and(f64::is_nan) {
            return Err(SimError::Config("max_date must not be NaN".into()));
        }
        let now = self.clock.now();
        if max_date.is_some_and(|max| max <= now) {
            return Ok(None);
        }

        let mut next: Option<f64> = None;
        for resource in &mut self.resources {
            if let Some(delta) = resource.next_occuring_event(now) {
                trace!(resource = resource.name(), delta, "next event");
                next = Some(next.map_or(delta, |n| n.min(delta)));
            }
        }

        let delta = match (next, max_date) {
            (Some(d), Some(max)) => d.min(max - now),
            (Some(d), None) => d,
            (None, Some(max)) => max - now,
            (None, None) => {
                debug!(now, "no pending event");
                return Ok(None);
            }
        };

        let now = self.clock.advance(delta);
        debug!(now, delta, "clock advanced");
        observer.on_step(now, delta);

        for resource in &mut self.resources {
            resource
                .update_actions_state(now, delta)
                .map_err(|source| SimError::Kernel { resource: resource.name().to_owned(), source })?;
            report(resource.as_mut(), observer, self.release_finished)?;
        }
        Ok(Some(now))
    }

    /// Step until nothing is pending or the configured stop date is reached.
    /// Returns the final date.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<f64> {
        info!(resources = self.resources.len(), stop_at = ?self.stop_at, "simulation started");
        let mut steps = 0u64;
        while self.solve(self.stop_at, observer)?.is_some() {
            steps += 1;
        }
        let now = self.clock.now();
        observer.on_sim_end(now);
        info!(now, steps, "simulation finished");
        Ok(now)
    }
}

/// Hand every freshly terminated action of `resource` to the observer.
fn report<S, O>(
    resource: &mut dyn ResourceModel<Solver = S>,
    observer: &mut O,
    release:  bool,
) -> SimResult<()>
where
    S: FairShareSolver,
    O: SimObserver,
{
    while let Some(id) = extract(resource, ActionState::Done)? {
        if let Some(action) = resource.model().action(id) {
            observer.on_action_done(resource.name(), action);
        }
        if release {
            release_action(resource, id)?;
        }
    }
    while let Some(id) = extract(resource, ActionState::Failed)? {
        if let Some(action) = resource.model().action(id) {
            observer.on_action_failed(resource.name(), action);
        }
        if release {
            release_action(resource, id)?;
        }
    }
    Ok(())
}

fn extract<S: FairShareSolver>(
    resource: &mut dyn ResourceModel<Solver = S>,
    state:    ActionState,
) -> SimResult<Option<ActionId>> {
    let model = resource.model_mut();
    let extracted = match state {
        ActionState::Done => model.extract_done(),
        _ => model.extract_failed(),
    };
    extracted.map_err(|source| kernel_error(resource, source))
}

fn release_action<S: FairShareSolver>(
    resource: &mut dyn ResourceModel<Solver = S>,
    id:       ActionId,
) -> SimResult<()> {
    match resource.model_mut().unref(id) {
        Ok(_) => Ok(()),
        Err(source) => Err(kernel_error(resource, source)),
    }
}

fn kernel_error<S: FairShareSolver>(
    resource: &dyn ResourceModel<Solver = S>,
    source:   KernelError,
) -> SimError {
    SimError::Kernel { resource: resource.name().to_owned(), source }
}
