//! Fluent builder for constructing an [`Engine`].

use rk_core::VirtualClock;
use rk_kernel::ResourceModel;
use rk_lmm::{FairShareSolver, MaxMinSystem};

use crate::{Engine, SimError, SimResult};

/// Fluent builder for [`Engine<S>`].
///
/// # Optional inputs (have defaults)
///
/// | Method                   | Default                          |
/// |--------------------------|----------------------------------|
/// | `.start_at(t)`           | `0.0`                            |
/// | `.stop_at(t)`            | run until nothing is pending     |
/// | `.release_finished(b)`   | `true`                           |
/// | `.resource(r)`           | no resources                     |
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = EngineBuilder::new()
///     .resource(cpu)
///     .resource(link)
///     .stop_at(3600.0)
///     .build()?;
/// engine.run(&mut NoopObserver)?;
/// ```
pub struct EngineBuilder<S: FairShareSolver + 'static = MaxMinSystem> {
    start:            f64,
    stop_at:          Option<f64>,
    release_finished: bool,
    resources:        Vec<Box<dyn ResourceModel<Solver = S>>>,
}

impl<S: FairShareSolver + 'static> Default for EngineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FairShareSolver + 'static> EngineBuilder<S> {
    pub fn new() -> Self {
        Self {
            start:            0.0,
            stop_at:          None,
            release_finished: true,
            resources:        Vec::new(),
        }
    }

    /// Date the clock starts from.
    pub fn start_at(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    /// Date at which [`Engine::run`] stops even if events are still pending.
    pub fn stop_at(mut self, stop: f64) -> Self {
        self.stop_at = Some(stop);
        self
    }

    /// Whether the engine drops its reference to an action after reporting
    /// it.  Disable to keep terminated actions inspectable; they stay in
    /// their model, detached, until unreferenced.
    pub fn release_finished(mut self, release: bool) -> Self {
        self.release_finished = release;
        self
    }

    /// Register a resource kind.  Resources are updated in registration order.
    pub fn resource<R>(mut self, resource: R) -> Self
    where
        R: ResourceModel<Solver = S> + 'static,
    {
        self.resources.push(Box::new(resource));
        self
    }

    /// Validate the dates, align every model with the start date, and return
    /// a ready-to-run [`Engine`].
    pub fn build(self) -> SimResult<Engine<S>> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(SimError::Config(format!(
                "start date must be finite and non-negative, got {}",
                self.start
            )));
        }
        if let Some(stop) = self.stop_at
            && !(stop.is_finite() && stop >= self.start)
        {
            return Err(SimError::Config(format!(
                "stop date {stop} must be finite and not before the start date {}",
                self.start
            )));
        }

        let mut resources = self.resources;
        for resource in &mut resources {
            resource.model_mut().set_now(self.start);
        }

        Ok(Engine {
            clock:            VirtualClock::starting_at(self.start),
            stop_at:          self.stop_at,
            release_finished: self.release_finished,
            resources,
        })
    }
}
