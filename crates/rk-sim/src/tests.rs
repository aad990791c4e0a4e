//! Integration tests for rk-sim.

use rk_core::{ActionId, ConstraintId, KernelConfig, UpdateAlgorithm};
use rk_kernel::{Action, ActionState, Completion, KernelError, KernelResult, Model, ResourceModel};
use rk_lmm::{FairShareSolver, MaxMinSystem};

use crate::{EngineBuilder, NoopObserver, SimError, SimObserver};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Cpu {
    name:  &'static str,
    model: Model<MaxMinSystem>,
}

impl ResourceModel for Cpu {
    type Solver = MaxMinSystem;

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &Model<MaxMinSystem> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model<MaxMinSystem> {
        &mut self.model
    }

    fn update_actions_state_lazy(&mut self, now: f64, _delta: f64) -> KernelResult<()> {
        self.model.finish_due_lazy(now, ActionState::Failed).map(drop)
    }

    fn update_actions_state_full(&mut self, now: f64, delta: f64) -> KernelResult<()> {
        self.model.advance_full(now, delta, ActionState::Failed).map(drop)
    }
}

struct Unfinished {
    model: Model<MaxMinSystem>,
}

impl ResourceModel for Unfinished {
    type Solver = MaxMinSystem;

    fn name(&self) -> &str {
        "unfinished"
    }

    fn model(&self) -> &Model<MaxMinSystem> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model<MaxMinSystem> {
        &mut self.model
    }
}

fn cpu(name: &'static str, algorithm: UpdateAlgorithm, capacity: f64) -> (Cpu, ConstraintId) {
    let mut model = Model::new(KernelConfig::new(algorithm), MaxMinSystem::new()).unwrap();
    let c = model.solver_mut().create_constraint(capacity).unwrap();
    (Cpu { name, model }, c)
}

#[derive(Default)]
struct Recorder {
    steps:  Vec<f64>,
    done:   Vec<(String, ActionId, f64)>,
    failed: Vec<(String, ActionId, Option<Completion>, f64)>,
    ended:  Option<f64>,
}

impl SimObserver for Recorder {
    fn on_step(&mut self, now: f64, _delta: f64) {
        self.steps.push(now);
    }

    fn on_action_done(&mut self, resource: &str, action: &Action) {
        self.done.push((resource.to_owned(), action.id(), action.finish_time().unwrap()));
    }

    fn on_action_failed(&mut self, resource: &str, action: &Action) {
        self.failed.push((
            resource.to_owned(),
            action.id(),
            action.completion(),
            action.remains_no_update(),
        ));
    }

    fn on_sim_end(&mut self, now: f64) {
        self.ended = Some(now);
    }
}

// ── EngineBuilder validation ──────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let engine = EngineBuilder::<MaxMinSystem>::new().build().unwrap();
        assert_eq!(engine.now(), 0.0);
        assert_eq!(engine.resource_count(), 0);
        assert_eq!(engine.stop_at(), None);
    }

    #[test]
    fn negative_start_errors() {
        let result = EngineBuilder::<MaxMinSystem>::new().start_at(-1.0).build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn stop_before_start_errors() {
        let result = EngineBuilder::<MaxMinSystem>::new().start_at(5.0).stop_at(2.0).build();
        assert!(matches!(result, Err(SimError::Config(_))));
        let result = EngineBuilder::<MaxMinSystem>::new().stop_at(f64::NAN).build();
        assert!(result.is_err());
    }

    #[test]
    fn models_aligned_with_start_date() {
        let (cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 1.0);
        let mut engine = EngineBuilder::new().start_at(3.0).resource(cpu).build().unwrap();
        let model = engine.resource_mut(0).unwrap().model_mut();
        assert_eq!(model.now(), 3.0);
        let id = model.create_action_on(1.0, &[(c, 1.0)], 1.0, None).unwrap();
        assert_eq!(model.get(id).unwrap().start_time(), 3.0);
        assert!(matches!(engine.resource(1), Err(SimError::UnknownResource(1))));
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn single_resource_runs_to_completion() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 10.0);
        let id = cpu.model.create_action_on(100.0, &[(c, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
        let mut rec = Recorder::default();

        assert_eq!(engine.run(&mut rec).unwrap(), 10.0);
        assert_eq!(rec.done, vec![("cpu".to_owned(), id, 10.0)]);
        assert!(rec.failed.is_empty());
        assert_eq!(rec.steps, vec![10.0]);
        assert_eq!(rec.ended, Some(10.0));
        // Reported actions are released by default.
        assert!(engine.resource(0).unwrap().model().is_empty());
    }

    #[test]
    fn resources_with_different_algorithms_interleave() {
        let (mut slow, c0) = cpu("lazy", UpdateAlgorithm::Lazy, 1.0);
        let (mut fast, c1) = cpu("full", UpdateAlgorithm::Full, 1.0);
        let a = slow.model.create_action_on(10.0, &[(c0, 1.0)], 1.0, None).unwrap();
        let b = fast.model.create_action_on(5.0, &[(c1, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new().resource(slow).resource(fast).build().unwrap();
        let mut rec = Recorder::default();

        engine.run(&mut rec).unwrap();
        assert_eq!(rec.steps, vec![5.0, 10.0]);
        assert_eq!(
            rec.done,
            vec![("full".to_owned(), b, 5.0), ("lazy".to_owned(), a, 10.0)]
        );
    }

    #[test]
    fn stop_date_leaves_work_pending() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 10.0);
        let id = cpu.model.create_action_on(100.0, &[(c, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new().resource(cpu).stop_at(4.0).build().unwrap();

        assert_eq!(engine.run(&mut NoopObserver).unwrap(), 4.0);
        let model = engine.resource_mut(0).unwrap().model_mut();
        assert_eq!(model.get(id).unwrap().state(), ActionState::Running);
        assert!((model.remains(id).unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn deadline_reported_as_failure_with_remaining_work() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Full, 10.0);
        let id = cpu.model.create_action_on(100.0, &[(c, 1.0)], 1.0, None).unwrap();
        cpu.model.set_max_duration(id, Some(5.0)).unwrap();
        let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
        let mut rec = Recorder::default();

        assert_eq!(engine.run(&mut rec).unwrap(), 5.0);
        assert!(rec.done.is_empty());
        assert_eq!(rec.failed.len(), 1);
        let (_, failed, completion, remains) = &rec.failed[0];
        assert_eq!(*failed, id);
        assert_eq!(*completion, Some(Completion::Deadline));
        assert!((remains - 50.0).abs() < 1e-9);
    }

    #[test]
    fn suspended_action_still_fails_at_its_deadline() {
        for algorithm in [UpdateAlgorithm::Lazy, UpdateAlgorithm::Full] {
            let (mut cpu, c) = cpu("cpu", algorithm, 10.0);
            let id = cpu.model.create_action_on(100.0, &[(c, 1.0)], 1.0, None).unwrap();
            cpu.model.set_max_duration(id, Some(5.0)).unwrap();
            cpu.model.suspend(id).unwrap();
            let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
            let mut rec = Recorder::default();

            assert_eq!(engine.run(&mut rec).unwrap(), 5.0, "{algorithm}");
            assert_eq!(rec.failed.len(), 1, "{algorithm}");
            let (_, failed, completion, remains) = &rec.failed[0];
            assert_eq!(*failed, id);
            assert_eq!(*completion, Some(Completion::Deadline));
            assert_eq!(*remains, 100.0);
        }
    }

    #[test]
    fn canceled_action_reported_once_on_next_step() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 1.0);
        let a = cpu.model.create_action_on(1.0, &[(c, 1.0)], 1.0, None).unwrap();
        let b = cpu.model.create_action_on(1.0, &[(c, 1.0)], 1.0, None).unwrap();
        cpu.model.cancel(b).unwrap();
        let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
        let mut rec = Recorder::default();

        assert_eq!(engine.run(&mut rec).unwrap(), 1.0);
        assert_eq!(rec.done, vec![("cpu".to_owned(), a, 1.0)]);
        assert_eq!(rec.failed.len(), 1);
        assert_eq!(rec.failed[0].1, b);
        assert_eq!(rec.failed[0].2, Some(Completion::Canceled));
    }

    #[test]
    fn keeping_finished_actions_leaves_them_detached() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 1.0);
        let id = cpu.model.create_action_on(2.0, &[(c, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new()
            .resource(cpu)
            .release_finished(false)
            .build()
            .unwrap();

        engine.run(&mut NoopObserver).unwrap();
        let model = engine.resource(0).unwrap().model();
        assert_eq!(model.len(), 1);
        assert_eq!(model.get(id).unwrap().state(), ActionState::Detached);
        assert_eq!(model.get(id).unwrap().finish_time(), Some(2.0));
    }

    #[test]
    fn idle_engine_jumps_to_max_date() {
        let (cpu, _) = cpu("cpu", UpdateAlgorithm::Lazy, 1.0);
        let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
        assert_eq!(engine.solve(None, &mut NoopObserver).unwrap(), None);
        assert_eq!(engine.solve(Some(7.0), &mut NoopObserver).unwrap(), Some(7.0));
        assert_eq!(engine.now(), 7.0);
        assert_eq!(engine.solve(Some(7.0), &mut NoopObserver).unwrap(), None);
        assert!(matches!(
            engine.solve(Some(f64::NAN), &mut NoopObserver),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn resource_added_mid_run_starts_at_current_date() {
        let (mut first, c) = cpu("first", UpdateAlgorithm::Lazy, 1.0);
        first.model.create_action_on(3.0, &[(c, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new().resource(first).build().unwrap();
        engine.run(&mut NoopObserver).unwrap();

        let (second, c) = cpu("second", UpdateAlgorithm::Full, 2.0);
        let index = engine.add_resource(second);
        let id = engine
            .resource_mut(index)
            .unwrap()
            .model_mut()
            .create_action_on(4.0, &[(c, 1.0)], 1.0, None)
            .unwrap();

        let mut rec = Recorder::default();
        assert_eq!(engine.run(&mut rec).unwrap(), 5.0);
        assert_eq!(rec.done, vec![("second".to_owned(), id, 5.0)]);
    }

    #[test]
    fn missing_update_hook_surfaces_as_kernel_error() {
        let model = Model::new(KernelConfig::full(), MaxMinSystem::new()).unwrap();
        let mut engine = EngineBuilder::new().resource(Unfinished { model }).build().unwrap();
        let err = engine.solve(Some(1.0), &mut NoopObserver).unwrap_err();
        match err {
            SimError::Kernel { resource, source } => {
                assert_eq!(resource, "unfinished");
                assert!(matches!(source, KernelError::Unimplemented { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn run_is_logged() {
        let (mut cpu, c) = cpu("cpu", UpdateAlgorithm::Lazy, 1.0);
        cpu.model.create_action_on(1.0, &[(c, 1.0)], 1.0, None).unwrap();
        let mut engine = EngineBuilder::new().resource(cpu).build().unwrap();
        engine.run(&mut NoopObserver).unwrap();
        assert!(logs_contain("simulation finished"));
    }
}
