//! Unit tests for rk-lmm.

use rk_core::{ConstraintId, VariableId};

use crate::{FairShareSolver, MaxMinSystem, SolverError};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// One constraint of the given capacity.
fn system_with(capacity: f64) -> (MaxMinSystem, ConstraintId) {
    let mut sys = MaxMinSystem::new();
    let c = sys.create_constraint(capacity).unwrap();
    (sys, c)
}

// ── Allocation ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod allocation {
    use super::*;

    #[test]
    fn single_demand_gets_full_capacity() {
        let (mut sys, c) = system_with(10.0);
        let v = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(v), 10.0));
    }

    #[test]
    fn equal_weights_share_equally() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        let b = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(a), 0.5));
        assert!(close(sys.variable_granted_share(b), 0.5));
    }

    #[test]
    fn weight_acts_as_penalty() {
        // Weight 2 gets half the share of weight 1: 2/3 vs 1/3.
        let (mut sys, c) = system_with(1.0);
        let light = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        let heavy = sys.create_variable(&[(c, 1.0)], 2.0, None).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(light), 2.0 / 3.0));
        assert!(close(sys.variable_granted_share(heavy), 1.0 / 3.0));
    }

    #[test]
    fn bound_caps_share_and_frees_capacity() {
        let (mut sys, c) = system_with(1.0);
        let capped = sys.create_variable(&[(c, 1.0)], 1.0, Some(0.2)).unwrap();
        let other = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(capped), 0.2));
        assert!(close(sys.variable_granted_share(other), 0.8));
    }

    #[test]
    fn zero_weight_is_excluded() {
        let (mut sys, c) = system_with(1.0);
        let idle = sys.create_variable(&[(c, 1.0)], 0.0, None).unwrap();
        let busy = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        let modified = sys.solve();
        assert_eq!(sys.variable_granted_share(idle), 0.0);
        assert!(close(sys.variable_granted_share(busy), 1.0));
        assert_eq!(modified, vec![busy], "disabled demands are never reported");
    }

    #[test]
    fn bottleneck_on_second_constraint() {
        // a uses c1 only; b uses c1 and c2 (capacity 0.1).  b is limited to 0.1
        // and a takes the rest of c1.
        let mut sys = MaxMinSystem::new();
        let c1 = sys.create_constraint(1.0).unwrap();
        let c2 = sys.create_constraint(0.1).unwrap();
        let a = sys.create_variable(&[(c1, 1.0)], 1.0, None).unwrap();
        let b = sys.create_variable(&[(c1, 1.0), (c2, 1.0)], 1.0, None).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(b), 0.1));
        assert!(close(sys.variable_granted_share(a), 0.9));
        assert!(close(sys.constraint_usage(c1), 1.0));
    }

    #[test]
    fn unconstrained_variable_with_bound_gets_bound() {
        let mut sys = MaxMinSystem::new();
        let v = sys.create_variable(&[], 1.0, Some(3.0)).unwrap();
        sys.solve();
        assert!(close(sys.variable_granted_share(v), 3.0));
    }
}

// ── Modified set ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod modified_set {
    use super::*;

    #[test]
    fn first_solve_reports_new_variables_in_id_order() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        let b = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        assert_eq!(sys.solve(), vec![a, b]);
    }

    #[test]
    fn unchanged_solve_reports_nothing() {
        let (mut sys, c) = system_with(1.0);
        sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        assert!(sys.solve().is_empty());
    }

    #[test]
    fn share_change_is_reported_for_neighbours() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        let b = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        assert_eq!(sys.solve(), vec![a, b]);
    }

    #[test]
    fn weight_update_marks_dirty_even_without_share_change() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        sys.update_variable_weight(a, 3.0).unwrap();
        assert_eq!(sys.solve(), vec![a]);
    }

    #[test]
    fn forget_modified_drops_pending_mark() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        sys.update_variable_bound(a, Some(5.0)).unwrap();
        sys.forget_modified(a);
        assert!(sys.solve().is_empty());
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use super::*;

    #[test]
    fn free_returns_capacity_to_others() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        let b = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        sys.variable_free(a);
        assert_eq!(sys.variable_count(), 1);
        assert_eq!(sys.solve(), vec![b]);
        assert!(close(sys.variable_granted_share(b), 1.0));
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn double_free_panics() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.variable_free(a);
        sys.variable_free(a);
    }

    #[test]
    fn released_variable_is_unknown() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.variable_free(a);
        assert!(matches!(
            sys.update_variable_weight(a, 2.0),
            Err(SolverError::UnknownVariable(id)) if id == a
        ));
        assert_eq!(sys.variable_granted_share(a), 0.0);
    }

    #[test]
    fn invalid_arguments_rejected() {
        let mut sys = MaxMinSystem::new();
        assert!(sys.create_constraint(-1.0).is_err());
        let c = sys.create_constraint(1.0).unwrap();
        assert!(sys.create_variable(&[(c, 1.0)], -1.0, None).is_err());
        assert!(matches!(
            sys.create_variable(&[(ConstraintId(9), 1.0)], 1.0, None),
            Err(SolverError::UnknownConstraint(_))
        ));
        assert!(matches!(
            sys.update_constraint_capacity(ConstraintId(9), 1.0),
            Err(SolverError::UnknownConstraint(_))
        ));
        assert_eq!(sys.variable_weight(VariableId(42)), 0.0);
    }

    #[test]
    fn capacity_change_is_picked_up() {
        let (mut sys, c) = system_with(1.0);
        let a = sys.create_variable(&[(c, 1.0)], 1.0, None).unwrap();
        sys.solve();
        sys.update_constraint_capacity(c, 4.0).unwrap();
        assert_eq!(sys.solve(), vec![a]);
        assert!(close(sys.variable_granted_share(a), 4.0));
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The allocation never exceeds a constraint's capacity and a single
        /// shared constraint is always fully used.
        #[test]
        fn single_constraint_is_saturated(
            capacity in 0.1f64..100.0,
            weights in proptest::collection::vec(0.1f64..10.0, 1..8),
        ) {
            let (mut sys, c) = system_with(capacity);
            for w in &weights {
                sys.create_variable(&[(c, 1.0)], *w, None).unwrap();
            }
            sys.solve();
            let used = sys.constraint_usage(c);
            prop_assert!((used - capacity).abs() <= 1e-6 * capacity.max(1.0));
        }
    }
}
