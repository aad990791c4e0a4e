//! `MaxMinSystem` — a weighted max-min reference solver.
//!
//! # Algorithm (progressive filling)
//!
//! Every enabled variable `v` with weight `w_v` is raised at rate `1 / w_v`
//! along a common *level* `λ` (so `share_v = λ / w_v`).  At each round:
//!
//! ```text
//! λ_c  = remaining_c / Σ_{v unfixed on c} coef_vc / w_v     (per constraint)
//! λ_v  = bound_v × w_v                                       (per bounded var)
//! λ*   = min of all the above
//! ```
//!
//! Variables on a constraint reaching `λ*`, or whose bound is reached, are
//! fixed at `λ* / w_v`; their consumption is subtracted from every constraint
//! they touch and the round repeats until no variable is left.
//!
//! The solve is recomputed from scratch each time.  That keeps the reference
//! solver obviously correct; the kernel never depends on how the shares are
//! obtained, only on the modified set.

use std::collections::BTreeSet;

use rk_core::{ConstraintId, VariableId};
use tracing::{debug, trace, warn};

use crate::{FairShareSolver, SolverError, SolverResult};

// ── Storage ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Variable {
    weight:   f64,
    bound:    Option<f64>,
    value:    f64,
    elements: Vec<(ConstraintId, f64)>,
}

impl Variable {
    #[inline]
    fn enabled(&self) -> bool {
        self.weight > 0.0
    }
}

#[derive(Clone, Debug)]
struct Constraint {
    capacity:  f64,
    variables: Vec<VariableId>,
}

/// Weighted max-min fair-share solver.
///
/// Variable ids are never reused, so a released id stays invalid forever and
/// a second release is detected.
#[derive(Clone, Debug)]
pub struct MaxMinSystem {
    variables:   Vec<Option<Variable>>,
    constraints: Vec<Constraint>,
    /// Variables touched since the last solve (weight/bound updates, creation).
    dirty:       BTreeSet<VariableId>,
    /// Relative tolerance when deciding which constraints saturate together.
    precision:   f64,
}

impl Default for MaxMinSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MaxMinSystem {
    pub fn new() -> Self {
        Self::with_precision(rk_core::Precision::default().maxmin)
    }

    pub fn with_precision(precision: f64) -> Self {
        Self {
            variables:   Vec::new(),
            constraints: Vec::new(),
            dirty:       BTreeSet::new(),
            precision,
        }
    }

    /// Number of live (not yet released) variables.
    pub fn variable_count(&self) -> usize {
        self.variables.iter().filter(|v| v.is_some()).count()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Total share currently granted on `constraint` (Σ coef × share).
    pub fn constraint_usage(&self, constraint: ConstraintId) -> f64 {
        let Some(c) = self.constraints.get(constraint.index()) else {
            return 0.0;
        };
        c.variables
            .iter()
            .filter_map(|&id| self.var(id))
            .map(|v| {
                let coef = v.elements.iter().find(|(cid, _)| *cid == constraint).map_or(0.0, |e| e.1);
                coef * v.value
            })
            .sum()
    }

    fn var(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index()).and_then(Option::as_ref)
    }

    fn var_mut(&mut self, id: VariableId) -> SolverResult<&mut Variable> {
        self.variables
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SolverError::UnknownVariable(id))
    }

    fn check_capacity(capacity: f64) -> SolverResult<()> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "capacity must be finite and non-negative, got {capacity}"
            )));
        }
        Ok(())
    }

    fn check_weight(weight: f64) -> SolverResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "weight must be finite and non-negative, got {weight}"
            )));
        }
        Ok(())
    }

    /// Progressive filling over every enabled variable.  Returns the new share
    /// of each variable slot (disabled and released slots get `0.0`).
    fn allocate(&self) -> Vec<f64> {
        let mut shares = vec![0.0; self.variables.len()];
        let mut remaining: Vec<f64> = self.constraints.iter().map(|c| c.capacity).collect();
        let mut unfixed: BTreeSet<usize> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_ref().is_some_and(Variable::enabled))
            .map(|(i, _)| i)
            .collect();

        while !unfixed.is_empty() {
            // Per-constraint aggregated demand of the still-unfixed variables.
            let mut usage = vec![0.0; self.constraints.len()];
            for &i in &unfixed {
                if let Some(v) = &self.variables[i] {
                    for &(c, coef) in &v.elements {
                        usage[c.index()] += coef / v.weight;
                    }
                }
            }

            let mut level = f64::INFINITY;
            for (c, &u) in usage.iter().enumerate() {
                if u > 0.0 {
                    level = level.min(remaining[c].max(0.0) / u);
                }
            }
            for &i in &unfixed {
                if let Some(Variable { bound: Some(b), weight, .. }) = &self.variables[i] {
                    level = level.min(b * weight);
                }
            }

            if !level.is_finite() {
                // Unconstrained and unbounded: nothing limits these demands.
                for &i in &unfixed {
                    warn!(variable = i, "variable has neither constraint nor bound; granting 0");
                }
                break;
            }

            let tolerance = self.precision * level.max(1.0);
            let saturated: Vec<bool> = usage
                .iter()
                .enumerate()
                .map(|(c, &u)| u > 0.0 && remaining[c].max(0.0) / u <= level + tolerance)
                .collect();

            let mut fixed = Vec::new();
            for &i in &unfixed {
                let Some(v) = &self.variables[i] else { continue };
                let hits_bound = v.bound.is_some_and(|b| b * v.weight <= level + tolerance);
                let on_saturated = v.elements.iter().any(|&(c, coef)| coef > 0.0 && saturated[c.index()]);
                if hits_bound || on_saturated {
                    let mut share = level / v.weight;
                    if let Some(b) = v.bound {
                        share = share.min(b);
                    }
                    shares[i] = share;
                    for &(c, coef) in &v.elements {
                        remaining[c.index()] -= coef * share;
                    }
                    fixed.push(i);
                }
            }

            if fixed.is_empty() {
                // Only reachable through zero-coefficient attachments.
                break;
            }
            for i in fixed {
                unfixed.remove(&i);
            }
        }

        shares
    }
}

impl FairShareSolver for MaxMinSystem {
    fn create_constraint(&mut self, capacity: f64) -> SolverResult<ConstraintId> {
        Self::check_capacity(capacity)?;
        let id = ConstraintId::try_from(self.constraints.len())
            .map_err(|_| SolverError::InvalidArgument("constraint id space exhausted".into()))?;
        self.constraints.push(Constraint { capacity, variables: Vec::new() });
        Ok(id)
    }

    fn update_constraint_capacity(&mut self, constraint: ConstraintId, capacity: f64) -> SolverResult<()> {
        Self::check_capacity(capacity)?;
        let c = self
            .constraints
            .get_mut(constraint.index())
            .ok_or(SolverError::UnknownConstraint(constraint))?;
        c.capacity = capacity;
        Ok(())
    }

    fn create_variable(
        &mut self,
        constraints: &[(ConstraintId, f64)],
        weight:      f64,
        bound:       Option<f64>,
    ) -> SolverResult<VariableId> {
        Self::check_weight(weight)?;
        for &(c, coef) in constraints {
            if c.index() >= self.constraints.len() {
                return Err(SolverError::UnknownConstraint(c));
            }
            if !coef.is_finite() || coef < 0.0 {
                return Err(SolverError::InvalidArgument(format!(
                    "coefficient must be finite and non-negative, got {coef}"
                )));
            }
        }
        let id = VariableId::try_from(self.variables.len())
            .map_err(|_| SolverError::InvalidArgument("variable id space exhausted".into()))?;
        for &(c, _) in constraints {
            self.constraints[c.index()].variables.push(id);
        }
        self.variables.push(Some(Variable {
            weight,
            bound,
            value: 0.0,
            elements: constraints.to_vec(),
        }));
        self.dirty.insert(id);
        trace!(%id, weight, ?bound, "variable created");
        Ok(id)
    }

    fn update_variable_weight(&mut self, variable: VariableId, weight: f64) -> SolverResult<()> {
        Self::check_weight(weight)?;
        self.var_mut(variable)?.weight = weight;
        self.dirty.insert(variable);
        Ok(())
    }

    fn update_variable_bound(&mut self, variable: VariableId, bound: Option<f64>) -> SolverResult<()> {
        self.var_mut(variable)?.bound = bound;
        self.dirty.insert(variable);
        Ok(())
    }

    fn variable_free(&mut self, variable: VariableId) {
        let slot = self.variables.get_mut(variable.index());
        let Some(var) = slot.and_then(Option::take) else {
            panic!("invariant violation: {variable} released twice or never created");
        };
        for (c, _) in var.elements {
            self.constraints[c.index()].variables.retain(|&v| v != variable);
        }
        self.dirty.remove(&variable);
        trace!(%variable, "variable released");
    }

    fn solve(&mut self) -> Vec<VariableId> {
        let shares = self.allocate();
        let mut modified = std::mem::take(&mut self.dirty);

        for (i, slot) in self.variables.iter_mut().enumerate() {
            let Some(v) = slot else { continue };
            if v.value != shares[i] {
                v.value = shares[i];
                modified.insert(VariableId(i as u32));
            }
        }

        let modified: Vec<VariableId> = modified
            .into_iter()
            .filter(|&id| self.var(id).is_some_and(Variable::enabled))
            .collect();
        debug!(modified = modified.len(), "max-min solve complete");
        modified
    }

    fn variable_granted_share(&self, variable: VariableId) -> f64 {
        self.var(variable).map_or(0.0, |v| v.value)
    }

    fn variable_weight(&self, variable: VariableId) -> f64 {
        self.var(variable).map_or(0.0, |v| v.weight)
    }

    fn variable_bound(&self, variable: VariableId) -> Option<f64> {
        self.var(variable).and_then(|v| v.bound)
    }

    fn forget_modified(&mut self, variable: VariableId) {
        self.dirty.remove(&variable);
    }
}
