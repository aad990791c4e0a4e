//! Kernel configuration.
//!
//! Typically built by the application crate (or deserialized with the `serde`
//! feature) and passed to every `Model` at construction.  The update algorithm
//! is fixed for the lifetime of a model.

use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

// ── UpdateAlgorithm ───────────────────────────────────────────────────────────

/// How a model predicts the next completion date of its actions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UpdateAlgorithm {
    /// Recompute only demands touched by the last solve; pending dates live
    /// in an event heap.  O(modified) per step.
    Lazy,
    /// Rescan every running action on every step.  O(running) per step.
    Full,
}

impl fmt::Display for UpdateAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateAlgorithm::Lazy => f.write_str("lazy"),
            UpdateAlgorithm::Full => f.write_str("full"),
        }
    }
}

impl FromStr for UpdateAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(UpdateAlgorithm::Lazy),
            "full" => Ok(UpdateAlgorithm::Full),
            other => Err(CoreError::Config(format!(
                "unknown update algorithm {other:?} (expected \"lazy\" or \"full\")"
            ))),
        }
    }
}

// ── Precision ─────────────────────────────────────────────────────────────────

/// Float tolerances used by the kernel.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precision {
    /// Relative precision of the fair-share solver.  Default: 1e-5.
    pub maxmin: f64,
    /// Precision of virtual-time comparisons.  Default: 1e-9.
    pub surf: f64,
}

impl Precision {
    /// Tolerance under which a work counter is considered exhausted.
    #[inline]
    pub fn remains_epsilon(&self) -> f64 {
        self.maxmin * self.surf
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self { maxmin: 1e-5, surf: 1e-9 }
    }
}

// ── KernelConfig ──────────────────────────────────────────────────────────────

/// Per-model configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    pub update_algorithm: UpdateAlgorithm,
    #[cfg_attr(feature = "serde", serde(default))]
    pub precision: Precision,
}

impl KernelConfig {
    pub fn new(update_algorithm: UpdateAlgorithm) -> Self {
        Self { update_algorithm, precision: Precision::default() }
    }

    pub fn lazy() -> Self {
        Self::new(UpdateAlgorithm::Lazy)
    }

    pub fn full() -> Self {
        Self::new(UpdateAlgorithm::Full)
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Reject tolerances that would make completion detection meaningless.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, value) in [("maxmin", self.precision.maxmin), ("surf", self.precision.surf)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::Config(format!(
                    "{name} precision must be finite and positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}
