//! Virtual time and floating-point tolerance helpers.
//!
//! # Design
//!
//! The kernel runs on a continuous virtual clock (`f64` seconds).  Unlike an
//! integer tick, float dates accumulate rounding error, so every comparison
//! that decides "has this action finished?" goes through a tolerance taken
//! from [`Precision`][crate::Precision]:
//!
//! - work counters are decremented with [`double_update`], which snaps any
//!   result below the tolerance to exactly `0.0`;
//! - a date counts as reached once it is within `surf` of `now`.

use std::fmt;

/// Subtract `delta` from `value`, snapping the result to `0.0` when it falls
/// below `precision`.
///
/// Keeps `remains`-style counters from ever being observed as tiny negative
/// (or tiny positive) residues of float arithmetic.
#[inline]
pub fn double_update(value: &mut f64, delta: f64, precision: f64) {
    *value -= delta;
    if *value < precision {
        *value = 0.0;
    }
}

// ── VirtualClock ──────────────────────────────────────────────────────────────

/// The simulation's notion of elapsed time, advanced in discrete deltas.
///
/// Owned by the outer loop; models receive `now` as an argument instead of
/// reading a process-wide clock.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualClock {
    now: f64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at an arbitrary date (useful when resuming a run).
    pub fn starting_at(now: f64) -> Self {
        Self { now }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advance the clock by `delta` and return the new date.
    ///
    /// # Panics
    /// Panics in debug mode if `delta` is negative or NaN.
    #[inline]
    pub fn advance(&mut self, delta: f64) -> f64 {
        debug_assert!(delta >= 0.0, "clock cannot move backwards (delta = {delta})");
        self.now += delta;
        self.now
    }
}

impl fmt::Display for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.6}", self.now)
    }
}
