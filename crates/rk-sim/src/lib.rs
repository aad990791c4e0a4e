//! `rk-sim` — outer event loop for the `rk` resource-sharing kernel.
//!
//! # One step
//!
//! ```text
//! solve(max_date):
//!   ① Next event — delta = min over resources of next_occuring_event(now)
//!   ② Advance    — now += min(delta, max_date - now)
//!   ③ Update     — update_actions_state(now, delta) on every resource
//!   ④ Report     — drain DONE / FAILED into the observer (once per action)
//! ```
//!
//! Resources may mix update algorithms: the engine only sees deltas.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use rk_sim::{EngineBuilder, NoopObserver};
//!
//! let mut engine = EngineBuilder::new().resource(cpu).build()?;
//! let end = engine.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod observer;

#[cfg(test)]
mod tests;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
