//! `rk-core` — foundational types for the `rk` resource-sharing kernel.
//!
//! This crate is a dependency of every other `rk-*` crate.  It has no `rk-*`
//! dependencies and only `thiserror` (plus optional `serde`) externally.
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `ActionId`, `VariableId`, `ConstraintId`              |
//! | [`time`]        | `VirtualClock`, `double_update`                       |
//! | [`config`]      | `KernelConfig`, `UpdateAlgorithm`, `Precision`        |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{KernelConfig, Precision, UpdateAlgorithm};
pub use error::{CoreError, CoreResult};
pub use ids::{ActionId, ConstraintId, VariableId};
pub use time::{VirtualClock, double_update};
