//! `rk-kernel` — the resource-sharing simulation kernel.
//!
//! Decides, for every simulated resource, how its capacity is divided among
//! the concurrently active demands ([`Action`]s) and when the next state
//! change happens.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                     |
//! |---------------|--------------------------------------------------------------|
//! | [`action`]    | `Action`, `ActionState`, `SuspendState`, `Completion`        |
//! | [`heap`]      | `EventHeap` — handle-addressed min-heap of pending dates     |
//! | [`sets`]      | `ActionSets` — one ordered collection per state              |
//! | [`model`]     | `Model<S>` — lifecycle, suspension, sharing parameters       |
//! | `lazy`        | lazy completion-date algorithm (`finish_due_lazy`, `pop_due`)|
//! | `full`        | full completion-date algorithm (`advance_full`)              |
//! | [`resource`]  | `ResourceModel` trait implemented by resource kinds          |
//! | [`error`]     | `KernelError`, `KernelResult<T>`                             |
//!
//! # Step protocol
//!
//! ```text
//! loop:
//!   delta_i = model_i.next_occuring_event(now)      (None = nothing pending)
//!   delta   = min_i delta_i
//!   now    += delta
//!   model_i.update_actions_state(now, delta)         (for every model)
//!   drain model_i.extract_done() / extract_failed()
//! ```
//!
//! `next_occuring_event` must run before `update_actions_state` on the same
//! step, and the clock must never pass a model's returned date without an
//! intervening update.

pub mod action;
pub mod error;
mod full;
pub mod heap;
mod lazy;
pub mod model;
pub mod resource;
pub mod sets;


pub use action::{Action, ActionState, Completion, SuspendState};
pub use error::{KernelError, KernelResult};
pub use heap::{EventHeap, HeapEntry, HeapEntryKind, HeapHandle};
pub use model::Model;
pub use resource::ResourceModel;
pub use sets::ActionSets;
