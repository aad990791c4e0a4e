use rk_core::{ActionId, CoreError, UpdateAlgorithm};
use rk_lmm::SolverError;
use thiserror::Error;

use crate::ActionState;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("action {0} not found (never created or already destroyed)")]
    ActionNotFound(ActionId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("action {action} cannot be finished into non-terminal state {state}")]
    NotTerminal {
        action: ActionId,
        state:  ActionState,
    },

    #[error("resource kind {kind:?} does not implement update_actions_state for the {algorithm} algorithm")]
    Unimplemented {
        kind:      String,
        algorithm: UpdateAlgorithm,
    },

    #[error("event heap operations require the lazy algorithm, model uses {0}")]
    HeapUnavailable(UpdateAlgorithm),

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type KernelResult<T> = Result<T, KernelError>;
