use rk_core::{ConstraintId, VariableId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("variable {0} does not exist or was released")]
    UnknownVariable(VariableId),

    #[error("constraint {0} does not exist")]
    UnknownConstraint(ConstraintId),

    #[error("invalid solver argument: {0}")]
    InvalidArgument(String),
}

pub type SolverResult<T> = Result<T, SolverError>;
