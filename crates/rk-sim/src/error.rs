use rk_kernel::KernelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("no resource registered at index {0}")]
    UnknownResource(usize),

    #[error("resource {resource}: {source}")]
    Kernel {
        resource: String,
        #[source]
        source:   KernelError,
    },
}

pub type SimResult<T> = Result<T, SimError>;
