use ic_tensor::TensorError;
use thiserror::Error;

use crate::provider::Op;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("no backend available")]
    NoBackend,
    #[error("backend registry is full ({capacity} entries)")]
    RegistryFull { capacity: usize },
    #[error("{backend} backend does not support {op}")]
    Unsupported { backend: &'static str, op: Op },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, BackendError>;
