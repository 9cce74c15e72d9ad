use thiserror::Error;

use crate::payment::PaymentError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("config {0:?} is reserved and cannot be deleted")]
    ReservedConfig(String),
    #[error("missing gamepad config {0:?}")]
    MissingConfig(String),
    #[error("config name {0:?} is already taken")]
    Conflict(String),
    #[error("not allowed to enable config")]
    NotAllowed,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl ServiceError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::ReservedConfig(_) => 1002,
            ServiceError::MissingConfig(_) => 1003,
            ServiceError::Conflict(_) => 1004,
            ServiceError::NotAllowed => 1005,
            ServiceError::Storage(_) => 1100,
            ServiceError::Payment(_) => 1200,
        }
    }
}
