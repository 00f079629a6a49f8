// src/errors.rs
use thiserror::Error;

/// Failures surfaced by the estimator core.
///
/// `Data` and `Training` abort the offline pipeline before any artifact is
/// written. `Store` is fatal at serving start-up. `NotTrained` is returned to
/// callers instead of a default price.
#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("data error: {0}")]
    Data(String),
    #[error("training error: {0}")]
    Training(String),
    #[error("model store error: {0}")]
    Store(String),
    #[error("no trained model is loaded")]
    NotTrained,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("address '{0}' has no historical records")]
    AddressNotFound(String),
}

impl EstimatorError {
    /// True when the caller's input was at fault, false when the system is unavailable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EstimatorError::InvalidRequest(_) | EstimatorError::AddressNotFound(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorError::Data(_) => "data_error",
            EstimatorError::Training(_) => "training_error",
            EstimatorError::Store(_) => "store_error",
            EstimatorError::NotTrained => "not_trained",
            EstimatorError::InvalidRequest(_) => "invalid_request",
            EstimatorError::AddressNotFound(_) => "address_not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
