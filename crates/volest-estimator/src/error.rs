//! Estimator error types.

use thiserror::Error;
use volest_core::EstimatorMethod;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("Lookback window {lookback} too short for {method} (minimum {minimum})")]
    LookbackTooShort {
        method: EstimatorMethod,
        lookback: usize,
        minimum: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] volest_persistence::PersistenceError),
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;
