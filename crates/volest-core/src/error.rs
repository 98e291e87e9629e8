//! Error types for volest-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A single trade record could not be interpreted. Never fatal to a batch.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid stock id: {0}")]
    InvalidStockId(String),

    #[error("Unknown estimator method: {0}")]
    UnknownMethod(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
