//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid split: {0}")]
    InvalidSplit(#[from] volest_core::CoreError),

    #[error("Conflicting split for {stock} on {date}: {existing} vs {new}")]
    Conflict {
        stock: String,
        date: chrono::NaiveDate,
        existing: f64,
        new: f64,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
