//! Persistence error types.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Shard not found: {stock} on {date}")]
    NotFound { stock: String, date: NaiveDate },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid shard: {0}")]
    InvalidShard(String),
}

impl PersistenceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
