//! Ingestion error types.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;
use volest_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The split rewrite could not be completed; history is unchanged.
    #[error("Split adjustment failed for {stock} on {date}: {source}")]
    AdjustmentFailure {
        stock: String,
        date: NaiveDate,
        #[source]
        source: PersistenceError,
    },

    #[error("{stock} {date} arrived after {latest}; days must be ingested in date order")]
    OutOfOrder {
        stock: String,
        date: NaiveDate,
        latest: NaiveDate,
    },

    #[error("Invalid raw file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Core(#[from] volest_core::CoreError),

    #[error("Ingest worker unavailable: {0}")]
    Worker(String),
}

impl IngestError {
    /// Metric label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::AdjustmentFailure { .. } => "adjustment",
            IngestError::OutOfOrder { .. } => "out_of_order",
            IngestError::InvalidFileName(_) | IngestError::Csv(_) | IngestError::Io(_) => "load",
            IngestError::Store(_) => "store",
            IngestError::Core(_) => "config",
            IngestError::Worker(_) => "worker",
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
