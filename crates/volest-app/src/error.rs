//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Invalid value: {0}")]
    Core(#[from] volest_core::CoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] volest_registry::RegistryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] volest_persistence::PersistenceError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] volest_ingest::IngestError),

    #[error("Estimator error: {0}")]
    Estimator(#[from] volest_estimator::EstimatorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] volest_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
