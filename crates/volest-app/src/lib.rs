//! Historical volatility estimation from tick data.
//!
//! Wires the pipeline together:
//! - raw CSV files → cleaner → split adjuster → sharded Parquet price store
//! - price store → rolling estimators → volatility Parquet files
//!
//! Batch mode rebuilds everything from a raw directory; incremental mode
//! ingests single files and regenerates the affected stock's volatility.

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, VolatilityRefresher};
pub use config::{AppConfig, DataConfig, SplitConfig};
pub use error::{AppError, AppResult};
