//! Rolling historical volatility estimators for volest.
//!
//! # Architecture
//!
//! ```text
//! ShardStore.read_history(stock) → TradingDay[]
//!   → RollingVolatilityComputer (window of N days + anchor day)
//!       → VolatilityEstimator::estimate(window) per date
//!   → VolatilitySeries (None where history < N)
//! ```
//!
//! Estimators return per-period standard deviations; annualisation is a
//! linear post-scaling applied by the computer.

pub mod close_to_close;
pub mod config;
pub mod error;
pub mod estimator;
pub mod realised;
pub mod rolling;
mod stats;
pub mod yang_zhang;

pub use close_to_close::{CloseToCloseAverageRealisedVariance, CloseToCloseStdDeviation};
pub use config::EstimatorConfig;
pub use error::{EstimatorError, EstimatorResult};
pub use estimator::{estimator_for, EstimationWindow, VolatilityEstimator};
pub use realised::TickAverageRealisedVariance;
pub use rolling::RollingVolatilityComputer;
pub use yang_zhang::YangZhang;
