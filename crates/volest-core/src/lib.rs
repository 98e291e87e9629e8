//! Core domain types for the volest volatility estimator.
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - `StockId`: validated stock identifier (also used as a directory name)
//! - `RawTrade`, `Trade`: tick records before and after parsing
//! - `PriceObservation`, `PriceShard`, `TradingDay`: cleaned series
//! - `SessionWindow`: trading hours filter
//! - `EstimatorMethod`, `VolatilityEstimate`: estimator outputs

pub mod error;
pub mod session;
pub mod split;
pub mod types;
pub mod volatility;

pub use error::{CoreError, Result};
pub use session::SessionWindow;
pub use split::SplitEvent;
pub use types::{DailyBar, PriceObservation, PriceShard, RawTrade, StockId, Trade, TradingDay};
pub use volatility::{EstimatorMethod, VolatilityEstimate, VolatilitySeries};
