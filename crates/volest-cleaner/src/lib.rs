//! Tick data cleaning for volest.
//!
//! Turns one stock-day of raw trades into a cleaned price series:
//!
//! ```text
//! raw trades → session filter → price > 0 → merge equal timestamps (median)
//!            → rolling mean/MAD outlier filter → PriceObservation (+ date)
//! ```
//!
//! The step order is fixed: the outlier filter relies on timestamps being
//! unique and sorted, which the merge step establishes.

pub mod cleaner;
pub mod config;

pub use cleaner::{CleanReport, DropCounts, TradeCleaner};
pub use config::CleanerConfig;
