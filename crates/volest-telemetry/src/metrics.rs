//! Prometheus metrics for volest.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on duplicate
//! metric names, which is a programming error surfaced on first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// Trades removed by the cleaner.
/// Labels: stock, reason (malformed/out_of_session/non_positive_price/merged_duplicate/outlier)
pub static TRADES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_trades_dropped_total",
        "Trades removed by the cleaner",
        &["stock", "reason"]
    )
    .unwrap()
});

/// Clean observations persisted.
pub static OBSERVATIONS_STORED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_observations_stored_total",
        "Clean price observations persisted",
        &["stock"]
    )
    .unwrap()
});

/// Daily shards written.
/// Labels: stock, kind (new/rewritten)
pub static SHARDS_WRITTEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_shards_written_total",
        "Daily price shards written",
        &["stock", "kind"]
    )
    .unwrap()
});

/// Split adjustments applied to history.
pub static SPLIT_ADJUSTMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_split_adjustments_total",
        "Split adjustments applied to stored history",
        &["stock"]
    )
    .unwrap()
});

/// Failed ingestions.
/// Labels: reason (adjustment/store/load)
pub static INGEST_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_ingest_failures_total",
        "Failed ingestion attempts",
        &["reason"]
    )
    .unwrap()
});

/// Defined volatility estimates produced.
pub static ESTIMATES_COMPUTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "volest_estimates_computed_total",
        "Defined rolling volatility estimates computed",
        &["stock", "method"]
    )
    .unwrap()
});

/// Metrics recording facade.
pub struct Metrics;

impl Metrics {
    pub fn trades_dropped(stock: &str, reason: &str, count: usize) {
        if count > 0 {
            TRADES_DROPPED_TOTAL
                .with_label_values(&[stock, reason])
                .inc_by(count as u64);
        }
    }

    pub fn observations_stored(stock: &str, count: usize) {
        OBSERVATIONS_STORED_TOTAL
            .with_label_values(&[stock])
            .inc_by(count as u64);
    }

    pub fn shard_written(stock: &str) {
        SHARDS_WRITTEN_TOTAL.with_label_values(&[stock, "new"]).inc();
    }

    /// Record a split adjustment that rewrote `rewritten` prior shards.
    pub fn split_adjusted(stock: &str, rewritten: usize) {
        SPLIT_ADJUSTMENTS_TOTAL.with_label_values(&[stock]).inc();
        SHARDS_WRITTEN_TOTAL
            .with_label_values(&[stock, "rewritten"])
            .inc_by(rewritten as u64);
    }

    pub fn ingest_failed(reason: &str) {
        INGEST_FAILURES_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn estimates_computed(stock: &str, method: &str, count: usize) {
        ESTIMATES_COMPUTED_TOTAL
            .with_label_values(&[stock, method])
            .inc_by(count as u64);
    }

    /// Render the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
