//! Trade cleaning pipeline.
//!
//! Steps follow the P1/P2/T3/Q4 rules of Barndorff-Nielsen et al. (2008),
//! with a rolling mean/MAD variant of Q4.

use crate::config::CleanerConfig;
use tracing::{debug, warn};
use volest_core::{CoreError, PriceObservation, RawTrade, SessionWindow, Trade};

/// Per-reason counts of records removed by the cleaner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    /// Records whose timestamp or price could not be parsed.
    pub malformed: usize,
    /// Trades outside the session window.
    pub out_of_session: usize,
    /// Trades with price <= 0.
    pub non_positive_price: usize,
    /// Trades folded into another trade with the same timestamp.
    pub merged_duplicates: usize,
    /// Observations rejected by the rolling MAD filter.
    pub outliers: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.malformed
            + self.out_of_session
            + self.non_positive_price
            + self.merged_duplicates
            + self.outliers
    }
}

/// Cleaned series plus what was dropped along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    /// Sorted by timestamp, timestamps unique.
    pub observations: Vec<PriceObservation>,
    pub input_count: usize,
    pub drops: DropCounts,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Cleans one stock-day of trades.
#[derive(Debug, Clone)]
pub struct TradeCleaner {
    session: SessionWindow,
    half_window: usize,
    threshold: f64,
}

impl TradeCleaner {
    /// Create a cleaner, validating the configuration.
    pub fn new(config: &CleanerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            session: config.session()?,
            half_window: config.outlier_window / 2,
            threshold: config.outlier_threshold,
        })
    }

    /// Parse and clean raw records. Malformed records are dropped and counted.
    pub fn clean(&self, raw: &[RawTrade]) -> CleanReport {
        let mut drops = DropCounts::default();
        let trades: Vec<Trade> = raw
            .iter()
            .filter_map(|record| match record.parse() {
                Ok(trade) => Some(trade),
                Err(e) => {
                    debug!(error = %e, "Dropping malformed trade");
                    drops.malformed += 1;
                    None
                }
            })
            .collect();

        let mut report = self.clean_trades(trades);
        report.input_count = raw.len();
        report.drops.malformed = drops.malformed;
        report
    }

    /// Clean already-parsed trades.
    pub fn clean_trades(&self, trades: Vec<Trade>) -> CleanReport {
        let input_count = trades.len();
        let mut drops = DropCounts::default();

        let trades = self.filter_session(trades, &mut drops);
        let trades = filter_non_positive(trades, &mut drops);
        let merged = merge_identical_timestamps(trades, &mut drops);
        let kept = self.remove_outliers(merged, &mut drops);

        let observations: Vec<PriceObservation> = kept
            .into_iter()
            .map(|(ts, price)| PriceObservation::new(ts, price))
            .collect();

        if observations.is_empty() {
            warn!(input_count, ?drops, "All trades filtered out");
        } else {
            debug!(
                input_count,
                kept = observations.len(),
                dropped = drops.total(),
                "Cleaned trades"
            );
        }

        CleanReport {
            observations,
            input_count,
            drops,
        }
    }

    fn filter_session(&self, mut trades: Vec<Trade>, drops: &mut DropCounts) -> Vec<Trade> {
        let before = trades.len();
        trades.retain(|t| self.session.contains(t.timestamp));
        drops.out_of_session = before - trades.len();
        trades
    }

    /// Centered rolling mean/MAD filter, single pass.
    ///
    /// Neighbourhood statistics for every observation are computed on the
    /// input series before anything is removed, so adjacent outliers can
    /// inflate each other's MAD. An observation whose neighbours all share
    /// one price (MAD of zero) is kept.
    fn remove_outliers(
        &self,
        series: Vec<(chrono::NaiveDateTime, f64)>,
        drops: &mut DropCounts,
    ) -> Vec<(chrono::NaiveDateTime, f64)> {
        let prices: Vec<f64> = series.iter().map(|(_, p)| *p).collect();
        let n = prices.len();

        let keep: Vec<bool> = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(self.half_window);
                let hi = (i + self.half_window + 1).min(n);
                let neighbours = prices[lo..i].iter().chain(&prices[i + 1..hi]);
                match mean_and_mad(neighbours) {
                    // A flat neighbourhood gives no scale to judge a move against.
                    Some((_, mad)) if mad == 0.0 => true,
                    Some((mean, mad)) => (prices[i] - mean).abs() <= self.threshold * mad,
                    None => true,
                }
            })
            .collect();

        let kept: Vec<_> = series
            .into_iter()
            .zip(keep)
            .filter_map(|(obs, keep)| keep.then_some(obs))
            .collect();
        drops.outliers = n - kept.len();
        kept
    }
}

fn filter_non_positive(mut trades: Vec<Trade>, drops: &mut DropCounts) -> Vec<Trade> {
    let before = trades.len();
    trades.retain(|t| t.price.is_finite() && t.price > 0.0);
    drops.non_positive_price = before - trades.len();
    trades
}

/// Collapse trades sharing a timestamp into their median price. Output is sorted.
fn merge_identical_timestamps(
    mut trades: Vec<Trade>,
    drops: &mut DropCounts,
) -> Vec<(chrono::NaiveDateTime, f64)> {
    trades.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.price.total_cmp(&b.price))
    });

    let mut merged = Vec::with_capacity(trades.len());
    let mut start = 0;
    while start < trades.len() {
        let ts = trades[start].timestamp;
        let end = trades[start..]
            .iter()
            .position(|t| t.timestamp != ts)
            .map_or(trades.len(), |offset| start + offset);
        let prices: Vec<f64> = trades[start..end].iter().map(|t| t.price).collect();
        merged.push((ts, median_sorted(&prices)));
        start = end;
    }
    drops.merged_duplicates = trades.len() - merged.len();
    merged
}

/// Median of an ascending, non-empty slice.
fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Mean and mean absolute deviation from that mean. `None` for no values.
fn mean_and_mad<'a>(values: impl Iterator<Item = &'a f64> + Clone) -> Option<(f64, f64)> {
    let (sum, count) = values
        .clone()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let mad = values.map(|v| (v - mean).abs()).sum::<f64>() / count as f64;
    Some((mean, mad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 5, 22).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, s).unwrap()
    }

    fn cleaner() -> TradeCleaner {
        TradeCleaner::new(&CleanerConfig::default()).unwrap()
    }

    /// Smooth upward drift, one trade per minute from 09:00.
    fn smooth_trades(n: usize) -> Vec<Trade> {
        (0..n)
            .map(|i| Trade::new(at(9, 0, 0) + Duration::minutes(i as i64), 100.0 + 0.01 * i as f64))
            .collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = CleanerConfig {
            outlier_window: 7,
            ..Default::default()
        };
        assert!(TradeCleaner::new(&config).is_err());
    }

    #[test]
    fn test_session_filter() {
        let trades = vec![
            Trade::new(at(7, 59, 59), 10.0),
            Trade::new(at(8, 0, 0), 10.0),
            Trade::new(at(12, 0, 0), 10.0),
            Trade::new(at(16, 29, 59), 10.0),
            Trade::new(at(16, 30, 0), 10.0),
            Trade::new(at(22, 0, 0), 10.0),
        ];
        let report = cleaner().clean_trades(trades);

        assert_eq!(report.observations.len(), 3);
        assert_eq!(report.drops.out_of_session, 3);
        let session = SessionWindow::default();
        assert!(report
            .observations
            .iter()
            .all(|o| session.contains(o.timestamp)));
    }

    #[test]
    fn test_zero_and_negative_prices_dropped() {
        let trades = vec![
            Trade::new(at(9, 0, 0), 0.0),
            Trade::new(at(9, 0, 1), -1.0),
            Trade::new(at(9, 0, 2), 10.0),
            Trade::new(at(9, 0, 3), f64::INFINITY),
        ];
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.drops.non_positive_price, 3);
    }

    #[test]
    fn test_duplicate_timestamps_merge_to_median() {
        let trades = vec![
            Trade::new(at(9, 0, 0), 100.0),
            Trade::new(at(9, 0, 0), 10.0),
            Trade::new(at(9, 0, 0), 12.0),
        ];
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.observations[0].price, 12.0);
        assert_eq!(report.drops.merged_duplicates, 2);
    }

    #[test]
    fn test_even_duplicate_group_uses_midpoint() {
        let trades = vec![Trade::new(at(9, 0, 0), 10.0), Trade::new(at(9, 0, 0), 11.0)];
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.observations[0].price, 10.5);
    }

    #[test]
    fn test_output_sorted_and_unique() {
        let mut trades = smooth_trades(20);
        trades.reverse();
        trades.push(Trade::new(at(9, 5, 0), 100.05));
        let report = cleaner().clean_trades(trades);

        let obs = &report.observations;
        assert!(obs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(obs.iter().all(|o| o.date == day()));
    }

    #[test]
    fn test_single_spike_removed_neighbours_kept() {
        let mut trades = smooth_trades(61);
        let spike_ts = trades[30].timestamp;
        trades[30].price *= 50.0;

        let report = cleaner().clean_trades(trades);

        assert_eq!(report.drops.outliers, 1);
        assert_eq!(report.observations.len(), 60);
        assert!(report.observations.iter().all(|o| o.timestamp != spike_ts));
        assert!(report.observations.iter().all(|o| o.price < 101.0));
    }

    #[test]
    fn test_spike_at_series_start_removed() {
        let mut trades = smooth_trades(51);
        trades[0].price *= 50.0;
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.drops.outliers, 1);
        assert_eq!(report.observations[0].timestamp, at(9, 1, 0));
    }

    #[test]
    fn test_adjacent_spikes_single_pass() {
        let mut trades = smooth_trades(61);
        trades[30].price *= 50.0;
        trades[31].price *= 50.0;
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.drops.outliers, 2);
    }

    #[test]
    fn test_constant_series_kept() {
        let trades: Vec<Trade> = (0..10)
            .map(|i| Trade::new(at(10, i, 0), 42.0))
            .collect();
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.observations.len(), 10);
        assert_eq!(report.drops.outliers, 0);
    }

    #[test]
    fn test_single_tick_move_in_flat_series_kept() {
        let trades: Vec<Trade> = (0..11)
            .map(|i| Trade::new(at(10, i, 0), if i == 5 { 42.01 } else { 42.0 }))
            .collect();
        let report = cleaner().clean_trades(trades);
        assert_eq!(report.drops.outliers, 0);
        assert_eq!(report.observations.len(), 11);
        assert_eq!(report.observations[5].price, 42.01);
    }

    #[test]
    fn test_two_trades_at_different_prices_kept() {
        let report = cleaner().clean_trades(vec![
            Trade::new(at(10, 0, 0), 10.0),
            Trade::new(at(10, 0, 1), 10.1),
        ]);
        assert_eq!(report.observations.len(), 2);
        assert_eq!(report.drops.outliers, 0);
    }

    #[test]
    fn test_single_observation_kept() {
        let report = cleaner().clean_trades(vec![Trade::new(at(10, 0, 0), 42.0)]);
        assert_eq!(report.observations.len(), 1);
    }

    #[test]
    fn test_all_filtered_is_empty_not_error() {
        let report = cleaner().clean_trades(vec![
            Trade::new(at(6, 0, 0), 10.0),
            Trade::new(at(9, 0, 0), 0.0),
        ]);
        assert!(report.is_empty());
        assert_eq!(report.drops.total(), 2);
    }

    #[test]
    fn test_malformed_records_counted() {
        let raw = vec![
            RawTrade::new("2017-05-22 09:00:00", 10.0),
            RawTrade::new("garbage", 10.0),
            RawTrade::new("2017-05-22 25:00:00", 10.0),
            RawTrade::new("2017-05-22 09:00:01", 10.1),
        ];
        let report = cleaner().clean(&raw);
        assert_eq!(report.input_count, 4);
        assert_eq!(report.drops.malformed, 2);
        assert_eq!(report.observations.len(), 2);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let mut raw: Vec<RawTrade> = (0..80)
            .map(|i| {
                let ts = at(9, 0, 0) + Duration::seconds(37 * i);
                RawTrade::new(
                    ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    50.0 + (i % 7) as f64 * 0.1,
                )
            })
            .collect();
        raw.push(RawTrade::new("2017-05-22 09:00:00", 0.0));
        raw.push(RawTrade::new("2017-05-22 09:00:37", 2500.0));
        raw.push(RawTrade::new("2017-05-22 07:00:00", 50.0));

        let c = cleaner();
        let first = c.clean(&raw);
        let second = c.clean(&raw);
        assert_eq!(first, second);
    }
}
