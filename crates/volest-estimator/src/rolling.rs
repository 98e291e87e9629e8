//! Rolling volatility over a stock's cleaned history.

use crate::config::EstimatorConfig;
use crate::error::{EstimatorError, EstimatorResult};
use crate::estimator::{estimator_for, EstimationWindow, VolatilityEstimator};
use tracing::{debug, warn};
use volest_core::{EstimatorMethod, StockId, TradingDay, VolatilitySeries};
use volest_persistence::ShardStore;

/// Applies estimators over a trailing window of trading days.
#[derive(Debug, Clone)]
pub struct RollingVolatilityComputer {
    config: EstimatorConfig,
}

impl RollingVolatilityComputer {
    pub fn new(config: EstimatorConfig) -> EstimatorResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Compute a series with the configured lookback window.
    pub fn compute(
        &self,
        store: &dyn ShardStore,
        stock: &StockId,
        method: EstimatorMethod,
    ) -> EstimatorResult<VolatilitySeries> {
        self.compute_rolling_volatility(store, stock, method, self.config.lookback_window)
    }

    /// Rolling volatility for one stock and method over its stored history.
    ///
    /// One point per non-empty trading day; the value is `None` until `lookback`
    /// trading days are available.
    pub fn compute_rolling_volatility(
        &self,
        store: &dyn ShardStore,
        stock: &StockId,
        method: EstimatorMethod,
        lookback: usize,
    ) -> EstimatorResult<VolatilitySeries> {
        let history = store.read_history(stock)?;
        let shards = history.len();
        let days: Vec<TradingDay> = history
            .into_iter()
            .filter_map(TradingDay::from_shard)
            .collect();
        if days.len() < shards {
            debug!(
                stock = %stock,
                skipped = shards - days.len(),
                "Skipped empty shards"
            );
        }

        let estimator = estimator_for(method);
        self.compute_over_days(stock, estimator.as_ref(), &days, lookback)
    }

    /// Rolling volatility over an in-memory, date-ascending slice of trading days.
    pub fn compute_over_days(
        &self,
        stock: &StockId,
        estimator: &dyn VolatilityEstimator,
        days: &[TradingDay],
        lookback: usize,
    ) -> EstimatorResult<VolatilitySeries> {
        let method = estimator.method();
        if lookback == 0 || lookback < estimator.min_window() {
            return Err(EstimatorError::LookbackTooShort {
                method,
                lookback,
                minimum: estimator.min_window().max(1),
            });
        }

        let mut series = VolatilitySeries::new(stock.clone(), method, lookback);
        series.points.reserve(days.len());

        for (i, day) in days.iter().enumerate() {
            let value = if i + 1 < lookback {
                None
            } else {
                let start = i + 1 - lookback;
                let anchor = start.checked_sub(1).map(|j| &days[j]);
                let window = EstimationWindow::new(&days[start..=i], anchor);
                match estimator.estimate(&window) {
                    Some(v) if v.is_finite() => Some(v * self.config.annualization_factor),
                    Some(v) => {
                        warn!(stock = %stock, method = %method, date = %day.date(), value = v, "Non-finite estimate dropped");
                        None
                    }
                    None => None,
                }
            };
            series.points.push((day.date(), value));
        }

        debug!(
            stock = %stock,
            method = %method,
            lookback,
            days = days.len(),
            defined = series.defined_count(),
            "Computed rolling volatility"
        );
        Ok(series)
    }
}
