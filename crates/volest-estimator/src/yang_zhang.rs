//! Yang-Zhang estimator over daily OHLC bars.

use crate::estimator::{EstimationWindow, VolatilityEstimator};
use crate::stats::{log_return, mean, sample_variance, volatility_from_variance};
use volest_core::{DailyBar, EstimatorMethod, TradingDay};

/// Yang-Zhang drift-independent estimator.
///
/// σ² = σo² + k·σc² + (1 − k)·σrs² where σo² is the sample variance of
/// overnight returns ln(O/C₋₁), σc² the sample variance of open-to-close
/// returns ln(C/O), σrs² the mean Rogers-Satchell term and
/// k = 0.34 / (1.34 + (N + 1) / (N − 1)).
#[derive(Debug, Clone, Copy, Default)]
pub struct YangZhang;

impl YangZhang {
    pub fn weight(n: usize) -> f64 {
        let n = n as f64;
        0.34 / (1.34 + (n + 1.0) / (n - 1.0))
    }

    fn rogers_satchell(bar: &DailyBar) -> f64 {
        let hc = (bar.high / bar.close).ln();
        let ho = (bar.high / bar.open).ln();
        let lc = (bar.low / bar.close).ln();
        let lo = (bar.low / bar.open).ln();
        hc * ho + lc * lo
    }
}

impl VolatilityEstimator for YangZhang {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::YangZhang
    }

    fn min_window(&self) -> usize {
        3
    }

    fn estimate(&self, window: &EstimationWindow<'_>) -> Option<f64> {
        let n = window.len();
        if n < self.min_window() {
            return None;
        }
        let bars: Vec<DailyBar> = window.days.iter().map(TradingDay::bar).collect();

        let overnight: Vec<f64> = bars
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| window.previous_close(i).map(|prev| log_return(prev, bar.open)))
            .collect();
        let open_close: Vec<f64> = bars.iter().map(|b| log_return(b.open, b.close)).collect();
        let rs: Vec<f64> = bars.iter().map(Self::rogers_satchell).collect();

        let k = Self::weight(n);
        let variance = sample_variance(&overnight)?
            + k * sample_variance(&open_close)?
            + (1.0 - k) * mean(&rs)?;
        volatility_from_variance(variance)
    }
}
