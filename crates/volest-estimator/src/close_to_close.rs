//! Close-to-close estimators over daily closing prices.
//!
//! Both use the N − 1 log returns between consecutive closes inside the
//! window; the anchor day is not consulted.

use crate::estimator::{EstimationWindow, VolatilityEstimator};
use crate::stats::{log_return, mean, sample_variance, volatility_from_variance};
use volest_core::EstimatorMethod;

fn close_returns(window: &EstimationWindow<'_>) -> Vec<f64> {
    window
        .days
        .windows(2)
        .map(|pair| log_return(pair[0].close(), pair[1].close()))
        .collect()
}

fn has_min_window(window: &EstimationWindow<'_>, min: usize) -> bool {
    window.len() >= min && window.days.iter().all(|d| d.close() > 0.0)
}

/// Sample standard deviation of daily close-to-close log returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseToCloseStdDeviation;

impl VolatilityEstimator for CloseToCloseStdDeviation {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::CloseToCloseStdDeviation
    }

    /// Two returns are needed for a sample variance.
    fn min_window(&self) -> usize {
        3
    }

    fn estimate(&self, window: &EstimationWindow<'_>) -> Option<f64> {
        if !has_min_window(window, self.min_window()) {
            return None;
        }
        volatility_from_variance(sample_variance(&close_returns(window))?)
    }
}

/// Square root of the mean squared close-to-close log return.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseToCloseAverageRealisedVariance;

impl VolatilityEstimator for CloseToCloseAverageRealisedVariance {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::CloseToCloseAverageRealisedVariance
    }

    fn min_window(&self) -> usize {
        2
    }

    fn estimate(&self, window: &EstimationWindow<'_>) -> Option<f64> {
        if !has_min_window(window, self.min_window()) {
            return None;
        }
        let squared: Vec<f64> = close_returns(window).iter().map(|r| r * r).collect();
        volatility_from_variance(mean(&squared)?)
    }
}
