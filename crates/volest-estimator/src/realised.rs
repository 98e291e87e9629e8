//! Tick-level average realised variance.

use crate::estimator::{EstimationWindow, VolatilityEstimator};
use crate::stats::{log_return, mean, volatility_from_variance};
use volest_core::EstimatorMethod;

/// Square root of the window's mean daily realised variance.
///
/// A day's realised variance is the sum of squared log returns between its
/// consecutive observations. The first return of each day runs from the
/// previous trading day's last observation, so overnight and weekend jumps
/// are included. The first window day borrows the anchor's close when there
/// is one and contributes intraday returns only otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickAverageRealisedVariance;

impl TickAverageRealisedVariance {
    fn daily_realised_variance(window: &EstimationWindow<'_>, index: usize) -> f64 {
        let day = &window.days[index];
        let mut previous = window.previous_close(index);
        let mut sum = 0.0;
        for obs in day.observations() {
            if let Some(prev) = previous {
                sum += log_return(prev, obs.price).powi(2);
            }
            previous = Some(obs.price);
        }
        sum
    }
}

impl VolatilityEstimator for TickAverageRealisedVariance {
    fn method(&self) -> EstimatorMethod {
        EstimatorMethod::TickAverageRealisedVariance
    }

    fn min_window(&self) -> usize {
        1
    }

    fn estimate(&self, window: &EstimationWindow<'_>) -> Option<f64> {
        if window.len() < self.min_window() {
            return None;
        }
        let daily: Vec<f64> = (0..window.len())
            .map(|i| Self::daily_realised_variance(window, i))
            .collect();
        volatility_from_variance(mean(&daily)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::test_support::day;

    #[test]
    fn test_single_day_intraday_returns() {
        let days = vec![day(0, &[100.0, 101.0, 100.0])];
        let value = TickAverageRealisedVariance
            .estimate(&EstimationWindow::new(&days, None))
            .unwrap();
        let expected = ((1.01f64).ln().powi(2) + (100.0f64 / 101.0).ln().powi(2)).sqrt();
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_overnight_jump_is_included() {
        // Flat days with a gap between them: all variance comes from the jump.
        let days = vec![day(0, &[100.0, 100.0]), day(1, &[110.0, 110.0])];
        let value = TickAverageRealisedVariance
            .estimate(&EstimationWindow::new(&days, None))
            .unwrap();
        let expected = ((1.1f64).ln().powi(2) / 2.0).sqrt();
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_anchor_feeds_first_day() {
        let anchor = day(0, &[90.0]);
        let days = vec![day(1, &[100.0, 100.0])];

        let with_anchor = TickAverageRealisedVariance
            .estimate(&EstimationWindow::new(&days, Some(&anchor)))
            .unwrap();
        let without = TickAverageRealisedVariance
            .estimate(&EstimationWindow::new(&days, None))
            .unwrap();

        assert!((with_anchor - (100.0f64 / 90.0).ln().abs()).abs() < 1e-12);
        assert_eq!(without, 0.0);
    }

    #[test]
    fn test_empty_window_is_undefined() {
        assert_eq!(
            TickAverageRealisedVariance.estimate(&EstimationWindow::new(&[], None)),
            None
        );
    }
}
