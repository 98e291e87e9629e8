//! The estimator seam.

use crate::close_to_close::{CloseToCloseAverageRealisedVariance, CloseToCloseStdDeviation};
use crate::realised::TickAverageRealisedVariance;
use crate::yang_zhang::YangZhang;
use volest_core::{EstimatorMethod, TradingDay};

/// The trading days one estimate is computed from.
///
/// `days` is the lookback window in ascending date order. `anchor` is the
/// trading day immediately preceding the window, when history has one;
/// estimators use it for the return that crosses into the first window day.
#[derive(Debug, Clone, Copy)]
pub struct EstimationWindow<'a> {
    pub days: &'a [TradingDay],
    pub anchor: Option<&'a TradingDay>,
}

impl<'a> EstimationWindow<'a> {
    pub fn new(days: &'a [TradingDay], anchor: Option<&'a TradingDay>) -> Self {
        Self { days, anchor }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Close of the day before `days[index]`, from the anchor for index 0.
    pub fn previous_close(&self, index: usize) -> Option<f64> {
        match index {
            0 => self.anchor.map(TradingDay::close),
            i => self.days.get(i - 1).map(TradingDay::close),
        }
    }
}

/// A historical volatility estimator over a window of trading days.
///
/// Implementations return a per-period standard deviation, or `None` when
/// the window cannot support an estimate.
pub trait VolatilityEstimator: Send + Sync {
    fn method(&self) -> EstimatorMethod;

    /// Smallest lookback the estimator accepts.
    fn min_window(&self) -> usize;

    fn estimate(&self, window: &EstimationWindow<'_>) -> Option<f64>;
}

/// Estimator implementation for a method.
pub fn estimator_for(method: EstimatorMethod) -> Box<dyn VolatilityEstimator> {
    match method {
        EstimatorMethod::TickAverageRealisedVariance => Box::new(TickAverageRealisedVariance),
        EstimatorMethod::CloseToCloseStdDeviation => Box::new(CloseToCloseStdDeviation),
        EstimatorMethod::CloseToCloseAverageRealisedVariance => {
            Box::new(CloseToCloseAverageRealisedVariance)
        }
        EstimatorMethod::YangZhang => Box::new(YangZhang),
    }
}
