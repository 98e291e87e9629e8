//! Volatility estimator identifiers and outputs.

use crate::error::CoreError;
use crate::types::StockId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Volatility estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorMethod {
    /// Mean daily realised variance from intraday tick returns.
    TickAverageRealisedVariance,
    /// Sample standard deviation of daily close-to-close log returns.
    CloseToCloseStdDeviation,
    /// Root mean squared daily close-to-close log return.
    CloseToCloseAverageRealisedVariance,
    /// Yang-Zhang OHLC estimator.
    YangZhang,
}

impl EstimatorMethod {
    pub const ALL: [EstimatorMethod; 4] = [
        Self::TickAverageRealisedVariance,
        Self::CloseToCloseStdDeviation,
        Self::CloseToCloseAverageRealisedVariance,
        Self::YangZhang,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TickAverageRealisedVariance => "tick_average_realised_variance",
            Self::CloseToCloseStdDeviation => "close_to_close_std_deviation",
            Self::CloseToCloseAverageRealisedVariance => "close_to_close_average_realised_variance",
            Self::YangZhang => "yang_zhang",
        }
    }
}

impl fmt::Display for EstimatorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimatorMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMethod(s.to_string()))
    }
}

/// One volatility value for a (stock, method, date).
///
/// `value` is `None` when fewer than `lookback_window` trading days were available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityEstimate {
    pub stock: StockId,
    pub method: EstimatorMethod,
    pub lookback_window: usize,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Date-indexed volatility series for one (stock, method, lookback).
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySeries {
    pub stock: StockId,
    pub method: EstimatorMethod,
    pub lookback_window: usize,
    /// Ascending by date, one entry per stored trading day.
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl VolatilitySeries {
    pub fn new(stock: StockId, method: EstimatorMethod, lookback_window: usize) -> Self {
        Self {
            stock,
            method,
            lookback_window,
            points: Vec::new(),
        }
    }

    /// Value at `date`, `None` if the date is unknown or has insufficient history.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .and_then(|idx| self.points[idx].1)
    }

    /// Dates with a defined value, ascending.
    pub fn defined(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().filter_map(|(d, v)| v.map(|v| (*d, v)))
    }

    pub fn defined_count(&self) -> usize {
        self.defined().count()
    }

    pub fn estimates(&self) -> impl Iterator<Item = VolatilityEstimate> + '_ {
        self.points.iter().map(|(date, value)| VolatilityEstimate {
            stock: self.stock.clone(),
            method: self.method,
            lookback_window: self.lookback_window,
            date: *date,
            value: *value,
        })
    }
}
