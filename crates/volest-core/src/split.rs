//! Stock split events.

use crate::error::{CoreError, Result};
use crate::types::StockId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A split effective on `effective_date`.
///
/// Prices stored before `effective_date` are multiplied by `factor` so that
/// they are quoted on the post-split basis. A 10-for-1 split has factor 0.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub stock: StockId,
    pub effective_date: NaiveDate,
    pub factor: f64,
}

impl SplitEvent {
    pub fn new(stock: StockId, effective_date: NaiveDate, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "split factor for {stock} on {effective_date} must be positive and finite, got {factor}"
            )));
        }
        Ok(Self {
            stock,
            effective_date,
            factor,
        })
    }

    /// Build from a share ratio (new shares per old share), e.g. 10 for a 10-for-1 split.
    pub fn from_ratio(stock: StockId, effective_date: NaiveDate, ratio: f64) -> Result<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "split ratio for {stock} on {effective_date} must be positive and finite, got {ratio}"
            )));
        }
        Self::new(stock, effective_date, 1.0 / ratio)
    }

    /// Whether applying this split changes any price.
    pub fn is_effective(&self) -> bool {
        self.factor != 1.0
    }
}
