//! Tick and cleaned price types.

use crate::error::{CoreError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock identifier.
///
/// Used verbatim as a partition directory name, so only ASCII
/// alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StockId(String);

impl StockId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CoreError::InvalidStockId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StockId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StockId> for String {
    fn from(id: StockId) -> Self {
        id.0
    }
}

/// Timestamp layouts accepted in raw trade files.
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Raw trade row as delivered by the file source, before timestamp parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub ts: String,
    pub price: f64,
    #[serde(default)]
    pub size: Option<f64>,
}

impl RawTrade {
    pub fn new(ts: impl Into<String>, price: f64) -> Self {
        Self {
            ts: ts.into(),
            price,
            size: None,
        }
    }

    /// Parse into a [`Trade`].
    ///
    /// Timestamps carrying an offset are taken at their local wall-clock time,
    /// since the session filter is expressed in exchange-local hours.
    pub fn parse(&self) -> Result<Trade> {
        let ts = self.ts.trim();
        let timestamp = TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(ts)
                    .ok()
                    .map(|dt| dt.naive_local())
            })
            .ok_or_else(|| CoreError::Validation(format!("unparsable timestamp '{}'", self.ts)))?;

        if self.price.is_nan() {
            return Err(CoreError::Validation(format!(
                "price is NaN at '{}'",
                self.ts
            )));
        }

        Ok(Trade {
            timestamp,
            price: self.price,
            size: self.size,
        })
    }
}

/// A parsed trade record. Unsorted, possibly duplicated or out of session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub size: Option<f64>,
}

impl Trade {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            price,
            size: None,
        }
    }
}

/// A cleaned price observation. `date` is always `timestamp.date()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub date: NaiveDate,
}

impl PriceObservation {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            price,
            date: timestamp.date(),
        }
    }

    /// Same observation with the price multiplied by `factor`.
    #[must_use]
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            price: self.price * factor,
            ..*self
        }
    }
}

/// Cleaned series for one stock on one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceShard {
    pub stock: StockId,
    pub date: NaiveDate,
    pub observations: Vec<PriceObservation>,
}

impl PriceShard {
    pub fn new(stock: StockId, date: NaiveDate, observations: Vec<PriceObservation>) -> Self {
        Self {
            stock,
            date,
            observations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Copy of this shard with every price multiplied by `factor`.
    #[must_use]
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            stock: self.stock.clone(),
            date: self.date,
            observations: self.observations.iter().map(|o| o.rescaled(factor)).collect(),
        }
    }
}

/// One trading day of cleaned observations, as seen by the estimators.
///
/// Never empty: construct through [`TradingDay::new`] or [`TradingDay::from_shard`].
#[derive(Debug, Clone, PartialEq)]
pub struct TradingDay {
    date: NaiveDate,
    observations: Vec<PriceObservation>,
}

impl TradingDay {
    pub fn new(date: NaiveDate, observations: Vec<PriceObservation>) -> Option<Self> {
        if observations.is_empty() {
            return None;
        }
        Some(Self { date, observations })
    }

    pub fn from_shard(shard: PriceShard) -> Option<Self> {
        Self::new(shard.date, shard.observations)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn open(&self) -> f64 {
        self.observations[0].price
    }

    pub fn close(&self) -> f64 {
        self.observations[self.observations.len() - 1].price
    }

    pub fn high(&self) -> f64 {
        self.observations
            .iter()
            .map(|o| o.price)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn low(&self) -> f64 {
        self.observations
            .iter()
            .map(|o| o.price)
            .fold(f64::INFINITY, f64::min)
    }

    /// Resample to a daily OHLC bar.
    pub fn bar(&self) -> DailyBar {
        DailyBar {
            date: self.date,
            open: self.open(),
            high: self.high(),
            low: self.low(),
            close: self.close(),
        }
    }
}

/// Daily OHLC bar resampled from ticks (open = first, close = last observation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}
