//! Trading session window.
//!
//! Trades are kept only when their local wall-clock time falls inside
//! `[start, end)`. The default window is the 08:00 – 16:30 exchange session.

use crate::error::{CoreError, Result};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open intraday session `[start, end)` in exchange-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if end <= start {
            return Err(CoreError::InvalidConfig(format!(
                "session end {end} must be after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Check if a timestamp falls inside the session.
    #[must_use]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let t = ts.time();
        t >= self.start && t < self.end
    }
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(16, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
