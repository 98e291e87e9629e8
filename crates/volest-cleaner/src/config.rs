//! Trade cleaner configuration.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use volest_core::{CoreError, SessionWindow};

/// Cleaner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Session start (inclusive), exchange-local time. Default: 08:00.
    #[serde(default = "default_session_start")]
    pub session_start: NaiveTime,

    /// Session end (exclusive), exchange-local time. Default: 16:30.
    #[serde(default = "default_session_end")]
    pub session_end: NaiveTime,

    /// Number of neighbours in the centered outlier window (half before,
    /// half after). Must be even. Default: 50.
    #[serde(default = "default_outlier_window")]
    pub outlier_window: usize,

    /// An observation further than `outlier_threshold` × MAD from its
    /// neighbourhood mean is dropped. Default: 10.
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f64,
}

fn default_session_start() -> NaiveTime {
    SessionWindow::default().start
}

fn default_session_end() -> NaiveTime {
    SessionWindow::default().end
}

fn default_outlier_window() -> usize {
    50
}

fn default_outlier_threshold() -> f64 {
    10.0
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            session_start: default_session_start(),
            session_end: default_session_end(),
            outlier_window: default_outlier_window(),
            outlier_threshold: default_outlier_threshold(),
        }
    }
}

impl CleanerConfig {
    pub fn session(&self) -> Result<SessionWindow, CoreError> {
        SessionWindow::new(self.session_start, self.session_end)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.session()?;
        if self.outlier_window == 0 || self.outlier_window % 2 != 0 {
            return Err(CoreError::InvalidConfig(format!(
                "outlier_window must be a positive even number, got {}",
                self.outlier_window
            )));
        }
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "outlier_threshold must be positive, got {}",
                self.outlier_threshold
            )));
        }
        Ok(())
    }
}
