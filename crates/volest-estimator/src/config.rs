//! Estimator configuration.

use crate::error::{EstimatorError, EstimatorResult};
use crate::estimator::estimator_for;
use serde::{Deserialize, Serialize};
use volest_core::EstimatorMethod;

/// Rolling estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Trailing trading days per estimate. Default: 30.
    #[serde(default = "default_lookback_window")]
    pub lookback_window: usize,

    /// Linear scaling applied to every estimate, e.g. sqrt(252) to annualise
    /// daily values. Default: 1.0 (per-period).
    #[serde(default = "default_annualization_factor")]
    pub annualization_factor: f64,

    /// Methods computed by batch and incremental runs.
    #[serde(default = "default_methods")]
    pub methods: Vec<EstimatorMethod>,
}

fn default_lookback_window() -> usize {
    30
}

fn default_annualization_factor() -> f64 {
    1.0
}

fn default_methods() -> Vec<EstimatorMethod> {
    vec![
        EstimatorMethod::TickAverageRealisedVariance,
        EstimatorMethod::CloseToCloseStdDeviation,
        EstimatorMethod::YangZhang,
    ]
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            lookback_window: default_lookback_window(),
            annualization_factor: default_annualization_factor(),
            methods: default_methods(),
        }
    }
}

impl EstimatorConfig {
    /// Factor for annualising daily values over `trading_days` per year.
    pub fn annualization_for(trading_days: u32) -> f64 {
        f64::from(trading_days).sqrt()
    }

    pub fn validate(&self) -> EstimatorResult<()> {
        if self.lookback_window == 0 {
            return Err(EstimatorError::InvalidConfig(
                "lookback_window must be at least 1".to_string(),
            ));
        }
        if !self.annualization_factor.is_finite() || self.annualization_factor <= 0.0 {
            return Err(EstimatorError::InvalidConfig(format!(
                "annualization_factor must be positive, got {}",
                self.annualization_factor
            )));
        }
        if self.methods.is_empty() {
            return Err(EstimatorError::InvalidConfig(
                "at least one estimator method is required".to_string(),
            ));
        }
        for &method in &self.methods {
            let minimum = estimator_for(method).min_window();
            if self.lookback_window < minimum {
                return Err(EstimatorError::LookbackTooShort {
                    method,
                    lookback: self.lookback_window,
                    minimum,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EstimatorConfig::default();
        assert_eq!(config.lookback_window, 30);
        assert_eq!(config.annualization_factor, 1.0);
        assert_eq!(config.methods.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_method_names() {
        let config: EstimatorConfig = toml::from_str(
            r#"
            lookback_window = 20
            methods = ["yang_zhang", "close_to_close_average_realised_variance"]
            "#,
        )
        .unwrap();
        assert_eq!(config.lookback_window, 20);
        assert_eq!(
            config.methods,
            vec![
                EstimatorMethod::YangZhang,
                EstimatorMethod::CloseToCloseAverageRealisedVariance
            ]
        );
    }

    #[test]
    fn test_validate() {
        let mut config = EstimatorConfig {
            lookback_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.lookback_window = 5;
        config.annualization_factor = -1.0;
        assert!(config.validate().is_err());
        config.annualization_factor = EstimatorConfig::annualization_for(252);
        assert!((config.annualization_factor - 15.874_507_866).abs() < 1e-6);
        config.methods.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookback_checked_against_each_method() {
        let mut config = EstimatorConfig {
            lookback_window: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EstimatorError::LookbackTooShort {
                lookback: 2,
                minimum: 3,
                ..
            })
        ));

        config.methods = vec![
            EstimatorMethod::TickAverageRealisedVariance,
            EstimatorMethod::CloseToCloseAverageRealisedVariance,
        ];
        assert!(config.validate().is_ok());
    }
}
