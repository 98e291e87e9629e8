//! Application configuration.

use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use volest_cleaner::CleanerConfig;
use volest_core::{SplitEvent, StockId};
use volest_estimator::EstimatorConfig;
use volest_registry::StaticSplitRegistry;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "VOLEST_CONFIG";

/// Configuration file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const ENV_PREFIX: &str = "VOLEST";
const ENV_SEPARATOR: &str = "__";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub cleaner: CleanerConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Known stock splits.
    #[serde(default)]
    pub splits: Vec<SplitConfig>,
}

/// Data directory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory. Default: `data`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Raw CSV directory. Default: `{data_dir}/raw`.
    #[serde(default)]
    pub raw_dir: Option<PathBuf>,

    /// Only raw files named `{prefix}_<stock>_<YYYYMMDD>.csv` are picked up.
    #[serde(default)]
    pub raw_file_prefix: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            raw_dir: None,
            raw_file_prefix: None,
        }
    }
}

impl DataConfig {
    pub fn raw_dir(&self) -> PathBuf {
        self.raw_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("raw"))
    }

    /// Root of the sharded price store.
    pub fn prices_dir(&self) -> PathBuf {
        self.data_dir.join("clean").join("prices")
    }

    /// Root of the volatility output files.
    pub fn volatility_dir(&self) -> PathBuf {
        self.data_dir.join("clean").join("historical_volatility")
    }
}

/// One split entry. Give either `factor` (multiplier applied to pre-split
/// prices) or `ratio` (shares after per share before, e.g. 10 for 10-for-1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub stock: String,
    pub effective_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

impl SplitConfig {
    pub fn to_event(&self) -> AppResult<SplitEvent> {
        let stock = StockId::new(self.stock.as_str())?;
        let event = match (self.factor, self.ratio) {
            (Some(factor), None) => SplitEvent::new(stock, self.effective_date, factor)?,
            (None, Some(ratio)) => SplitEvent::from_ratio(stock, self.effective_date, ratio)?,
            _ => {
                return Err(AppError::Config(format!(
                    "split for {} on {} needs exactly one of factor or ratio",
                    self.stock, self.effective_date
                )))
            }
        };
        Ok(event)
    }
}

impl AppConfig {
    /// Resolve the configuration path: explicit > `VOLEST_CONFIG` > default.
    ///
    /// Returns the path and whether it was asked for explicitly.
    pub fn resolve_path(explicit: Option<PathBuf>) -> (PathBuf, bool) {
        match explicit.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from)) {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }

    /// Load from an optional TOML file overlaid with `VOLEST__SECTION__KEY`
    /// environment variables, then validate.
    ///
    /// A missing file is an error only when `required`.
    pub fn load(path: &Path, required: bool) -> AppResult<Self> {
        if !required && !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        }
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file, without environment overrides.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.cleaner.validate()?;
        self.estimator.validate()?;
        for split in &self.splits {
            split.to_event()?;
        }
        Ok(())
    }

    /// Split registry built from the `[[splits]]` table.
    pub fn split_registry(&self) -> AppResult<StaticSplitRegistry> {
        let events = self
            .splits
            .iter()
            .map(SplitConfig::to_event)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(StaticSplitRegistry::from_events(events)?)
    }
}
