//! volest - historical volatility from tick data.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use volest_app::{AppConfig, Application};
use volest_core::{EstimatorMethod, StockId};
use volest_persistence::ShardStore;

/// Historical volatility estimation from tick data
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VOLEST_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every raw file in the raw directory and regenerate all volatility series
    Batch,
    /// Ingest raw files in order, regenerating volatility for each changed stock
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Regenerate volatility series from the stored prices
    Compute {
        /// Only this stock
        #[arg(long)]
        stock: Option<String>,
        /// Only this method (e.g. yang_zhang)
        #[arg(long)]
        method: Option<EstimatorMethod>,
        /// Lookback window in trading days (default from config)
        #[arg(long)]
        lookback: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    volest_telemetry::init_logging()?;

    info!("Starting volest v{}", env!("CARGO_PKG_VERSION"));

    let (config_path, required) = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = AppConfig::load(&config_path, required)?;

    let app = Application::new(config)?;

    match args.command {
        Command::Batch => {
            let report = app.run_batch()?;
            info!(
                files = report.files.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                "Batch run complete"
            );
            for (path, reason) in &report.failed {
                warn!(path = %path.display(), reason = %reason, "Failed raw file");
            }
        }
        Command::Ingest { files } => {
            let mut failures = 0;
            for (path, result) in app.ingest_files(files).await {
                match result {
                    Ok(report) => info!(
                        path = %path.display(),
                        stock = %report.stock,
                        date = %report.date,
                        outcome = ?report.outcome,
                        dropped = report.drops.total(),
                        "Ingested"
                    ),
                    Err(e) => {
                        failures += 1;
                        warn!(path = %path.display(), error = %e, "Ingestion failed");
                    }
                }
            }
            if failures > 0 {
                bail!("{failures} file(s) failed to ingest");
            }
        }
        Command::Compute {
            stock,
            method,
            lookback,
        } => {
            let lookback = lookback.unwrap_or(app.config().estimator.lookback_window);
            match (stock, method) {
                (None, None) if lookback == app.config().estimator.lookback_window => {
                    let paths = app.compute_all()?;
                    info!(series = paths.len(), "Volatility regenerated");
                }
                (stock, method) => {
                    let stocks = match stock {
                        Some(s) => vec![StockId::new(s)?],
                        None => app.store().list_stocks()?,
                    };
                    let methods = match method {
                        Some(m) => vec![m],
                        None => app.config().estimator.methods.clone(),
                    };
                    for stock in &stocks {
                        for method in &methods {
                            let (series, path) = app.compute(stock, *method, lookback)?;
                            info!(
                                stock = %stock,
                                method = %method,
                                defined = series.defined_count(),
                                path = %path.display(),
                                "Volatility written"
                            );
                        }
                    }
                }
            }
        }
    }

    match volest_telemetry::Metrics::gather_text() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to gather metrics"),
    }

    Ok(())
}
