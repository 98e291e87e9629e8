//! Application orchestration.

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use volest_core::{EstimatorMethod, StockId, VolatilitySeries};
use volest_estimator::RollingVolatilityComputer;
use volest_ingest::{
    spawn_ingest_worker, BatchReport, FileReport, IngestObserver, IngestOutcome,
    IngestionPipeline,
};
use volest_persistence::{ParquetShardStore, ShardStore, VolatilityWriter};
use volest_telemetry::Metrics;

/// Capacity of the ingestion request channel.
const INGEST_QUEUE_CAPACITY: usize = 64;

/// Recomputes and writes volatility series for stocks.
///
/// Shared by batch runs and by the ingest worker, which calls it after each
/// ingestion that changed a stock's history.
pub struct VolatilityRefresher {
    store: Arc<dyn ShardStore>,
    computer: RollingVolatilityComputer,
    writer: VolatilityWriter,
    methods: Vec<EstimatorMethod>,
}

impl VolatilityRefresher {
    pub fn new(
        store: Arc<dyn ShardStore>,
        computer: RollingVolatilityComputer,
        writer: VolatilityWriter,
    ) -> Self {
        let methods = computer.config().methods.clone();
        Self {
            store,
            computer,
            writer,
            methods,
        }
    }

    /// Compute one series and write it.
    pub fn refresh_one(
        &self,
        stock: &StockId,
        method: EstimatorMethod,
        lookback: usize,
    ) -> AppResult<(VolatilitySeries, PathBuf)> {
        let series =
            self.computer
                .compute_rolling_volatility(self.store.as_ref(), stock, method, lookback)?;
        let path = self.writer.write(&series)?;
        Metrics::estimates_computed(stock.as_str(), method.as_str(), series.defined_count());
        Ok((series, path))
    }

    /// Regenerate every configured method for each stock, (stock, method)
    /// pairs in parallel.
    pub fn refresh(&self, stocks: &[StockId]) -> AppResult<Vec<PathBuf>> {
        let lookback = self.computer.config().lookback_window;
        let pairs: Vec<(&StockId, EstimatorMethod)> = stocks
            .iter()
            .flat_map(|s| self.methods.iter().map(move |m| (s, *m)))
            .collect();

        let paths = pairs
            .par_iter()
            .map(|(stock, method)| {
                self.refresh_one(stock, *method, lookback)
                    .map(|(_, path)| path)
            })
            .collect::<AppResult<Vec<_>>>()?;

        info!(
            stocks = stocks.len(),
            series = paths.len(),
            "Volatility regenerated"
        );
        Ok(paths)
    }
}

impl IngestObserver for VolatilityRefresher {
    fn on_history_changed(&self, stock: &StockId, date: NaiveDate, _outcome: &IngestOutcome) {
        if let Err(e) = self.refresh(std::slice::from_ref(stock)) {
            error!(stock = %stock, date = %date, error = %e, "Volatility refresh failed");
        }
    }
}

/// The volest application.
pub struct Application {
    config: AppConfig,
    store: Arc<ParquetShardStore>,
    pipeline: Arc<IngestionPipeline>,
    refresher: Arc<VolatilityRefresher>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let store = Arc::new(ParquetShardStore::open(config.data.prices_dir())?);
        let registry = Arc::new(config.split_registry()?);
        let pipeline = Arc::new(IngestionPipeline::new(
            store.clone(),
            registry,
            &config.cleaner,
        )?);
        let computer = RollingVolatilityComputer::new(config.estimator.clone())?;
        let writer = VolatilityWriter::new(config.data.volatility_dir());
        let refresher = Arc::new(VolatilityRefresher::new(store.clone(), computer, writer));

        info!(
            data_dir = %config.data.data_dir.display(),
            splits = config.splits.len(),
            methods = config.estimator.methods.len(),
            lookback = config.estimator.lookback_window,
            "Application initialised"
        );

        Ok(Self {
            config,
            store,
            pipeline,
            refresher,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ParquetShardStore {
        &self.store
    }

    /// Ingest every raw file, then regenerate volatility for all stored stocks.
    pub fn run_batch(&self) -> AppResult<BatchReport> {
        let raw_dir = self.config.data.raw_dir();
        info!(raw_dir = %raw_dir.display(), "Starting batch run");

        let report = self
            .pipeline
            .process_dir(&raw_dir, self.config.data.raw_file_prefix.as_deref())?;
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Some raw files failed");
        }

        self.compute_all()?;
        Ok(report)
    }

    /// Ingest one raw file and regenerate its stock's volatility if history changed.
    pub fn ingest_file(&self, path: &Path) -> AppResult<FileReport> {
        let report = self.pipeline.process_file(path)?;
        if report.outcome.changed_history() {
            self.refresher.refresh(std::slice::from_ref(&report.stock))?;
        }
        Ok(report)
    }

    /// Ingest files through the ingest worker, in the order given.
    ///
    /// Failures are reported per file; the run continues with the next file.
    pub async fn ingest_files(&self, paths: Vec<PathBuf>) -> Vec<(PathBuf, AppResult<FileReport>)> {
        let observer: Arc<dyn IngestObserver> = self.refresher.clone();
        let (handle, join) =
            spawn_ingest_worker(self.pipeline.clone(), Some(observer), INGEST_QUEUE_CAPACITY);

        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = handle.ingest_file(path.clone()).await.map_err(Into::into);
            results.push((path, result));
        }

        handle.shutdown().await;
        if let Err(e) = join.await {
            error!(error = %e, "Ingest worker panicked");
        }
        results
    }

    /// Regenerate volatility for every stored stock.
    pub fn compute_all(&self) -> AppResult<Vec<PathBuf>> {
        let stocks = self.store.list_stocks()?;
        self.refresher.refresh(&stocks)
    }

    /// Compute one series with an explicit lookback and write it.
    pub fn compute(
        &self,
        stock: &StockId,
        method: EstimatorMethod,
        lookback: usize,
    ) -> AppResult<(VolatilitySeries, PathBuf)> {
        self.refresher.refresh_one(stock, method, lookback)
    }
}
