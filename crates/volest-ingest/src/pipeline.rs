//! Ingestion pipeline: clean, adjust for splits, store.

use crate::adjuster::SplitAdjuster;
use crate::error::{IngestError, IngestResult};
use crate::loader::{discover_raw_files, load_raw_file};
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volest_cleaner::{CleanReport, CleanerConfig, DropCounts, TradeCleaner};
use volest_core::{PriceObservation, PriceShard, RawTrade, StockId};
use volest_persistence::ShardStore;
use volest_registry::SplitRegistry;
use volest_telemetry::Metrics;

/// What one ingestion did to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// New shard written.
    Stored { observations: usize },
    /// A split took effect: prior shards were rescaled and committed with the new shard.
    SplitAdjusted {
        observations: usize,
        factor: f64,
        rewritten: usize,
    },
    /// Nothing survived cleaning. Without a split nothing is written; with
    /// one, `rewritten` prior shards were rescaled and an empty shard marks the day.
    Empty { rewritten: usize },
    /// The day was already stored; nothing changed.
    AlreadyStored,
}

impl IngestOutcome {
    /// Whether stored history changed.
    pub fn changed_history(&self) -> bool {
        match self {
            IngestOutcome::Stored { .. } | IngestOutcome::SplitAdjusted { .. } => true,
            IngestOutcome::Empty { rewritten } => *rewritten > 0,
            IngestOutcome::AlreadyStored => false,
        }
    }
}

/// Result of ingesting one raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub stock: StockId,
    pub date: NaiveDate,
    pub path: PathBuf,
    pub input_count: usize,
    pub drops: DropCounts,
    pub outcome: IngestOutcome,
}

/// Summary of a directory run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub failed: Vec<(PathBuf, String)>,
    /// Files not attempted because an earlier day of the same stock failed.
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// Stocks whose stored history changed during the run.
    pub fn changed_stocks(&self) -> Vec<StockId> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|f| f.outcome.changed_history())
            .filter(|f| seen.insert(f.stock.clone()))
            .map(|f| f.stock.clone())
            .collect()
    }
}

/// Orchestrates cleaner → split adjuster → store for one stock-day at a time.
///
/// Ingestions of the same stock are serialised; different stocks proceed
/// in parallel.
pub struct IngestionPipeline {
    store: Arc<dyn ShardStore>,
    adjuster: SplitAdjuster,
    cleaner: TradeCleaner,
    writers: DashMap<StockId, Arc<Mutex<()>>>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ShardStore>,
        registry: Arc<dyn SplitRegistry>,
        cleaner_config: &CleanerConfig,
    ) -> IngestResult<Self> {
        Ok(Self {
            store,
            adjuster: SplitAdjuster::new(registry),
            cleaner: TradeCleaner::new(cleaner_config)?,
            writers: DashMap::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn ShardStore> {
        &self.store
    }

    fn writer_lock(&self, stock: &StockId) -> Arc<Mutex<()>> {
        self.writers
            .entry(stock.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Store one cleaned stock-day, applying any split effective on `date`.
    ///
    /// Days must arrive in increasing date order per stock. Re-ingesting a
    /// stored day is a no-op; a day older than the latest stored one is
    /// rejected. With a split, the rescaled history and the new shard are
    /// committed together or not at all.
    pub fn ingest(
        &self,
        stock: &StockId,
        date: NaiveDate,
        observations: Vec<PriceObservation>,
    ) -> IngestResult<IngestOutcome> {
        let lock = self.writer_lock(stock);
        let _guard = lock.lock();

        let result = self.ingest_locked(stock, date, observations);
        if let Err(e) = &result {
            Metrics::ingest_failed(e.reason());
            error!(stock = %stock, date = %date, error = %e, "Ingestion failed");
        }
        result
    }

    fn ingest_locked(
        &self,
        stock: &StockId,
        date: NaiveDate,
        observations: Vec<PriceObservation>,
    ) -> IngestResult<IngestOutcome> {
        let dates = self.store.list_dates(stock)?;
        if dates.binary_search(&date).is_ok() {
            info!(stock = %stock, date = %date, "Day already stored, skipping");
            return Ok(IngestOutcome::AlreadyStored);
        }
        if let Some(&latest) = dates.last() {
            if date < latest {
                return Err(IngestError::OutOfOrder {
                    stock: stock.to_string(),
                    date,
                    latest,
                });
            }
        }

        let count = observations.len();
        let Some(plan) = self.adjuster.plan(self.store.as_ref(), stock, date)? else {
            if observations.is_empty() {
                warn!(stock = %stock, date = %date, "No observations survived cleaning");
                return Ok(IngestOutcome::Empty { rewritten: 0 });
            }
            self.store.write_shard(stock, date, &observations)?;
            Metrics::shard_written(stock.as_str());
            Metrics::observations_stored(stock.as_str(), count);
            info!(stock = %stock, date = %date, observations = count, "Stored shard");
            return Ok(IngestOutcome::Stored {
                observations: count,
            });
        };

        // An empty split day is still committed as an empty shard so that a
        // replay of the day is recognised and the split is not applied twice.
        let factor = plan.factor;
        let rewritten = plan.rewritten.len();
        let commit = plan.into_commit(Some(PriceShard::new(stock.clone(), date, observations)));
        self.store
            .commit_shards(stock, &commit)
            .map_err(|source| IngestError::AdjustmentFailure {
                stock: stock.to_string(),
                date,
                source,
            })?;

        Metrics::split_adjusted(stock.as_str(), rewritten);
        info!(
            stock = %stock,
            date = %date,
            factor,
            rewritten,
            observations = count,
            "Applied split and stored shard"
        );

        if count == 0 {
            warn!(stock = %stock, date = %date, "No observations survived cleaning");
            return Ok(IngestOutcome::Empty { rewritten });
        }
        Metrics::shard_written(stock.as_str());
        Metrics::observations_stored(stock.as_str(), count);
        Ok(IngestOutcome::SplitAdjusted {
            observations: count,
            factor,
            rewritten,
        })
    }

    /// Clean raw trades for one stock-day.
    ///
    /// Observations dated on another day are dropped as out of session.
    pub fn clean(&self, stock: &StockId, date: NaiveDate, raw: &[RawTrade]) -> CleanReport {
        let mut report = self.cleaner.clean(raw);
        let before = report.observations.len();
        report.observations.retain(|o| o.date == date);
        let foreign = before - report.observations.len();
        if foreign > 0 {
            warn!(stock = %stock, date = %date, foreign, "Dropped trades dated on another day");
            report.drops.out_of_session += foreign;
        }
        record_drops(stock, &report.drops);
        report
    }

    /// Clean and ingest raw trades for one stock-day.
    pub fn ingest_raw(
        &self,
        stock: &StockId,
        date: NaiveDate,
        raw: &[RawTrade],
    ) -> IngestResult<(CleanReport, IngestOutcome)> {
        let report = self.clean(stock, date, raw);
        let outcome = self.ingest(stock, date, report.observations.clone())?;
        Ok((report, outcome))
    }

    /// Load, clean and ingest one raw file.
    pub fn process_file(&self, path: &Path) -> IngestResult<FileReport> {
        let batch = load_raw_file(path).map_err(|e| {
            Metrics::ingest_failed(e.reason());
            e
        })?;
        let (mut report, outcome) = self.ingest_raw(&batch.stock, batch.date, &batch.trades)?;
        report.drops.malformed += batch.malformed_rows;
        Metrics::trades_dropped(batch.stock.as_str(), "malformed", batch.malformed_rows);

        debug!(
            path = %path.display(),
            input = report.input_count + batch.malformed_rows,
            dropped = report.drops.total(),
            "Processed raw file"
        );
        Ok(FileReport {
            stock: batch.stock,
            date: batch.date,
            path: path.to_path_buf(),
            input_count: report.input_count + batch.malformed_rows,
            drops: report.drops,
            outcome,
        })
    }

    /// Process every raw file in `dir`, each stock in date order.
    ///
    /// A failed day stops that stock's remaining files so history never has
    /// a gap followed by later days; other stocks continue.
    pub fn process_dir(&self, dir: &Path, prefix: Option<&str>) -> IngestResult<BatchReport> {
        let files = discover_raw_files(dir, prefix)?;
        let mut report = BatchReport::default();
        let mut failed_stocks: HashSet<StockId> = HashSet::new();

        for file in files {
            if failed_stocks.contains(&file.stock) {
                report.skipped.push(file.path);
                continue;
            }
            match self.process_file(&file.path) {
                Ok(file_report) => report.files.push(file_report),
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Raw file failed");
                    failed_stocks.insert(file.stock.clone());
                    report.failed.push((file.path, e.to_string()));
                }
            }
        }

        info!(
            dir = %dir.display(),
            processed = report.files.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Batch ingestion finished"
        );
        Ok(report)
    }
}

fn record_drops(stock: &StockId, drops: &DropCounts) {
    let stock = stock.as_str();
    Metrics::trades_dropped(stock, "malformed", drops.malformed);
    Metrics::trades_dropped(stock, "out_of_session", drops.out_of_session);
    Metrics::trades_dropped(stock, "non_positive_price", drops.non_positive_price);
    Metrics::trades_dropped(stock, "merged_duplicate", drops.merged_duplicates);
    Metrics::trades_dropped(stock, "outlier", drops.outliers);
}
