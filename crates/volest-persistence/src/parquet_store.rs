//! Parquet-backed shard store.
//!
//! Single-shard writes go to a temporary file that is renamed into place.
//! Multi-shard commits use write-ahead staging:
//!
//! 1. every shard is written under `{stock}.parquet/.staging-{id}/`
//! 2. a `COMMIT` manifest is written into the staging directory
//! 3. replaced partitions are moved to `.staging-{id}/.backup/` and staged
//!    files are renamed into place
//! 4. the staging directory is removed
//!
//! A failure before step 2 discards the staging directory and leaves history
//! untouched. A failure during step 3 moves every placed file back into
//! staging, restores the backups and removes the manifest, so a commit that
//! returns an error never takes effect. Only a crash after step 2 leaves a
//! committed manifest behind; it is rolled forward before the stock is next
//! read or written, so a stock is never observed with only part of a commit
//! applied.

use crate::codec::{read_observations, write_observations};
use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{validate_commit, validate_observations, ShardStore, StockLocks};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use volest_core::{PriceObservation, PriceShard, StockId};

const PART_FILE: &str = "part-0.parquet";
const PARTITION_PREFIX: &str = "date=";
const STAGING_PREFIX: &str = ".staging-";
const COMMIT_MARKER: &str = "COMMIT";
const BACKUP_DIR: &str = ".backup";
const STOCK_SUFFIX: &str = ".parquet";

/// Manifest written once every shard of a commit is staged.
#[derive(Debug, Serialize, Deserialize)]
struct CommitManifest {
    stock: String,
    dates: Vec<NaiveDate>,
}

/// One partition swapped in by a commit that is still in progress.
struct SwappedPartition {
    target_dir: PathBuf,
    staged: PathBuf,
    backup: Option<PathBuf>,
    created_dir: bool,
    placed: bool,
}

impl SwappedPartition {
    fn target(&self) -> PathBuf {
        self.target_dir.join(PART_FILE)
    }
}

/// Shard store over a directory of Hive-partitioned Parquet files.
pub struct ParquetShardStore {
    root: PathBuf,
    locks: StockLocks,
}

impl ParquetShardStore {
    /// Open (or create) a store rooted at `root`, finishing any commit that
    /// was interrupted by a previous process.
    pub fn open(root: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let store = Self {
            root,
            locks: StockLocks::new(),
        };

        for stock in store.list_stocks()? {
            let lock = store.locks.get(&stock);
            let _guard = lock.write();
            store.recover(&stock)?;
        }

        info!(root = %store.root.display(), "Opened Parquet shard store");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stock_dir(&self, stock: &StockId) -> PathBuf {
        self.root.join(format!("{stock}{STOCK_SUFFIX}"))
    }

    fn partition_dir(stock_dir: &Path, date: NaiveDate) -> PathBuf {
        stock_dir.join(format!("{PARTITION_PREFIX}{}", date.format("%Y-%m-%d")))
    }

    fn parse_partition(name: &str) -> Option<NaiveDate> {
        let date = name.strip_prefix(PARTITION_PREFIX)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    fn staging_dirs(stock_dir: &Path) -> PersistenceResult<Vec<PathBuf>> {
        if !stock_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in fs::read_dir(stock_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    /// Roll forward committed staging directories and discard the rest.
    /// Caller must hold the stock's write lock.
    fn recover(&self, stock: &StockId) -> PersistenceResult<()> {
        let stock_dir = self.stock_dir(stock);
        for staging in Self::staging_dirs(&stock_dir)? {
            let marker = staging.join(COMMIT_MARKER);
            if marker.is_file() {
                let manifest: CommitManifest = serde_json::from_slice(&fs::read(&marker)?)?;
                warn!(
                    stock = %stock,
                    shards = manifest.dates.len(),
                    staging = %staging.display(),
                    "Rolling forward interrupted commit"
                );
                Self::apply_staged(&stock_dir, &staging, &manifest.dates)?;
            } else {
                warn!(
                    stock = %stock,
                    staging = %staging.display(),
                    "Discarding uncommitted staging directory"
                );
            }
            fs::remove_dir_all(&staging)?;
        }
        Ok(())
    }

    /// Move staged partitions into place. Already-moved files are skipped.
    fn apply_staged(stock_dir: &Path, staging: &Path, dates: &[NaiveDate]) -> PersistenceResult<()> {
        for &date in dates {
            let staged = Self::partition_dir(staging, date).join(PART_FILE);
            if !staged.is_file() {
                continue;
            }
            let target_dir = Self::partition_dir(stock_dir, date);
            fs::create_dir_all(&target_dir)?;
            fs::rename(&staged, target_dir.join(PART_FILE))?;
        }
        Ok(())
    }

    /// Swap staged partitions into place, undoing every swap on failure.
    fn apply_commit(stock_dir: &Path, staging: &Path, dates: &[NaiveDate]) -> PersistenceResult<()> {
        let backup_root = staging.join(BACKUP_DIR);
        let mut swapped = Vec::with_capacity(dates.len());
        for &date in dates {
            if let Err(e) = Self::swap_in(stock_dir, staging, &backup_root, date, &mut swapped) {
                Self::roll_back(staging, &swapped)?;
                return Err(e);
            }
        }
        Ok(())
    }

    fn swap_in(
        stock_dir: &Path,
        staging: &Path,
        backup_root: &Path,
        date: NaiveDate,
        swapped: &mut Vec<SwappedPartition>,
    ) -> PersistenceResult<()> {
        let target_dir = Self::partition_dir(stock_dir, date);
        let created_dir = !target_dir.exists();
        fs::create_dir_all(&target_dir)?;

        let mut entry = SwappedPartition {
            staged: Self::partition_dir(staging, date).join(PART_FILE),
            target_dir,
            backup: None,
            created_dir,
            placed: false,
        };
        let result = Self::place(backup_root, date, &mut entry);
        swapped.push(entry);
        result
    }

    fn place(backup_root: &Path, date: NaiveDate, entry: &mut SwappedPartition) -> PersistenceResult<()> {
        let target = entry.target();
        if target.is_file() {
            let dir = Self::partition_dir(backup_root, date);
            fs::create_dir_all(&dir)?;
            let backup = dir.join(PART_FILE);
            fs::rename(&target, &backup)?;
            entry.backup = Some(backup);
        }
        fs::rename(&entry.staged, &target)?;
        entry.placed = true;
        Ok(())
    }

    /// Undo a partially applied commit, newest swap first, then drop the
    /// manifest. If undoing fails the manifest stays and the commit is rolled
    /// forward on the next access.
    fn roll_back(staging: &Path, swapped: &[SwappedPartition]) -> PersistenceResult<()> {
        for entry in swapped.iter().rev() {
            let target = entry.target();
            if entry.placed {
                fs::rename(&target, &entry.staged)?;
            }
            if let Some(backup) = &entry.backup {
                fs::rename(backup, &target)?;
            }
            if entry.created_dir {
                fs::remove_dir(&entry.target_dir)?;
            }
        }
        fs::remove_file(staging.join(COMMIT_MARKER))?;
        Ok(())
    }

    /// Recover under a write lock if an earlier commit left staging behind.
    fn ensure_recovered(&self, stock: &StockId) -> PersistenceResult<()> {
        if Self::staging_dirs(&self.stock_dir(stock))?.is_empty() {
            return Ok(());
        }
        let lock = self.locks.get(stock);
        let _guard = lock.write();
        self.recover(stock)
    }

    fn stage(&self, staging: &Path, stock: &StockId, shards: &[PriceShard]) -> PersistenceResult<()> {
        for shard in shards {
            let dir = Self::partition_dir(staging, shard.date);
            fs::create_dir_all(&dir)?;
            write_observations(&dir.join(PART_FILE), &shard.observations)?;
        }

        let manifest = CommitManifest {
            stock: stock.to_string(),
            dates: shards.iter().map(|s| s.date).collect(),
        };
        let tmp = staging.join(format!("{COMMIT_MARKER}.tmp"));
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec(&manifest)?)?;
        file.sync_all()?;
        fs::rename(&tmp, staging.join(COMMIT_MARKER))?;
        Ok(())
    }

    fn dates_unlocked(&self, stock: &StockId) -> PersistenceResult<Vec<NaiveDate>> {
        let stock_dir = self.stock_dir(stock);
        if !stock_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in fs::read_dir(&stock_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = Self::parse_partition(&name.to_string_lossy()) else {
                continue;
            };
            if entry.path().join(PART_FILE).is_file() {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    fn read_unlocked(&self, stock: &StockId, date: NaiveDate) -> PersistenceResult<PriceShard> {
        let path = Self::partition_dir(&self.stock_dir(stock), date).join(PART_FILE);
        if !path.is_file() {
            return Err(PersistenceError::NotFound {
                stock: stock.to_string(),
                date,
            });
        }
        let observations = read_observations(&path)?;
        Ok(PriceShard::new(stock.clone(), date, observations))
    }
}

impl ShardStore for ParquetShardStore {
    fn write_shard(
        &self,
        stock: &StockId,
        date: NaiveDate,
        observations: &[PriceObservation],
    ) -> PersistenceResult<()> {
        validate_observations(stock, date, observations)?;

        let lock = self.locks.get(stock);
        let _guard = lock.write();
        self.recover(stock)?;

        let dir = Self::partition_dir(&self.stock_dir(stock), date);
        fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!(".{PART_FILE}.tmp"));
        if let Err(e) = write_observations(&tmp, observations) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, dir.join(PART_FILE))?;

        debug!(
            stock = %stock,
            date = %date,
            observations = observations.len(),
            "Wrote shard"
        );
        Ok(())
    }

    fn read_shard(&self, stock: &StockId, date: NaiveDate) -> PersistenceResult<PriceShard> {
        self.ensure_recovered(stock)?;
        let lock = self.locks.get(stock);
        let _guard = lock.read();
        self.read_unlocked(stock, date)
    }

    fn list_dates(&self, stock: &StockId) -> PersistenceResult<Vec<NaiveDate>> {
        self.ensure_recovered(stock)?;
        let lock = self.locks.get(stock);
        let _guard = lock.read();
        self.dates_unlocked(stock)
    }

    fn commit_shards(&self, stock: &StockId, shards: &[PriceShard]) -> PersistenceResult<()> {
        validate_commit(stock, shards)?;
        if shards.is_empty() {
            return Ok(());
        }

        let lock = self.locks.get(stock);
        let _guard = lock.write();
        self.recover(stock)?;

        let stock_dir = self.stock_dir(stock);
        let staging = stock_dir.join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&staging)?;

        if let Err(e) = self.stage(&staging, stock, shards) {
            warn!(stock = %stock, error = %e, "Staging failed, discarding commit");
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(stock = %stock, error = %cleanup, "Failed to remove staging directory");
            }
            return Err(e);
        }

        let dates: Vec<NaiveDate> = shards.iter().map(|s| s.date).collect();
        if let Err(e) = Self::apply_commit(&stock_dir, &staging, &dates) {
            if staging.join(COMMIT_MARKER).is_file() {
                error!(
                    stock = %stock,
                    error = %e,
                    "Commit could not be undone, it will be rolled forward"
                );
            } else {
                warn!(stock = %stock, error = %e, "Commit failed, history restored");
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(stock = %stock, error = %cleanup, "Failed to remove staging directory");
                }
            }
            return Err(e);
        }

        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!(stock = %stock, error = %e, "Failed to remove applied staging directory");
        }

        info!(stock = %stock, shards = shards.len(), "Committed shards");
        Ok(())
    }

    fn read_history(&self, stock: &StockId) -> PersistenceResult<Vec<PriceShard>> {
        self.ensure_recovered(stock)?;
        let lock = self.locks.get(stock);
        let _guard = lock.read();
        self.dates_unlocked(stock)?
            .into_iter()
            .map(|date| self.read_unlocked(stock, date))
            .collect()
    }

    fn list_stocks(&self) -> PersistenceResult<Vec<StockId>> {
        let mut stocks = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(STOCK_SUFFIX) else {
                continue;
            };
            match StockId::new(stem) {
                Ok(stock) => stocks.push(stock),
                Err(e) => warn!(dir = %name, error = %e, "Skipping unrecognised stock directory"),
            }
        }
        stocks.sort();
        Ok(stocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn x() -> StockId {
        StockId::new("x").unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 5, d).unwrap()
    }

    fn shard(d: u32, price: f64) -> PriceShard {
        let date = date(d);
        PriceShard::new(
            x(),
            date,
            vec![
                PriceObservation::new(date.and_hms_opt(9, 0, 0).unwrap(), price),
                PriceObservation::new(date.and_hms_opt(15, 0, 0).unwrap(), price * 1.01),
            ],
        )
    }

    #[test]
    fn test_layout_is_hive_partitioned() {
        let dir = TempDir::new().unwrap();
        let store = ParquetShardStore::open(dir.path()).unwrap();
        let s = shard(22, 100.0);
        store.write_shard(&x(), s.date, &s.observations).unwrap();

        assert!(dir
            .path()
            .join("x.parquet/date=2017-05-22/part-0.parquet")
            .is_file());
        assert!(!dir
            .path()
            .join("x.parquet/date=2017-05-22/.part-0.parquet.tmp")
            .exists());
    }

    #[test]
    fn test_rejects_observation_on_wrong_date() {
        let dir = TempDir::new().unwrap();
        let store = ParquetShardStore::open(dir.path()).unwrap();
        let s = shard(22, 100.0);
        assert!(matches!(
            store.write_shard(&x(), date(23), &s.observations),
            Err(PersistenceError::InvalidShard(_))
        ));
        assert!(store.list_dates(&x()).unwrap().is_empty());
    }

    #[test]
    fn test_uncommitted_staging_discarded_on_open() {
        let dir = TempDir::new().unwrap();
        {
            let store = ParquetShardStore::open(dir.path()).unwrap();
            let s = shard(22, 100.0);
            store.write_shard(&x(), s.date, &s.observations).unwrap();
        }

        // Simulate a crash while staging: staged file but no COMMIT marker.
        let staging = dir.path().join("x.parquet/.staging-crashed/date=2017-05-22");
        fs::create_dir_all(&staging).unwrap();
        write_observations(&staging.join(PART_FILE), &shard(22, 1.0).observations).unwrap();

        let store = ParquetShardStore::open(dir.path()).unwrap();
        assert!(!dir.path().join("x.parquet/.staging-crashed").exists());
        let read = store.read_shard(&x(), date(22)).unwrap();
        assert_eq!(read.observations[0].price, 100.0);
    }

    #[test]
    fn test_committed_staging_rolled_forward_on_read() {
        let dir = TempDir::new().unwrap();
        let store = ParquetShardStore::open(dir.path()).unwrap();
        for (d, p) in [(22, 100.0), (23, 50.0)] {
            let s = shard(d, p);
            store.write_shard(&x(), s.date, &s.observations).unwrap();
        }

        // Simulate a crash after COMMIT with one of two renames done.
        let staging = dir.path().join("x.parquet/.staging-halfway");
        let staged = staging.join("date=2017-05-23");
        fs::create_dir_all(&staged).unwrap();
        write_observations(&staged.join(PART_FILE), &shard(23, 25.0).observations).unwrap();
        let manifest = CommitManifest {
            stock: "x".to_string(),
            dates: vec![date(22), date(23)],
        };
        fs::write(
            staging.join(COMMIT_MARKER),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let history = store.read_history(&x()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].observations[0].price, 25.0);
        assert!(!staging.exists());
    }

    #[test]
    fn test_failed_commit_restores_history() {
        let dir = TempDir::new().unwrap();
        let store = ParquetShardStore::open(dir.path()).unwrap();
        let s = shard(22, 100.0);
        store.write_shard(&x(), s.date, &s.observations).unwrap();

        // A plain file where the new partition directory must go.
        let blocker = dir.path().join("x.parquet/date=2017-05-23");
        fs::write(&blocker, b"in the way").unwrap();

        let commit = vec![shard(22, 50.0), shard(23, 51.0)];
        assert!(store.commit_shards(&x(), &commit).is_err());

        assert_eq!(store.list_dates(&x()).unwrap(), vec![date(22)]);
        let history = store.read_history(&x()).unwrap();
        assert_eq!(history[0].observations[0].price, 100.0);
        assert!(ParquetShardStore::staging_dirs(&dir.path().join("x.parquet"))
            .unwrap()
            .is_empty());

        // Reopening must not roll the failed commit forward.
        let reopened = ParquetShardStore::open(dir.path()).unwrap();
        assert_eq!(reopened.read_shard(&x(), date(22)).unwrap().observations[0].price, 100.0);

        fs::remove_file(&blocker).unwrap();
        reopened.commit_shards(&x(), &commit).unwrap();
        let history = reopened.read_history(&x()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].observations[0].price, 50.0);
        assert_eq!(history[1].observations[0].price, 51.0);
    }

    #[test]
    fn test_list_stocks_ignores_foreign_entries() {
        let dir = TempDir::new().unwrap();
        let store = ParquetShardStore::open(dir.path()).unwrap();
        let s = shard(22, 100.0);
        store.write_shard(&x(), s.date, &s.observations).unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("readme.parquet"), b"file, not dir").unwrap();

        assert_eq!(store.list_stocks().unwrap(), vec![x()]);
    }
}
