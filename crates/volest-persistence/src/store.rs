//! Shard store contract and per-stock locking.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use volest_core::{PriceObservation, PriceShard, StockId};

/// Persistence of cleaned price shards keyed by (stock, date).
///
/// Implementations guarantee that readers never observe a partially written
/// shard, and never observe a stock halfway through [`commit_shards`].
///
/// [`commit_shards`]: ShardStore::commit_shards
pub trait ShardStore: Send + Sync {
    /// Create or overwrite one shard.
    fn write_shard(
        &self,
        stock: &StockId,
        date: NaiveDate,
        observations: &[PriceObservation],
    ) -> PersistenceResult<()>;

    /// Read one shard. `Err(NotFound)` if absent.
    fn read_shard(&self, stock: &StockId, date: NaiveDate) -> PersistenceResult<PriceShard>;

    /// Stored dates for a stock, ascending. Empty for an unknown stock.
    fn list_dates(&self, stock: &StockId) -> PersistenceResult<Vec<NaiveDate>>;

    /// Write several shards of one stock as a single unit: either every shard
    /// is replaced or none is.
    fn commit_shards(&self, stock: &StockId, shards: &[PriceShard]) -> PersistenceResult<()>;

    /// Every shard of a stock, ascending by date, read as one snapshot.
    fn read_history(&self, stock: &StockId) -> PersistenceResult<Vec<PriceShard>>;

    /// Stocks with at least one stored shard, sorted.
    fn list_stocks(&self) -> PersistenceResult<Vec<StockId>>;
}

/// Check that every shard in a commit belongs to `stock` and dates are unique.
pub(crate) fn validate_commit(stock: &StockId, shards: &[PriceShard]) -> PersistenceResult<()> {
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(shards.len());
    for shard in shards {
        if &shard.stock != stock {
            return Err(PersistenceError::InvalidShard(format!(
                "shard for {} in commit for {}",
                shard.stock, stock
            )));
        }
        validate_observations(stock, shard.date, &shard.observations)?;
        dates.push(shard.date);
    }
    dates.sort();
    if let Some(w) = dates.windows(2).find(|w| w[0] == w[1]) {
        return Err(PersistenceError::InvalidShard(format!(
            "duplicate date {} in commit for {}",
            w[0], stock
        )));
    }
    Ok(())
}

/// Every observation of a shard must fall on the shard's date.
pub(crate) fn validate_observations(
    stock: &StockId,
    date: NaiveDate,
    observations: &[PriceObservation],
) -> PersistenceResult<()> {
    if let Some(stray) = observations.iter().find(|o| o.timestamp.date() != date) {
        return Err(PersistenceError::InvalidShard(format!(
            "{} shard {} contains observation at {}",
            stock, date, stray.timestamp
        )));
    }
    Ok(())
}

/// Per-stock reader/writer locks.
///
/// Different stocks never contend; one stock has at most one writer and no
/// readers while it is written.
#[derive(Debug, Default)]
pub struct StockLocks {
    locks: DashMap<StockId, Arc<RwLock<()>>>,
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a stock, created on first use.
    pub fn get(&self, stock: &StockId) -> Arc<RwLock<()>> {
        self.locks
            .entry(stock.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }
}
