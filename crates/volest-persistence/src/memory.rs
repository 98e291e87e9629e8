//! In-memory shard store for tests and dry runs.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{validate_commit, validate_observations, ShardStore};
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use volest_core::{PriceObservation, PriceShard, StockId};

type StockShards = BTreeMap<NaiveDate, Vec<PriceObservation>>;

/// Shard store held in a single map behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryShardStore {
    shards: RwLock<HashMap<StockId, StockShards>>,
}

impl InMemoryShardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShardStore for InMemoryShardStore {
    fn write_shard(
        &self,
        stock: &StockId,
        date: NaiveDate,
        observations: &[PriceObservation],
    ) -> PersistenceResult<()> {
        validate_observations(stock, date, observations)?;
        self.shards
            .write()
            .entry(stock.clone())
            .or_default()
            .insert(date, observations.to_vec());
        Ok(())
    }

    fn read_shard(&self, stock: &StockId, date: NaiveDate) -> PersistenceResult<PriceShard> {
        self.shards
            .read()
            .get(stock)
            .and_then(|shards| shards.get(&date))
            .map(|obs| PriceShard::new(stock.clone(), date, obs.clone()))
            .ok_or_else(|| PersistenceError::NotFound {
                stock: stock.to_string(),
                date,
            })
    }

    fn list_dates(&self, stock: &StockId) -> PersistenceResult<Vec<NaiveDate>> {
        Ok(self
            .shards
            .read()
            .get(stock)
            .map(|shards| shards.keys().copied().collect())
            .unwrap_or_default())
    }

    fn commit_shards(&self, stock: &StockId, shards: &[PriceShard]) -> PersistenceResult<()> {
        validate_commit(stock, shards)?;
        let mut guard = self.shards.write();
        let entry = guard.entry(stock.clone()).or_default();
        for shard in shards {
            entry.insert(shard.date, shard.observations.clone());
        }
        Ok(())
    }

    fn read_history(&self, stock: &StockId) -> PersistenceResult<Vec<PriceShard>> {
        Ok(self
            .shards
            .read()
            .get(stock)
            .map(|shards| {
                shards
                    .iter()
                    .map(|(date, obs)| PriceShard::new(stock.clone(), *date, obs.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_stocks(&self) -> PersistenceResult<Vec<StockId>> {
        let mut stocks: Vec<StockId> = self
            .shards
            .read()
            .iter()
            .filter(|(_, shards)| !shards.is_empty())
            .map(|(stock, _)| stock.clone())
            .collect();
        stocks.sort();
        Ok(stocks)
    }
}
