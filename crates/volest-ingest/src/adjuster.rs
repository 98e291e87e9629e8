//! Split adjustment of stored history.

use crate::error::{IngestError, IngestResult};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use volest_core::{PriceShard, StockId};
use volest_persistence::ShardStore;
use volest_registry::SplitRegistry;

/// Rescaled history for one split, ready to be committed with the new day.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentPlan {
    pub stock: StockId,
    pub date: NaiveDate,
    pub factor: f64,
    /// Every stored shard dated before `date`, prices multiplied by `factor`.
    pub rewritten: Vec<PriceShard>,
}

impl AdjustmentPlan {
    /// Shards to commit: the rewritten history followed by the new day, if any.
    pub fn into_commit(self, new_shard: Option<PriceShard>) -> Vec<PriceShard> {
        let mut shards = self.rewritten;
        shards.extend(new_shard);
        shards
    }
}

/// Plans history rewrites for splits taking effect on an incoming day.
#[derive(Clone)]
pub struct SplitAdjuster {
    registry: Arc<dyn SplitRegistry>,
}

impl SplitAdjuster {
    pub fn new(registry: Arc<dyn SplitRegistry>) -> Self {
        Self { registry }
    }

    /// Split factor effective on `date`, ignoring factors of exactly 1.
    pub fn factor_for(&self, stock: &StockId, date: NaiveDate) -> Option<f64> {
        self.registry
            .lookup(stock, date)
            .filter(|f| *f != 1.0 && f.is_finite() && *f > 0.0)
    }

    /// Plan the rewrite for a split effective on `date`.
    ///
    /// `None` when no split applies. Failing to read the history is an
    /// [`IngestError::AdjustmentFailure`].
    pub fn plan(
        &self,
        store: &dyn ShardStore,
        stock: &StockId,
        date: NaiveDate,
    ) -> IngestResult<Option<AdjustmentPlan>> {
        let Some(factor) = self.factor_for(stock, date) else {
            return Ok(None);
        };

        let history = store
            .read_history(stock)
            .map_err(|source| IngestError::AdjustmentFailure {
                stock: stock.to_string(),
                date,
                source,
            })?;
        let rewritten: Vec<PriceShard> = history
            .iter()
            .filter(|shard| shard.date < date)
            .map(|shard| shard.rescaled(factor))
            .collect();

        info!(
            stock = %stock,
            date = %date,
            factor,
            shards = rewritten.len(),
            "Planned split adjustment"
        );
        Ok(Some(AdjustmentPlan {
            stock: stock.clone(),
            date,
            factor,
            rewritten,
        }))
    }
}

impl std::fmt::Debug for SplitAdjuster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitAdjuster").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volest_core::{PriceObservation, SplitEvent};
    use volest_persistence::InMemoryShardStore;
    use volest_registry::StaticSplitRegistry;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 5, d).unwrap()
    }

    fn stock() -> StockId {
        StockId::new("d").unwrap()
    }

    fn adjuster(events: Vec<SplitEvent>) -> SplitAdjuster {
        SplitAdjuster::new(Arc::new(StaticSplitRegistry::from_events(events).unwrap()))
    }

    fn seed(store: &InMemoryShardStore, d: u32, price: f64) {
        let obs = vec![PriceObservation::new(
            date(d).and_hms_opt(10, 0, 0).unwrap(),
            price,
        )];
        store.write_shard(&stock(), date(d), &obs).unwrap();
    }

    #[test]
    fn test_no_split_no_plan() {
        let store = InMemoryShardStore::new();
        seed(&store, 19, 100.0);
        let plan = adjuster(vec![]).plan(&store, &stock(), date(22)).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn test_plan_rescales_only_earlier_shards() {
        let store = InMemoryShardStore::new();
        seed(&store, 18, 100.0);
        seed(&store, 19, 110.0);
        seed(&store, 22, 12.0);
        let events = vec![SplitEvent::from_ratio(stock(), date(22), 10.0).unwrap()];

        let plan = adjuster(events)
            .plan(&store, &stock(), date(22))
            .unwrap()
            .unwrap();
        assert_eq!(plan.factor, 0.1);
        let dates: Vec<NaiveDate> = plan.rewritten.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(18), date(19)]);
        assert!((plan.rewritten[0].observations[0].price - 10.0).abs() < 1e-12);
        assert!((plan.rewritten[1].observations[0].price - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_into_commit_appends_new_day() {
        let plan = AdjustmentPlan {
            stock: stock(),
            date: date(22),
            factor: 0.5,
            rewritten: vec![PriceShard::new(stock(), date(19), vec![])],
        };
        let new_day = PriceShard::new(stock(), date(22), vec![]);
        let commit = plan.clone().into_commit(Some(new_day));
        assert_eq!(commit.len(), 2);
        assert_eq!(commit[1].date, date(22));
        assert_eq!(plan.into_commit(None).len(), 1);
    }

    #[test]
    fn test_unit_factor_is_ignored() {
        struct UnitRegistry;
        impl SplitRegistry for UnitRegistry {
            fn lookup(&self, _: &StockId, _: NaiveDate) -> Option<f64> {
                Some(1.0)
            }
        }
        let adjuster = SplitAdjuster::new(Arc::new(UnitRegistry));
        assert_eq!(adjuster.factor_for(&stock(), date(22)), None);
    }
}
