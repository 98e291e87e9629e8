//! Split lookup capability and a static in-memory implementation.

use crate::error::{RegistryError, RegistryResult};
use chrono::NaiveDate;
use dashmap::DashMap;
use tracing::{debug, info};
use volest_core::{SplitEvent, StockId};

/// Lookup of the split factor effective for a stock on a date.
#[cfg_attr(test, mockall::automock)]
pub trait SplitRegistry: Send + Sync {
    /// Factor to multiply pre-`date` prices by, or `None` if no split takes
    /// effect on `date`.
    fn lookup(&self, stock: &StockId, date: NaiveDate) -> Option<f64>;
}

/// Split table held in memory.
#[derive(Debug, Default)]
pub struct StaticSplitRegistry {
    splits: DashMap<(StockId, NaiveDate), f64>,
}

impl StaticSplitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of events. Identical duplicates are accepted.
    pub fn from_events(events: impl IntoIterator<Item = SplitEvent>) -> RegistryResult<Self> {
        let registry = Self::new();
        for event in events {
            registry.insert(event)?;
        }
        info!(splits = registry.len(), "Split registry loaded");
        Ok(registry)
    }

    /// Register a split.
    ///
    /// Returns `Err(Conflict)` if a different factor is already registered
    /// for the same stock and date.
    pub fn insert(&self, event: SplitEvent) -> RegistryResult<()> {
        // Re-validate: events may be built by hand rather than via SplitEvent::new.
        let event = SplitEvent::new(event.stock, event.effective_date, event.factor)?;
        let key = (event.stock.clone(), event.effective_date);

        if let Some(existing) = self.splits.get(&key) {
            if *existing != event.factor {
                return Err(RegistryError::Conflict {
                    stock: event.stock.to_string(),
                    date: event.effective_date,
                    existing: *existing,
                    new: event.factor,
                });
            }
            return Ok(());
        }

        debug!(
            stock = %event.stock,
            date = %event.effective_date,
            factor = event.factor,
            "Registered split"
        );
        self.splits.insert(key, event.factor);
        Ok(())
    }

    /// All registered splits for a stock, ascending by date.
    pub fn events_for(&self, stock: &StockId) -> Vec<SplitEvent> {
        let mut events: Vec<SplitEvent> = self
            .splits
            .iter()
            .filter(|entry| &entry.key().0 == stock)
            .map(|entry| SplitEvent {
                stock: entry.key().0.clone(),
                effective_date: entry.key().1,
                factor: *entry.value(),
            })
            .collect();
        events.sort_by_key(|e| e.effective_date);
        events
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}

impl SplitRegistry for StaticSplitRegistry {
    fn lookup(&self, stock: &StockId, date: NaiveDate) -> Option<f64> {
        self.splits
            .get(&(stock.clone(), date))
            .map(|factor| *factor)
    }
}
