//! Shard store contract tests.
//!
//! Every test runs against both the Parquet store and the in-memory store.

use chrono::NaiveDate;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use volest_core::{PriceObservation, PriceShard, StockId};
use volest_persistence::{InMemoryShardStore, ParquetShardStore, PersistenceError, ShardStore};

fn stock(s: &str) -> StockId {
    StockId::new(s).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 5, d).unwrap()
}

fn observations(d: u32, price: f64) -> Vec<PriceObservation> {
    let date = date(d);
    (0..5)
        .map(|i| {
            PriceObservation::new(
                date.and_hms_opt(9 + i, 0, 0).unwrap(),
                price + f64::from(i) * 0.1,
            )
        })
        .collect()
}

fn with_stores(test: impl Fn(&dyn ShardStore)) {
    let dir = TempDir::new().unwrap();
    let parquet = ParquetShardStore::open(dir.path()).unwrap();
    test(&parquet);
    test(&InMemoryShardStore::new());
}

#[test]
fn test_write_then_read_shard() {
    with_stores(|store| {
        let obs = observations(22, 100.0);
        store.write_shard(&stock("x"), date(22), &obs).unwrap();

        let shard = store.read_shard(&stock("x"), date(22)).unwrap();
        assert_eq!(shard.stock, stock("x"));
        assert_eq!(shard.date, date(22));
        assert_eq!(shard.observations, obs);
    });
}

#[test]
fn test_read_missing_shard_is_not_found() {
    with_stores(|store| {
        let err = store.read_shard(&stock("x"), date(22)).unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound { .. }));
        assert!(err.is_not_found());
    });
}

#[test]
fn test_list_dates_ascending() {
    with_stores(|store| {
        for d in [24, 22, 23] {
            store
                .write_shard(&stock("x"), date(d), &observations(d, 100.0))
                .unwrap();
        }
        assert_eq!(
            store.list_dates(&stock("x")).unwrap(),
            vec![date(22), date(23), date(24)]
        );
        assert!(store.list_dates(&stock("unknown")).unwrap().is_empty());
    });
}

#[test]
fn test_write_shard_overwrites() {
    with_stores(|store| {
        store
            .write_shard(&stock("x"), date(22), &observations(22, 100.0))
            .unwrap();
        store
            .write_shard(&stock("x"), date(22), &observations(22, 50.0))
            .unwrap();
        let shard = store.read_shard(&stock("x"), date(22)).unwrap();
        assert_eq!(shard.observations[0].price, 50.0);
        assert_eq!(store.list_dates(&stock("x")).unwrap().len(), 1);
    });
}

#[test]
fn test_commit_shards_replaces_and_appends() {
    with_stores(|store| {
        store
            .write_shard(&stock("x"), date(22), &observations(22, 100.0))
            .unwrap();

        let commit = vec![
            PriceShard::new(stock("x"), date(22), observations(22, 50.0)),
            PriceShard::new(stock("x"), date(23), observations(23, 51.0)),
        ];
        store.commit_shards(&stock("x"), &commit).unwrap();

        let history = store.read_history(&stock("x")).unwrap();
        assert_eq!(history, commit);
    });
}

#[test]
fn test_invalid_commit_leaves_history_untouched() {
    with_stores(|store| {
        store
            .write_shard(&stock("x"), date(22), &observations(22, 100.0))
            .unwrap();

        // Second shard carries observations from the wrong day.
        let commit = vec![
            PriceShard::new(stock("x"), date(22), observations(22, 50.0)),
            PriceShard::new(stock("x"), date(23), observations(24, 51.0)),
        ];
        assert!(store.commit_shards(&stock("x"), &commit).is_err());

        let history = store.read_history(&stock("x")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].observations[0].price, 100.0);
    });
}

#[test]
fn test_list_stocks() {
    with_stores(|store| {
        store
            .write_shard(&stock("y"), date(22), &observations(22, 1.0))
            .unwrap();
        store
            .write_shard(&stock("x"), date(22), &observations(22, 1.0))
            .unwrap();
        assert_eq!(store.list_stocks().unwrap(), vec![stock("x"), stock("y")]);
    });
}

#[test]
fn test_readers_see_whole_commits() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ParquetShardStore::open(dir.path()).unwrap());
    let x = stock("x");
    let dates = [22, 23, 24, 25];
    for d in dates {
        store.write_shard(&x, date(d), &observations(d, 100.0)).unwrap();
    }

    let writer = {
        let store = Arc::clone(&store);
        let x = x.clone();
        thread::spawn(move || {
            for round in 1..=10 {
                let base = 100.0 + f64::from(round);
                let shards: Vec<PriceShard> = dates
                    .iter()
                    .map(|&d| PriceShard::new(x.clone(), date(d), observations(d, base)))
                    .collect();
                store.commit_shards(&x, &shards).unwrap();
            }
        })
    };

    for _ in 0..20 {
        let history = store.read_history(&x).unwrap();
        assert_eq!(history.len(), dates.len());
        let first = history[0].observations[0].price;
        assert!(history.iter().all(|s| s.observations[0].price == first));
    }

    writer.join().unwrap();
}
