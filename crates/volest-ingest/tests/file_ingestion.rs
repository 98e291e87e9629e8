//! File ingestion against an on-disk store.

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use volest_cleaner::CleanerConfig;
use volest_core::{RawTrade, SplitEvent, StockId};
use volest_ingest::{
    spawn_ingest_worker, IngestError, IngestObserver, IngestOutcome, IngestionPipeline,
};
use volest_persistence::{ParquetShardStore, ShardStore};
use volest_registry::StaticSplitRegistry;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 5, d).unwrap()
}

/// Write a raw file with one trade per minute from 09:00, plus noise the
/// cleaner must remove: an early trade, a zero price and a duplicate timestamp.
fn write_raw(dir: &Path, stock: &str, d: u32, price: f64) -> PathBuf {
    let day = date(d);
    let mut body = String::from("ts,price\n");
    writeln!(body, "{} 07:59:59,{}", day, price).unwrap();
    writeln!(body, "{} 09:00:30,0", day).unwrap();
    for minute in 0..40 {
        let p = price * (1.0 + 0.001 * f64::from(minute % 5));
        writeln!(body, "{} 09:{:02}:00,{}", day, minute, p).unwrap();
    }
    writeln!(body, "{} 09:10:00,{}", day, price).unwrap();

    let path = dir.join(format!("trades_{}_{}.csv", stock, day.format("%Y%m%d")));
    fs::write(&path, body).unwrap();
    path
}

struct Fixture {
    _raw: TempDir,
    _data: TempDir,
    raw_dir: PathBuf,
    store: Arc<ParquetShardStore>,
    pipeline: Arc<IngestionPipeline>,
}

fn fixture(splits: Vec<SplitEvent>) -> Fixture {
    let raw = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let store = Arc::new(ParquetShardStore::open(data.path()).unwrap());
    let registry = Arc::new(StaticSplitRegistry::from_events(splits).unwrap());
    let pipeline = Arc::new(
        IngestionPipeline::new(store.clone(), registry, &CleanerConfig::default()).unwrap(),
    );
    Fixture {
        raw_dir: raw.path().to_path_buf(),
        _raw: raw,
        _data: data,
        store,
        pipeline,
    }
}

fn stock(s: &str) -> StockId {
    StockId::new(s).unwrap()
}

#[test]
fn test_process_file_cleans_and_stores() {
    let fx = fixture(vec![]);
    let path = write_raw(&fx.raw_dir, "x", 22, 100.0);

    let report = fx.pipeline.process_file(&path).unwrap();
    assert_eq!(report.stock, stock("x"));
    assert_eq!(report.input_count, 43);
    assert_eq!(report.drops.out_of_session, 1);
    assert_eq!(report.drops.non_positive_price, 1);
    assert_eq!(report.drops.merged_duplicates, 1);
    assert_eq!(report.outcome, IngestOutcome::Stored { observations: 40 });

    let shard = fx.store.read_shard(&stock("x"), date(22)).unwrap();
    assert_eq!(shard.observations.len(), 40);
    assert!(shard
        .observations
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_batch_applies_split_in_date_order() {
    let split = SplitEvent::from_ratio(stock("d"), date(24), 10.0).unwrap();
    let fx = fixture(vec![split]);
    write_raw(&fx.raw_dir, "d", 24, 10.0);
    write_raw(&fx.raw_dir, "d", 22, 100.0);
    write_raw(&fx.raw_dir, "d", 23, 101.0);
    write_raw(&fx.raw_dir, "e", 22, 50.0);

    let report = fx.pipeline.process_dir(&fx.raw_dir, Some("trades")).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.files.len(), 4);
    assert!(matches!(
        report.files[2].outcome,
        IngestOutcome::SplitAdjusted { rewritten: 2, .. }
    ));
    assert_eq!(report.changed_stocks(), vec![stock("d"), stock("e")]);

    let history = fx.store.read_history(&stock("d")).unwrap();
    let opens: Vec<f64> = history.iter().map(|s| s.observations[0].price).collect();
    assert!((opens[0] - 10.0).abs() < 1e-9);
    assert!((opens[1] - 10.1).abs() < 1e-9);
    assert!((opens[2] - 10.0).abs() < 1e-9);

    // Unrelated stock untouched.
    let e = fx.store.read_shard(&stock("e"), date(22)).unwrap();
    assert_eq!(e.observations[0].price, 50.0);

    // Re-running the batch changes nothing.
    let rerun = fx.pipeline.process_dir(&fx.raw_dir, Some("trades")).unwrap();
    assert!(rerun
        .files
        .iter()
        .all(|f| f.outcome == IngestOutcome::AlreadyStored));
    assert!(rerun.changed_stocks().is_empty());
}

#[test]
fn test_failed_split_commit_leaves_history_and_retry_applies() {
    let split = SplitEvent::new(stock("d"), date(23), 0.5).unwrap();
    let fx = fixture(vec![split]);
    let first = write_raw(&fx.raw_dir, "d", 22, 100.0);
    fx.pipeline.process_file(&first).unwrap();

    let blocker = fx.store.root().join("d.parquet/date=2017-05-23");
    fs::write(&blocker, b"in the way").unwrap();

    let second = write_raw(&fx.raw_dir, "d", 23, 50.0);
    let err = fx.pipeline.process_file(&second).unwrap_err();
    assert!(matches!(err, IngestError::AdjustmentFailure { .. }));
    assert_eq!(fx.store.list_dates(&stock("d")).unwrap(), vec![date(22)]);
    let d22 = fx.store.read_shard(&stock("d"), date(22)).unwrap();
    assert_eq!(d22.observations[0].price, 100.0);

    fs::remove_file(&blocker).unwrap();
    let retry = fx.pipeline.process_file(&second).unwrap();
    assert!(matches!(
        retry.outcome,
        IngestOutcome::SplitAdjusted { rewritten: 1, .. }
    ));
    assert!(retry.outcome.changed_history());
    let d22 = fx.store.read_shard(&stock("d"), date(22)).unwrap();
    assert!((d22.observations[0].price - 50.0).abs() < 1e-9);
}

#[test]
fn test_late_file_fails_and_stops_stock() {
    let fx = fixture(vec![]);
    let later = write_raw(&fx.raw_dir, "x", 24, 100.0);
    fx.pipeline.process_file(&later).unwrap();

    let early = write_raw(&fx.raw_dir, "x", 22, 100.0);
    let err = fx.pipeline.process_file(&early).unwrap_err();
    assert!(matches!(err, IngestError::OutOfOrder { .. }));
    assert_eq!(fx.store.list_dates(&stock("x")).unwrap(), vec![date(24)]);
}

#[test]
fn test_bad_file_name_is_rejected() {
    let fx = fixture(vec![]);
    let path = fx.raw_dir.join("not-a-raw-file.csv");
    fs::write(&path, "ts,price\n").unwrap();
    assert!(matches!(
        fx.pipeline.process_file(&path),
        Err(IngestError::InvalidFileName(_))
    ));
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(StockId, NaiveDate)>>,
}

impl IngestObserver for Recorder {
    fn on_history_changed(&self, stock: &StockId, date: NaiveDate, _: &IngestOutcome) {
        self.seen.lock().push((stock.clone(), date));
    }
}

#[tokio::test]
async fn test_worker_processes_requests_in_order() {
    let fx = fixture(vec![]);
    let recorder = Arc::new(Recorder::default());
    let (handle, join) = spawn_ingest_worker(fx.pipeline.clone(), Some(recorder.clone()), 8);

    let first = write_raw(&fx.raw_dir, "x", 22, 100.0);
    let second = write_raw(&fx.raw_dir, "x", 23, 101.0);
    handle.submit_file(first).await.unwrap();
    let report = handle.ingest_file(second.clone()).await.unwrap();
    assert_eq!(report.date, date(23));

    // A replay reaches the worker but does not notify.
    let replay = handle.ingest_file(second).await.unwrap();
    assert_eq!(replay.outcome, IngestOutcome::AlreadyStored);

    handle.shutdown().await;
    join.await.unwrap();

    assert_eq!(
        *recorder.seen.lock(),
        vec![(stock("x"), date(22)), (stock("x"), date(23))]
    );
    assert!(handle.submit_file(PathBuf::from("x_20170525.csv")).await.is_err());
}

#[tokio::test]
async fn test_worker_ingests_in_memory_trades() {
    let fx = fixture(vec![]);
    let recorder = Arc::new(Recorder::default());
    let (handle, join) = spawn_ingest_worker(fx.pipeline.clone(), Some(recorder.clone()), 8);

    let mut trades: Vec<RawTrade> = (0..20)
        .map(|minute| {
            let p = 100.0 * (1.0 + 0.001 * f64::from(minute % 4));
            RawTrade::new(format!("2017-05-22 10:{:02}:00", minute), p)
        })
        .collect();
    trades.push(RawTrade::new("2017-05-22 18:00:00", 100.0));

    let outcome = handle
        .ingest_trades(stock("x"), date(22), trades.clone())
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Stored { observations: 20 });

    let replay = handle
        .ingest_trades(stock("x"), date(22), trades)
        .await
        .unwrap();
    assert_eq!(replay, IngestOutcome::AlreadyStored);

    handle.shutdown().await;
    join.await.unwrap();

    assert_eq!(*recorder.seen.lock(), vec![(stock("x"), date(22))]);
    assert_eq!(fx.store.list_dates(&stock("x")).unwrap(), vec![date(22)]);
}
