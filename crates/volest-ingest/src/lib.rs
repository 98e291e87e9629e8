//! Ingestion for volest.
//!
//! One raw file (one stock, one day) flows through:
//!
//! ```text
//! CSV file → RawBatch → TradeCleaner → SplitAdjuster.plan()
//!          → ShardStore.write_shard()            (no split)
//!          → ShardStore.commit_shards()          (split: rescaled history + new day)
//! ```
//!
//! [`IngestWorker`] is the consumer side of a channel of [`IngestRequest`]s.

pub mod adjuster;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod worker;

pub use adjuster::{AdjustmentPlan, SplitAdjuster};
pub use error::{IngestError, IngestResult};
pub use loader::{discover_raw_files, load_raw_file, parse_file_name, RawBatch, RawFile};
pub use pipeline::{BatchReport, FileReport, IngestOutcome, IngestionPipeline};
pub use worker::{spawn_ingest_worker, IngestHandle, IngestObserver, IngestRequest, IngestWorker};
