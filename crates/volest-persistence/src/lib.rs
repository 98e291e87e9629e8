//! Sharded Parquet price store for volest.
//!
//! Cleaned prices are stored one shard per (stock, date), Hive-style:
//!
//! ```text
//! {root}/{stock}.parquet/date=2017-05-22/part-0.parquet
//! ```
//!
//! Appending a day touches one partition; a split rewrite touches only one
//! stock's partitions and is committed all-or-nothing (see [`ParquetShardStore`]).

pub mod codec;
pub mod error;
pub mod memory;
pub mod parquet_store;
pub mod store;
pub mod volatility;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::InMemoryShardStore;
pub use parquet_store::ParquetShardStore;
pub use store::{ShardStore, StockLocks};
pub use volatility::{read_volatility_series, VolatilityWriter};
