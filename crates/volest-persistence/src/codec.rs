//! Parquet encoding of price observations.
//!
//! Columns: `ts` (timestamp, microseconds, no timezone) and `price` (float64).
//! The shard date lives in the partition directory, not in the file.

use crate::error::{PersistenceError, PersistenceResult};
use arrow::array::{Array, ArrayRef, Float64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use volest_core::PriceObservation;

pub const TS_COLUMN: &str = "ts";
pub const PRICE_COLUMN: &str = "price";

pub fn price_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(
            TS_COLUMN,
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new(PRICE_COLUMN, DataType::Float64, false),
    ]))
}

pub(crate) fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> PersistenceResult<NaiveDateTime> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| PersistenceError::Schema(format!("timestamp out of range: {micros}")))
}

fn to_record_batch(observations: &[PriceObservation]) -> PersistenceResult<RecordBatch> {
    let ts: Vec<i64> = observations.iter().map(|o| to_micros(o.timestamp)).collect();
    let prices: Vec<f64> = observations.iter().map(|o| o.price).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(ts)),
        Arc::new(Float64Array::from(prices)),
    ];
    Ok(RecordBatch::try_new(price_schema(), columns)?)
}

/// Write observations to a new Parquet file at `path`, synced to disk.
pub fn write_observations(path: &Path, observations: &[PriceObservation]) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file.try_clone()?, price_schema(), None)?;
    if !observations.is_empty() {
        writer.write(&to_record_batch(observations)?)?;
    }
    writer.close()?;
    file.sync_all()?;
    Ok(())
}

/// Read observations from a Parquet file written by [`write_observations`].
pub fn read_observations(path: &Path) -> PersistenceResult<Vec<PriceObservation>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut observations = Vec::new();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        let ts_idx = schema.index_of(TS_COLUMN)?;
        let price_idx = schema.index_of(PRICE_COLUMN)?;

        let ts = batch
            .column(ts_idx)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| {
                PersistenceError::Schema(format!("{TS_COLUMN} is not a microsecond timestamp"))
            })?;
        let prices = batch
            .column(price_idx)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| PersistenceError::Schema(format!("{PRICE_COLUMN} is not float64")))?;

        if ts.null_count() > 0 || prices.null_count() > 0 {
            return Err(PersistenceError::Schema(format!(
                "null values in {}",
                path.display()
            )));
        }

        for i in 0..batch.num_rows() {
            observations.push(PriceObservation::new(from_micros(ts.value(i))?, prices.value(i)));
        }
    }
    Ok(observations)
}
