//! Historical volatility output files.
//!
//! One file per (method, stock): `{root}/{method}/{stock}.parquet` with
//! columns `date` (date32), `value` (nullable float64) and
//! `lookback_window` (uint32). Files are regenerated in full, never patched.

use crate::error::{PersistenceError, PersistenceResult};
use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use volest_core::VolatilitySeries;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn volatility_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("value", DataType::Float64, true),
        Field::new("lookback_window", DataType::UInt32, false),
    ]))
}

/// Writes volatility series under a root directory.
#[derive(Debug, Clone)]
pub struct VolatilityWriter {
    root: PathBuf,
}

impl VolatilityWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, series: &VolatilitySeries) -> PathBuf {
        self.root
            .join(series.method.as_str())
            .join(format!("{}.parquet", series.stock))
    }

    /// Write (replace) the file for a series. Returns the file path.
    pub fn write(&self, series: &VolatilitySeries) -> PersistenceResult<PathBuf> {
        let path = self.path_for(series);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lookback = u32::try_from(series.lookback_window).map_err(|_| {
            PersistenceError::Schema(format!(
                "lookback window {} does not fit u32",
                series.lookback_window
            ))
        })?;
        let dates: Vec<i32> = series
            .points
            .iter()
            .map(|(d, _)| (*d - epoch()).num_days() as i32)
            .collect();
        let values: Vec<Option<f64>> = series.points.iter().map(|(_, v)| *v).collect();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(dates)),
            Arc::new(Float64Array::from(values)),
            Arc::new(UInt32Array::from(vec![lookback; series.points.len()])),
        ];
        let batch = RecordBatch::try_new(volatility_schema(), columns)?;

        let tmp = path.with_extension("parquet.tmp");
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file.try_clone()?, volatility_schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        info!(
            stock = %series.stock,
            method = %series.method,
            points = series.points.len(),
            defined = series.defined_count(),
            path = %path.display(),
            "Wrote volatility series"
        );
        Ok(path)
    }
}

/// Read back `(date, value)` pairs from a file written by [`VolatilityWriter`].
pub fn read_volatility_series(path: &Path) -> PersistenceResult<Vec<(NaiveDate, Option<f64>)>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let mut points = Vec::new();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        let dates = batch
            .column(schema.index_of("date")?)
            .as_any()
            .downcast_ref::<Date32Array>()
            .ok_or_else(|| PersistenceError::Schema("date is not date32".to_string()))?;
        let values = batch
            .column(schema.index_of("value")?)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| PersistenceError::Schema("value is not float64".to_string()))?;

        for i in 0..batch.num_rows() {
            let date = epoch()
                .checked_add_signed(Duration::days(i64::from(dates.value(i))))
                .ok_or_else(|| PersistenceError::Schema("date out of range".to_string()))?;
            let value = values.is_valid(i).then(|| values.value(i));
            points.push((date, value));
        }
    }
    Ok(points)
}
