//! Raw trade file loading.
//!
//! Files are CSVs named `<prefix>_<stock>_<YYYYMMDD>.csv` (the prefix is
//! optional) with a header row and columns `ts,price[,size]`.

use crate::error::{IngestError, IngestResult};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use volest_core::{RawTrade, StockId};

const RAW_EXTENSION: &str = "csv";
const FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Raw trades for one stock-day, as read from a file.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub stock: StockId,
    pub date: NaiveDate,
    pub trades: Vec<RawTrade>,
    /// Rows that could not be deserialised at all.
    pub malformed_rows: usize,
}

/// A raw file found on disk, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawFile {
    pub stock: StockId,
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Parse `(stock, date)` from a raw file name.
pub fn parse_file_name(path: &Path) -> IngestResult<(StockId, NaiveDate)> {
    let invalid = || IngestError::InvalidFileName(path.to_path_buf());

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(RAW_EXTENSION))
        .unwrap_or(false);
    if !is_csv {
        return Err(invalid());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;

    let mut parts = stem.rsplitn(3, '_');
    let date_part = parts.next().ok_or_else(invalid)?;
    let stock_part = parts.next().ok_or_else(invalid)?;

    let date = NaiveDate::parse_from_str(date_part, FILE_DATE_FORMAT).map_err(|_| invalid())?;
    let stock = StockId::new(stock_part).map_err(|_| invalid())?;
    Ok((stock, date))
}

/// Load one raw file. Rows that fail to deserialise are counted, not fatal.
pub fn load_raw_file(path: &Path) -> IngestResult<RawBatch> {
    let (stock, date) = parse_file_name(path)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut trades = Vec::new();
    let mut malformed_rows = 0;
    for (row, record) in reader.deserialize::<RawTrade>().enumerate() {
        match record {
            Ok(trade) => trades.push(trade),
            Err(e) => {
                malformed_rows += 1;
                debug!(path = %path.display(), row = row + 1, error = %e, "Skipping malformed row");
            }
        }
    }

    if malformed_rows > 0 {
        warn!(
            stock = %stock,
            date = %date,
            malformed_rows,
            "Raw file contained malformed rows"
        );
    }
    debug!(stock = %stock, date = %date, trades = trades.len(), "Loaded raw file");

    Ok(RawBatch {
        stock,
        date,
        trades,
        malformed_rows,
    })
}

/// List raw files in `dir`, ordered by stock then date.
///
/// With a `prefix`, only names starting with `{prefix}_` are taken. Files
/// whose names do not parse are skipped with a warning.
pub fn discover_raw_files(dir: &Path, prefix: Option<&str>) -> IngestResult<Vec<RawFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(prefix) = prefix {
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&format!("{prefix}_")))
                .unwrap_or(false);
            if !matches {
                continue;
            }
        }
        match parse_file_name(&path) {
            Ok((stock, date)) => files.push(RawFile { stock, date, path }),
            Err(_) => warn!(path = %path.display(), "Ignoring file with unrecognised name"),
        }
    }
    files.sort();
    info!(dir = %dir.display(), files = files.len(), "Discovered raw files");
    Ok(files)
}
