//! Series file I/O: CSV (canonical) and optional Parquet companions.
//!
//! Every write goes through `write_atomic`: content lands in a hidden temp file
//! in the destination directory and is renamed over the target, so readers see
//! either the previous file or the new one, never a torn write.

use crate::domain::PriceBar;
use crate::series::{CanonicalSeries, EnrichedBar};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CSV_HEADER: [&str; 8] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "daily_return",
    "log_volume",
];

const REQUIRED_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt series file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("csv encode failed: {0}")]
    Csv(String),

    #[error("parquet error: {0}")]
    Parquet(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Only the OHLCV columns are read back; derived columns are recomputed.
#[derive(Debug, Deserialize)]
struct StoredRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Load a canonical series from CSV. `Ok(None)` when the file does not exist.
///
/// Unparseable rows, missing columns and invalid prices are `Corrupt`; the
/// caller decides whether to quarantine.
pub fn read_series(path: &Path) -> Result<Option<CanonicalSeries>, StoreError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader
        .headers()
        .map_err(|e| StoreError::corrupt(path, e))?
        .clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !headers.iter().any(|h| h == **c))
    {
        return Err(StoreError::corrupt(path, format!("missing column {missing}")));
    }

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<StoredRow>().enumerate() {
        let row = row.map_err(|e| StoreError::corrupt(path, format!("row {}: {e}", i + 1)))?;
        let bar = PriceBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_valid() {
            return Err(StoreError::corrupt(
                path,
                format!("row {}: invalid prices on {}", i + 1, bar.date),
            ));
        }
        bars.push(bar);
    }
    Ok(Some(CanonicalSeries::from_bars(bars)))
}

/// Encode rows as CSV: one header row, ascending dates, null derived fields
/// as empty cells.
pub fn encode_csv(rows: &[EnrichedBar], out: impl Write) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| StoreError::Csv(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| StoreError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| StoreError::Csv(e.to_string()))
}

pub fn write_series_csv(path: &Path, rows: &[EnrichedBar]) -> Result<(), StoreError> {
    write_atomic(path, |file| encode_csv(rows, file))
}

pub fn write_series_parquet(path: &Path, rows: &[EnrichedBar]) -> Result<(), StoreError> {
    let mut df = rows_to_dataframe(rows)?;
    write_atomic(path, |file| {
        ParquetWriter::new(file)
            .finish(&mut df)
            .map(|_| ())
            .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))
    })
}

/// Write through a temp file in the target's directory, then rename over the
/// target. On any error the temp file is removed and the target is untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut fs::File) -> Result<(), StoreError>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let tmp_path = temp_path_for(path);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        write(&mut file)?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);
        fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Move a corrupt file aside as `{name}.quarantined`, replacing any earlier
/// quarantine of the same file. Returns the new path.
pub fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".quarantined");
    let target = path.with_file_name(name);
    fs::rename(path, &target).map_err(|e| StoreError::io(path, e))?;
    tracing::warn!(
        from = %path.display(),
        to = %target.display(),
        "quarantined corrupt series file"
    );
    Ok(target)
}

// ── Parquet helpers ─────────────────────────────────────────────────

fn rows_to_dataframe(rows: &[EnrichedBar]) -> Result<DataFrame, StoreError> {
    let epoch = NaiveDate::default();
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = rows.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = rows.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = rows.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let volumes: Vec<u64> = rows.iter().map(|r| r.volume).collect();
    let returns: Vec<Option<f64>> = rows.iter().map(|r| r.daily_return).collect();
    let log_volumes: Vec<Option<f64>> = rows.iter().map(|r| r.log_volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("daily_return".into(), returns),
        Column::new("log_volume".into(), log_volumes),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::enrich;

    fn sample() -> Vec<EnrichedBar> {
        let bars = vec![
            PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 0,
            },
            PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                open: 101.0,
                high: 103.5,
                low: 100.25,
                close: 102.01,
                volume: 1100,
            },
        ];
        enrich(&bars)
    }

    #[test]
    fn csv_layout() {
        let mut buf = Vec::new();
        encode_csv(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,open,high,low,close,volume,daily_return,log_volume");
        assert_eq!(lines[1], "2024-01-02,100.0,102.0,99.0,101.0,0,,");
        assert!(lines[2].starts_with("2024-01-03,101.0,103.5,100.25,102.01,1100,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_series_still_has_header() {
        let mut buf = Vec::new();
        encode_csv(&[], &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "date,open,high,low,close,volume,daily_return,log_volume\n"
        );
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alltime").join("SPY.csv");
        let rows = sample();
        write_series_csv(&path, &rows).unwrap();

        let series = read_series(&path).unwrap().unwrap();
        let reread: Vec<PriceBar> = rows.iter().map(EnrichedBar::price_bar).collect();
        assert_eq!(series.bars(), reread.as_slice());
    }

    #[test]
    fn rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY.csv");
        write_series_csv(&path, &sample()).unwrap();
        let first = fs::read(&path).unwrap();

        let series = read_series(&path).unwrap().unwrap();
        write_series_csv(&path, &enrich(series.bars())).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_series(&dir.path().join("NOPE.csv")).unwrap().is_none());
    }

    #[test]
    fn garbage_is_corrupt_and_can_be_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BAD.csv");
        fs::write(&path, "date,open,high,low,close,volume\n2024-01-02,abc,1,1,1,1\n").unwrap();
        assert!(matches!(read_series(&path), Err(StoreError::Corrupt { .. })));

        let moved = quarantine(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(moved.file_name().unwrap(), "BAD.csv.quarantined");
        assert!(read_series(&path).unwrap().is_none());
    }

    #[test]
    fn missing_columns_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BAD.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(read_series(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn interrupted_write_leaves_previous_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY.csv");
        write_series_csv(&path, &sample()).unwrap();
        let before = fs::read(&path).unwrap();

        let err = write_atomic(&path, |file| {
            file.write_all(b"date,open\n2024-01-0").unwrap();
            Err(StoreError::Csv("interrupted".into()))
        });
        assert!(err.is_err());
        assert_eq!(fs::read(&path).unwrap(), before);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("SPY.csv")]);
    }

    #[test]
    fn parquet_companion_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY.parquet");
        write_series_parquet(&path, &sample()).unwrap();

        let file = fs::File::open(&path).unwrap();
        let df = ParquetReader::new(file).finish().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 8);
    }
}
