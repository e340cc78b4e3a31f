//! CSV candle reader.
//!
//! Expected columns: `Date,Open,High,Low,Close[,Volume]`. The date is either
//! `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp. Rows that fail
//! to parse or describe an inconsistent candle are skipped and counted.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::candle::Candle;
use crate::domain::error::JournalError;
use crate::domain::forex::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvCandles {
    pub candles: Vec<Candle>,
    pub skipped_rows: usize,
}

pub fn read_candles(
    path: &Path,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<CsvCandles, JournalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| JournalError::Import {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

    let mut candles = Vec::new();
    let mut skipped_rows = 0;

    for (index, result) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let parsed = result
            .map_err(|e| e.to_string())
            .and_then(|record| parse_row(&record, symbol, timeframe));
        match parsed {
            Ok(candle) => candles.push(candle),
            Err(reason) => {
                warn!(file = %path.display(), line, reason = %reason, "skipping CSV row");
                skipped_rows += 1;
            }
        }
    }

    candles.sort_by_key(|c| c.timestamp);
    debug!(
        file = %path.display(),
        rows = candles.len(),
        skipped = skipped_rows,
        "CSV read"
    );
    Ok(CsvCandles {
        candles,
        skipped_rows,
    })
}

fn parse_row(
    record: &StringRecord,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Candle, String> {
    let timestamp = parse_timestamp(field(record, 0, "date")?)?;
    let open = parse_price(record, 1, "open")?;
    let high = parse_price(record, 2, "high")?;
    let low = parse_price(record, 3, "low")?;
    let close = parse_price(record, 4, "close")?;
    let volume = match record.get(5).filter(|v| !v.is_empty()) {
        Some(v) => Some(
            v.parse::<i64>()
                .map_err(|e| format!("invalid volume {v:?}: {e}"))?,
        ),
        None => None,
    };

    Candle::new(symbol, timeframe, timestamp, open, high, low, close, volume)
        .map_err(|e| e.to_string())
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, String> {
    record
        .get(index)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing {name} column"))
}

fn parse_price(record: &StringRecord, index: usize, name: &str) -> Result<Decimal, String> {
    let raw = field(record, index, name)?;
    raw.parse::<Decimal>()
        .map_err(|e| format!("invalid {name} value {raw:?}: {e}"))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("invalid date {raw:?}"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid date {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eurusd_w1.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_rows_in_timestamp_order() {
        let (_dir, path) = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-22,1.0900,1.0950,1.0850,1.0880,\n\
             2024-01-15,1.0950,1.0990,1.0870,1.0900,12000\n",
        );
        let read = read_candles(&path, "EURUSD", Timeframe::W1).unwrap();

        assert_eq!(read.skipped_rows, 0);
        assert_eq!(read.candles.len(), 2);
        let first = &read.candles[0];
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(first.open, dec!(1.0950));
        assert_eq!(first.close, dec!(1.0900));
        assert_eq!(first.volume, Some(12000));
        assert_eq!(read.candles[1].volume, None);
        assert_eq!(first.symbol, "EURUSD");
    }

    #[test]
    fn accepts_rfc3339_dates_and_missing_volume_column() {
        let (_dir, path) = write_csv(
            "Date,Open,High,Low,Close\n\
             2024-01-15T00:00:00Z,1.0950,1.0990,1.0870,1.0900\n",
        );
        let read = read_candles(&path, "EURUSD", Timeframe::W1).unwrap();
        assert_eq!(read.candles.len(), 1);
        assert_eq!(read.candles[0].volume, None);
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let (_dir, path) = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-15,1.0950,1.0990,1.0870,1.0900,100\n\
             not-a-date,1.0950,1.0990,1.0870,1.0900,100\n\
             2024-01-29,abc,1.0990,1.0870,1.0900,100\n\
             2024-02-05,1.0950,1.0800,1.0870,1.0900,100\n\
             2024-02-12,1.0950\n",
        );
        let read = read_candles(&path, "EURUSD", Timeframe::W1).unwrap();
        assert_eq!(read.candles.len(), 1);
        assert_eq!(read.skipped_rows, 4);
    }

    #[test]
    fn missing_file_is_an_import_error() {
        let dir = TempDir::new().unwrap();
        let result = read_candles(&dir.path().join("absent.csv"), "EURUSD", Timeframe::W1);
        assert!(matches!(result, Err(JournalError::Import { .. })));
    }
}
