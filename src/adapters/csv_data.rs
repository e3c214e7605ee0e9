//! CSV file historical data adapter.
//!
//! One file per (symbol, timeframe) pair under a base directory, named
//! `{symbol}_{timeframe}.csv` with `/` in the symbol flattened to `-`
//! (so `BTC/USDT` on `1h` reads `BTC-USDT_1h.csv`). Columns:
//! `timestamp,open,high,low,close,volume` with RFC 3339 timestamps.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::bar::{self, Bar};
use crate::domain::error::QuantbackError;
use crate::ports::data_port::HistoricalDataProvider;

pub struct CsvDataAdapter {
    base_path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        let flat_symbol = symbol.replace('/', "-");
        self.base_path
            .join(format!("{}_{}.csv", flat_symbol, timeframe))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, QuantbackError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QuantbackError::Io {
            reason: format!("invalid timestamp {value:?}: {e}"),
        })
}

fn parse_column(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, QuantbackError> {
    record
        .get(index)
        .ok_or_else(|| QuantbackError::Io {
            reason: format!("missing {name} column"),
        })?
        .parse()
        .map_err(|e| QuantbackError::Io {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl HistoricalDataProvider for CsvDataAdapter {
    fn fetch(
        &self,
        asset_symbol: &str,
        timeframe: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Bar>, QuantbackError> {
        let path = self.csv_path(asset_symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|_| QuantbackError::DataUnavailable {
            symbol: asset_symbol.to_string(),
            timeframe: timeframe.to_string(),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| QuantbackError::Io {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let timestamp_str = record.get(0).ok_or_else(|| QuantbackError::Io {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = parse_timestamp(timestamp_str)?;

            if timestamp < start_time || timestamp > end_time {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: parse_column(&record, 1, "open")?,
                high: parse_column(&record, 2, "high")?,
                low: parse_column(&record, 3, "low")?,
                close: parse_column(&record, 4, "close")?,
                volume: parse_column(&record, 5, "volume")?,
            });
        }

        bar::sort_bars(&mut bars);
        bar::validate_bars(&bars, asset_symbol, timeframe)?;

        debug!(
            symbol = asset_symbol,
            timeframe,
            bars = bars.len(),
            path = %path.display(),
            "loaded historical bars"
        );
        Ok(bars)
    }
}
