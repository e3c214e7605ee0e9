//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::QuantbackError;

/// One OHLCV sample for a fixed time interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume doubles as the available liquidity at this bar.
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Sort bars chronologically. The bar sequence is gap-tolerant, but the
/// simulator requires ascending order.
pub fn sort_bars(bars: &mut [Bar]) {
    bars.sort_by_key(|b| b.timestamp);
}

/// Verify the sequence is non-empty and strictly increasing by timestamp.
pub fn validate_bars(bars: &[Bar], symbol: &str, timeframe: &str) -> Result<(), QuantbackError> {
    if bars.is_empty() {
        return Err(QuantbackError::DataUnavailable {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        });
    }
    for pair in bars.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(QuantbackError::Validation {
                reason: format!(
                    "bar sequence for {symbol} is not strictly increasing at {}",
                    pair[1].timestamp
                ),
            });
        }
    }
    Ok(())
}

/// Close prices of a bar sequence, in order.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(hour: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn typical_price() {
        let bar = bar_at(0, 100.0);
        let expected = (101.0 + 99.0 + 100.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn sort_orders_by_timestamp() {
        let mut bars = vec![bar_at(3, 3.0), bar_at(1, 1.0), bar_at(2, 2.0)];
        sort_bars(&mut bars);
        assert_eq!(close_prices(&bars), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn validate_rejects_empty() {
        let err = validate_bars(&[], "BTC/USDT", "1h").unwrap_err();
        assert!(matches!(err, QuantbackError::DataUnavailable { .. }));
    }

    #[test]
    fn validate_rejects_duplicate_timestamps() {
        let bars = vec![bar_at(1, 1.0), bar_at(1, 2.0)];
        let err = validate_bars(&bars, "BTC/USDT", "1h").unwrap_err();
        assert!(matches!(err, QuantbackError::Validation { .. }));
    }

    #[test]
    fn validate_accepts_gaps() {
        // A missing hour between bars is fine, only ordering matters.
        let bars = vec![bar_at(1, 1.0), bar_at(4, 2.0), bar_at(9, 3.0)];
        assert!(validate_bars(&bars, "BTC/USDT", "1h").is_ok());
    }
}
