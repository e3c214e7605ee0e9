//! Historical data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::QuantbackError;

/// External collaborator supplying historical bars.
///
/// Implementations return a chronologically ordered sequence and fail with
/// [`QuantbackError::DataUnavailable`] when the requested range is empty.
/// Retry and timeout policy live behind this boundary, not in the core.
pub trait HistoricalDataProvider {
    fn fetch(
        &self,
        asset_symbol: &str,
        timeframe: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Bar>, QuantbackError>;
}
