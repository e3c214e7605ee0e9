//! Indicator series memoization over a cache store port.
//!
//! The cache is a performance optimization, never a correctness dependency:
//! a failed store write is logged and the in-memory result is used.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::error::QuantbackError;
use crate::domain::indicator::{self, IndicatorSeries, IndicatorSpec};
use crate::ports::cache_port::{CacheKey, IndicatorCacheStore};

#[derive(Clone)]
pub struct IndicatorCache {
    store: Arc<dyn IndicatorCacheStore>,
}

impl IndicatorCache {
    pub fn new(store: Arc<dyn IndicatorCacheStore>) -> Self {
        IndicatorCache { store }
    }

    /// Return the cached series for `key`, or compute, store, and return it.
    ///
    /// A hit is returned unchanged, with no re-validation against current
    /// parameters. A miss invokes `compute` exactly once.
    pub fn get_or_compute<F>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<IndicatorSeries, QuantbackError>
    where
        F: FnOnce() -> Result<IndicatorSeries, QuantbackError>,
    {
        if let Some(series) = self.store.get(key) {
            debug!(
                symbol = %key.asset_symbol,
                timeframe = %key.time_frame,
                indicator = %key.indicator_name,
                "indicator cache hit"
            );
            return Ok(series);
        }

        let series = compute()?;

        if let Err(err) = self.store.put(key, &series) {
            warn!(
                symbol = %key.asset_symbol,
                timeframe = %key.time_frame,
                indicator = %key.indicator_name,
                error = %err,
                "indicator cache write failed, continuing with in-memory result"
            );
        }

        Ok(series)
    }

    /// Memoized indicator computation for one strategy coordinate.
    pub fn series_for(
        &self,
        asset_symbol: &str,
        time_frame: &str,
        spec: &IndicatorSpec,
        closes: &[f64],
    ) -> Result<IndicatorSeries, QuantbackError> {
        let key = CacheKey::new(asset_symbol, time_frame, &spec.name, &spec.parameters);
        self.get_or_compute(&key, || indicator::compute(spec, closes))
    }
}
