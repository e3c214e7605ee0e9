//! Indicator cache store port trait.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::domain::error::QuantbackError;
use crate::domain::indicator::IndicatorSeries;

/// Cache key for a computed indicator series.
///
/// Includes a stable fingerprint of the parameter map so indicators sharing
/// a name but not parameters never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub asset_symbol: String,
    pub time_frame: String,
    pub indicator_name: String,
    pub params_fingerprint: u64,
}

impl CacheKey {
    pub fn new(
        asset_symbol: &str,
        time_frame: &str,
        indicator_name: &str,
        parameters: &BTreeMap<String, f64>,
    ) -> Self {
        CacheKey {
            asset_symbol: asset_symbol.to_string(),
            time_frame: time_frame.to_string(),
            indicator_name: indicator_name.to_string(),
            params_fingerprint: fingerprint(parameters),
        }
    }
}

/// Stable across runs for equal maps: BTreeMap iteration is key-ordered and
/// f64 bits are hashed exactly.
fn fingerprint(parameters: &BTreeMap<String, f64>) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for (key, value) in parameters {
        key.hash(&mut hasher);
        value.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// External persistence boundary for indicator series.
///
/// Implementations must support concurrent get/put; a duplicate concurrent
/// write for the same key is acceptable, last write wins.
pub trait IndicatorCacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<IndicatorSeries>;
    fn put(&self, key: &CacheKey, series: &IndicatorSeries) -> Result<(), QuantbackError>;
}
