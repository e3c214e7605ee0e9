//! In-memory indicator cache store.
//!
//! The default store for single-process runs, and the optimizer's shared
//! cache across candidates. Entries live until the process exits. A
//! poisoned lock never panics a caller: reads recover the last-known map,
//! writes fail with [`QuantbackError::CacheStore`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::error::QuantbackError;
use crate::domain::indicator::IndicatorSeries;
use crate::ports::cache_port::{CacheKey, IndicatorCacheStore};

struct CacheEntry {
    series: IndicatorSeries,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the entry for `key` was stored, if present.
    pub fn created_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| entry.created_at)
    }
}

impl IndicatorCacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<IndicatorSeries> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| entry.series.clone())
    }

    fn put(&self, key: &CacheKey, series: &IndicatorSeries) -> Result<(), QuantbackError> {
        let mut entries = self.entries.write().map_err(|_| QuantbackError::CacheStore {
            reason: "cache lock poisoned".into(),
        })?;
        entries.insert(
            key.clone(),
            CacheEntry {
                series: series.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }
}
