//! In-memory cache of decoded global fields.
//!
//! Keyed by (date, hour); fields are global, so every region and product for
//! the same timestamp shares one entry. Bounded LRU with single-flight
//! downloads: each key owns a `OnceCell`, so concurrent requests for the
//! same timestamp wait on one archive fetch instead of racing. A failed
//! fetch leaves the cell empty and a later request tries again.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use era5_grid::FieldSet;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use turb_common::{FieldKey, TurbError};

use crate::provider::FieldProvider;

type Slot = Arc<OnceCell<Arc<FieldSet>>>;

pub struct FieldCache {
    slots: Mutex<LruCache<FieldKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl FieldCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the field set for `key`, fetching it through `provider` at
    /// most once per key even under concurrent requests.
    pub async fn get_or_fetch(
        &self,
        key: FieldKey,
        provider: &dyn FieldProvider,
    ) -> Result<Arc<FieldSet>, TurbError> {
        let (slot, ready) = {
            let mut slots = self.slots.lock().await;
            match slots.get(&key) {
                Some(slot) => (slot.clone(), slot.initialized()),
                None => {
                    let slot: Slot = Arc::new(OnceCell::new());
                    slots.put(key, slot.clone());
                    (slot, false)
                }
            }
        };

        if ready {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("cache_hits_total").increment(1);
            debug!(date = %key.date, hour = key.hour, "field cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("cache_misses_total").increment(1);
        }

        let fields = slot
            .get_or_try_init(|| async { provider.fetch(&key).await.map(Arc::new) })
            .await?
            .clone();
        Ok(fields)
    }

    pub async fn stats(&self) -> CacheStats {
        let slots = self.slots.lock().await;
        CacheStats {
            entries: slots.len(),
            capacity: slots.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use era5_grid::GriddedField;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl CountingProvider {
        fn new(fail_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FieldProvider for CountingProvider {
        async fn fetch(&self, _key: &FieldKey) -> Result<FieldSet, TurbError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(TurbError::DataTimeout);
            }
            Ok(tiny_field_set())
        }
    }

    fn tiny_field_set() -> FieldSet {
        let levels = vec![500.0, 300.0];
        let lats = vec![1.0, 0.0];
        let lons = vec![0.0, 1.0];
        let data = vec![0.0f32; 8];
        FieldSet::new(
            GriddedField::new("u", levels.clone(), lats.clone(), lons.clone(), data.clone())
                .unwrap(),
            GriddedField::new("v", levels.clone(), lats.clone(), lons.clone(), data.clone())
                .unwrap(),
            GriddedField::new("z", levels, lats, lons, data).unwrap(),
        )
        .unwrap()
    }

    fn key(day: u32) -> FieldKey {
        FieldKey {
            date: NaiveDate::from_ymd_opt(2024, 11, day).unwrap(),
            hour: 10,
        }
    }

    #[tokio::test]
    async fn test_second_lookup_skips_provider() {
        let cache = FieldCache::new(4);
        let provider = CountingProvider::new(false);

        cache.get_or_fetch(key(24), &provider).await.unwrap();
        cache.get_or_fetch(key(24), &provider).await.unwrap();

        assert_eq!(provider.calls(), 1);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let cache = FieldCache::new(4);
        let provider = CountingProvider::new(false);

        let (a, b) = tokio::join!(
            cache.get_or_fetch(key(24), &provider),
            cache.get_or_fetch(key(24), &provider),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_retried_later() {
        let cache = FieldCache::new(4);
        let provider = CountingProvider::new(true);

        let first = cache.get_or_fetch(key(24), &provider).await;
        assert!(matches!(first, Err(TurbError::DataTimeout)));

        cache.get_or_fetch(key(24), &provider).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = FieldCache::new(1);
        let provider = CountingProvider::new(false);

        cache.get_or_fetch(key(23), &provider).await.unwrap();
        cache.get_or_fetch(key(24), &provider).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 1);

        // The evicted key needs a fresh fetch.
        cache.get_or_fetch(key(23), &provider).await.unwrap();
        assert_eq!(provider.calls(), 3);
    }
}
