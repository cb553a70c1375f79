//! Best-effort cache boundary used by the cached service.
//!
//! Every method here absorbs cache-layer failures: they are logged, reported to the
//! metrics hook, and turned into a miss. A failed write evicts the key so a stale
//! entry never outlives the failure.

use crate::backend::CacheBackend;
use crate::config::CacheSettings;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics};
use std::time::Instant;

pub struct CacheLayer<B: CacheBackend> {
    backend: B,
    settings: CacheSettings,
    metrics: Box<dyn CacheMetrics>,
}

impl<B: CacheBackend> CacheLayer<B> {
    pub fn new(backend: B, settings: CacheSettings) -> Self {
        CacheLayer {
            backend,
            settings,
            metrics: Box::new(NoOpMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Cached DTO for `id`, or `None` on a miss or any cache failure.
    ///
    /// Entries that fail to decode or validate are evicted.
    pub async fn lookup<T: CacheEntity>(&self, id: &T::Id) -> Option<T> {
        let key = CacheKeyBuilder::build::<T>(id);
        let timer = Instant::now();

        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("✗ Cache miss for {}", key);
                self.metrics.record_miss(&key, timer.elapsed());
                return None;
            }
            Err(e) => {
                self.absorb(&key, &e);
                return None;
            }
        };

        match T::deserialize_from_cache(&bytes).and_then(|dto| dto.validate().map(|_| dto)) {
            Ok(dto) => {
                debug!("✓ Cache hit for {}", key);
                self.metrics.record_hit(&key, timer.elapsed());
                Some(dto)
            }
            Err(e) => {
                self.absorb(&key, &e);
                self.delete_key(&key).await;
                None
            }
        }
    }

    /// Write `dto` under its id with the configured sliding expiration.
    pub async fn store<T: CacheEntity>(&self, dto: &T) {
        let key = CacheKeyBuilder::build::<T>(&dto.id());
        let timer = Instant::now();

        let written = match dto.serialize_for_cache() {
            Ok(bytes) => self.backend.set(&key, bytes, self.settings.expiration).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                debug!("✓ Cached {} (ttl: {:?})", key, self.settings.expiration);
                self.metrics.record_set(&key, timer.elapsed());
            }
            Err(e) => {
                self.absorb(&key, &e);
                self.delete_key(&key).await;
            }
        }
    }

    /// Remove the entry for `id`. Absent entries are not an error.
    pub async fn evict<T: CacheEntity>(&self, id: &T::Id) {
        let key = CacheKeyBuilder::build::<T>(id);
        self.delete_key(&key).await;
    }

    /// Remove every entry from the backend.
    ///
    /// # Errors
    /// Returns the backend error, e.g. `Error::NotImplemented` for backends without `clear_all`
    pub async fn clear(&self) -> Result<()> {
        warn!("Clearing all cache entries");
        self.backend.clear_all().await
    }

    async fn delete_key(&self, key: &str) {
        let timer = Instant::now();
        match self.backend.delete(key).await {
            Ok(()) => self.metrics.record_delete(key, timer.elapsed()),
            Err(e) => self.absorb(key, &e),
        }
    }

    fn absorb(&self, key: &str, error: &Error) {
        warn!("Cache failure for {} treated as a miss: {}", key, error);
        self.metrics.record_error(key, &error.to_string());
    }
}
