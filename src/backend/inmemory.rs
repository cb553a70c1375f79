//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding. Expiration is sliding: each
//! read of a live entry pushes its deadline out by the entry's own TTL. Expired entries are
//! dropped lazily on access, or eagerly through [`InMemoryBackend::purge_expired`].

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    data: Vec<u8>,
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        // A deadline past the clock's range never expires.
        let expires_at = ttl.and_then(|d| Instant::now().checked_add(d));
        CacheEntry {
            data,
            ttl,
            expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    fn touch(&mut self, now: Instant) {
        if let Some(ttl) = self.ttl {
            self.expires_at = now.checked_add(ttl);
        }
    }
}

/// Thread-safe in-memory cache backend with sliding expiration.
///
/// Clones share the same store.
///
/// # Example
///
/// ```no_run
/// use modern_kit::backend::{CacheBackend, InMemoryBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     backend.set("session:1", b"token".to_vec(), Some(Duration::from_secs(300))).await?;
///
///     // Reading keeps the entry alive for another 300 seconds.
///     assert!(backend.get("session:1").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("✓ InMemory PURGE removed {} expired entries", removed);
        }
        removed
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total_bytes: usize = self.store.iter().map(|entry| entry.data.len()).sum();
        let expired_entries = self
            .store
            .iter()
            .filter(|entry| entry.is_expired(now))
            .count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries,
            total_bytes,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        if let Some(mut entry) = self.store.get_mut(key) {
            if !entry.is_expired(now) {
                entry.touch(now);
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Guard released above; drop the entry only if it is still expired.
        self.store.remove_if(key, |_, entry| entry.is_expired(now));
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store
            .insert(key.to_string(), CacheEntry::new(value, ttl));

        match ttl {
            Some(d) => debug!("✓ InMemory SET {} (sliding TTL: {:?})", key, d),
            None => debug!("✓ InMemory SET {}", key),
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .store
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.remove(*key);
        }

        debug!("✓ InMemory MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
