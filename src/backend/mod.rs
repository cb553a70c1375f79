//! Cache backend implementations.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;

pub use inmemory::{CacheStats, InMemoryBackend};

/// Trait for cache backend implementations.
///
/// Stores opaque byte values under string keys. The cached service owns encoding and key
/// layout; a backend only has to keep bytes and honour the TTL it was given.
///
/// **TTL semantics:** a TTL passed to [`set`](CacheBackend::set) is a *sliding* expiration.
/// Every successful [`get`](CacheBackend::get) of the key restarts the timer. `None` means the
/// entry never expires and is only removed through [`delete`](CacheBackend::delete).
///
/// All methods take `&self`; implementations use interior mutability or external storage.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key, resetting its sliding expiration.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (absent or expired)
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache with optional sliding TTL.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value from cache. Removing an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists in cache without touching its expiration.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Bulk get. Default implementation calls `get()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Bulk delete. Default implementation calls `delete()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Remove every entry.
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}
