//! Cache key construction.

use crate::entity::CacheEntity;

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build the full cache key for an entity id: `"{prefix}:{id}"`.
    pub fn build<T: CacheEntity>(id: &T::Id) -> String {
        format!("{}:{}", T::cache_prefix(), id)
    }

    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn std::fmt::Display) -> String {
        format!("{}:{}", prefix, id)
    }
}
