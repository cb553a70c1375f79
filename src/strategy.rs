//! Read strategies for the cached service.
//!
//! [`CachedCrudService::get`](crate::service::CachedCrudService::get) uses
//! [`CacheStrategy::Refresh`]; [`get_with`](crate::service::CachedCrudService::get_with)
//! takes any of the four.
//!
//! | Strategy | Cache Hit | Cache Miss | Use Case |
//! |----------|-----------|-----------|----------|
//! | **Refresh** | Return | Store fallback, populate | Default read-through |
//! | **Fresh** | Return | NotFound | Cache-only reads (store may be down) |
//! | **Invalidate** | Evict, then read store | Store fallback, populate | Known-stale entry |
//! | **Bypass** | Ignored | Store always, populate | Read-your-writes across instances |
//!
//! Population on the store path honours `CacheSettings::cache_on_read`.

/// Strategy controlling how a single read uses the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache only. A miss is reported as not found without touching the store.
    Fresh,

    /// Cache first, backing store on miss, then populate.
    #[default]
    Refresh,

    /// Evict the cached entry, then re-read from the backing store and populate.
    /// A failed or cancelled read leaves the entry evicted.
    Invalidate,

    /// Skip the cache lookup; always read the backing store and populate for later readers.
    Bypass,
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Fresh => write!(f, "Fresh"),
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Invalidate => write!(f, "Invalidate"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
