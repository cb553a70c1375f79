//! Entity capability traits: identity, cacheable DTO shape, and DBO <-> DTO mapping.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Anything with a stable, unique identifier.
pub trait Identifiable {
    /// Type of the identifier (typically an integer, `String` or UUID).
    type Id: Display + Debug + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the entity's identifier.
    fn id(&self) -> Self::Id;
}

/// The externally exposed shape of an entity (DTO), storable in the cache.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use modern_kit::{CacheEntity, Identifiable};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Customer {
///     pub id: u64,
///     pub name: String,
/// }
///
/// impl Identifiable for Customer {
///     type Id = u64;
///     fn id(&self) -> u64 {
///         self.id
///     }
/// }
///
/// impl CacheEntity for Customer {
///     fn cache_prefix() -> &'static str {
///         "customer"
///     }
/// }
/// ```
pub trait CacheEntity:
    Identifiable + Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone + 'static
{
    /// Namespace for this entity's cache keys. Final key format: `"{prefix}:{id}"`.
    fn cache_prefix() -> &'static str;

    /// Serialize for cache storage (postcard inside a versioned envelope).
    ///
    /// See `crate::serialization` for the format.
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize from cache storage, validating magic and schema version.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: Bad magic
    /// - `Error::VersionMismatch`: Schema version changed
    /// - `Error::DeserializationError`: Corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: validate the DTO after loading it from cache.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// The backing-store shape of an entity (DBO) and its mapping to the DTO.
///
/// Services speak DTOs to their callers and DBOs to their repositories; this trait is the
/// only bridge between the two.
pub trait EntityModel: Identifiable + Clone + Send + Sync + 'static {
    /// DTO exposed by services for this model. Shares the model's identifier type.
    type Dto: CacheEntity<Id = Self::Id>;

    fn to_dto(&self) -> Self::Dto;

    fn from_dto(dto: Self::Dto) -> Self;
}
