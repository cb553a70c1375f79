//! Versioned cache entry encoding.
//!
//! Every value the cached service writes to a [`CacheBackend`](crate::backend::CacheBackend)
//! is a postcard-encoded envelope:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (u32)    │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "MDKT"
//! ```
//!
//! Entries that fail any check are reported as errors; the cached service evicts them
//! and falls back to the backing store.
//!
//! ```rust
//! use modern_kit::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Tag {
//!     id: u64,
//!     label: String,
//! }
//!
//! # fn main() -> modern_kit::Result<()> {
//! let tag = Tag { id: 1, label: "rust".to_string() };
//! let bytes = serialize_for_cache(&tag)?;
//! let restored: Tag = deserialize_from_cache(&bytes)?;
//! assert_eq!(tag, restored);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header identifying entries written by this crate.
pub const CACHE_MAGIC: [u8; 4] = *b"MDKT";

/// Current schema version.
///
/// Bump when a cached DTO changes shape (fields added, removed, reordered or retyped).
/// Entries written under another version are evicted on read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Envelope wrapped around every cache payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Wrap a payload with the current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value into an enveloped cache entry.
///
/// # Errors
///
/// Returns `Error::SerializationError` if postcard encoding fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize an enveloped cache entry, checking magic then version.
///
/// # Errors
///
/// - `Error::DeserializationError`: envelope or payload cannot be decoded
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: entry written under another schema version
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        debug!("Cache deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
