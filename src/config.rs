//! Cache settings and their loading.
//!
//! Settings merge from, lowest to highest precedence:
//! 1. Programmatic defaults ([`CacheSettings::default`])
//! 2. A YAML file (optional; missing files are skipped)
//! 3. `MODERN_CACHE_*` environment variables
//!
//! ```yaml
//! add_to_cache_when_entity_created: true
//! add_or_update_in_cache_when_entity_is_updated: false
//! cache_on_read: true
//! expiration_secs: 300   # omit or null for entries that never expire
//! ```

use crate::error::{Error, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables read by [`CacheSettings::load`].
pub const ENV_PREFIX: &str = "MODERN_CACHE_";

/// Default settings file read by [`CacheSettings::load`].
pub const DEFAULT_CONFIG_FILE: &str = "modern-kit.yaml";

/// Longest accepted expiration (one year).
pub const MAX_EXPIRATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Cache population and expiration policy of a cached service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache the stored entity right after a successful create.
    pub add_to_cache_when_entity_created: bool,

    /// Refresh the cache right after a successful update. When false the entry is
    /// invalidated instead, so the next read re-fetches from the backing store.
    pub add_or_update_in_cache_when_entity_is_updated: bool,

    /// Populate the cache on read-through misses.
    pub cache_on_read: bool,

    /// Sliding expiration. `None`: entries never expire.
    #[serde(rename = "expiration_secs", with = "expiration_secs")]
    pub expiration: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            add_to_cache_when_entity_created: true,
            add_or_update_in_cache_when_entity_is_updated: true,
            cache_on_read: true,
            expiration: None,
        }
    }
}

impl CacheSettings {
    /// Entries expire after `ttl` without access.
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    pub fn with_add_on_create(mut self, enabled: bool) -> Self {
        self.add_to_cache_when_entity_created = enabled;
        self
    }

    pub fn with_add_or_update_on_update(mut self, enabled: bool) -> Self {
        self.add_or_update_in_cache_when_entity_is_updated = enabled;
        self
    }

    pub fn with_cache_on_read(mut self, enabled: bool) -> Self {
        self.cache_on_read = enabled;
        self
    }

    /// Figment with defaults, the optional YAML file, then environment overrides.
    ///
    /// Exposed so applications can merge further providers before extracting.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(CacheSettings::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from [`DEFAULT_CONFIG_FILE`] in the working directory plus environment.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` on malformed input or invalid values
    pub fn load() -> Result<Self> {
        Self::load_from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific YAML file plus environment.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` on malformed input or invalid values
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract(Self::figment(Some(path.as_ref())))
    }

    /// Extract and validate settings from a prepared figment.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` on malformed input or invalid values
    pub fn extract(figment: Figment) -> Result<Self> {
        let settings: CacheSettings = figment.extract()?;
        settings.validate()?;
        debug!("Loaded cache settings: {:?}", settings);
        Ok(settings)
    }

    /// # Errors
    /// Returns `Error::ConfigError` for a zero expiration or one above [`MAX_EXPIRATION`]
    pub fn validate(&self) -> Result<()> {
        if self.expiration.is_some_and(|d| d.is_zero()) {
            return Err(Error::ConfigError(
                "expiration_secs must be positive; omit it for entries that never expire"
                    .to_string(),
            ));
        }
        if self.expiration.is_some_and(|d| d > MAX_EXPIRATION) {
            return Err(Error::ConfigError(format!(
                "expiration_secs must be at most {}; omit it for entries that never expire",
                MAX_EXPIRATION.as_secs()
            )));
        }
        Ok(())
    }
}

mod expiration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
