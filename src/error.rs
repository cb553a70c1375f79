//! Error types for the CRUD and cache layers.

use std::fmt;
use std::sync::Arc;

/// Result type for service, repository and cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a backing store, with the driver's original error kept as `source()`.
#[derive(Debug, Clone)]
pub struct RepositoryError {
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RepositoryError {
    /// Create a repository error without an underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        RepositoryError {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a driver error, keeping it reachable through `source()`.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RepositoryError {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Error types for the framework.
///
/// Variants fall into four groups:
///
/// - **Typed outcomes** the caller is expected to branch on: [`Error::NotFound`],
///   [`Error::Conflict`], [`Error::Translation`], [`Error::ValidationError`].
/// - **Backing store failures**: [`Error::Repository`]. Retrying may help.
/// - **Cache layer failures**: serialization, envelope and backend variants. The cached
///   service swallows these at the cache boundary and treats the entry as absent, so
///   callers of the services never observe them.
/// - **Operational**: cancellation, configuration and the catch-alls.
#[derive(Debug, Clone)]
pub enum Error {
    /// The requested identifier does not exist in the backing store.
    NotFound {
        /// Entity name (its cache prefix)
        entity: &'static str,
        /// Display form of the identifier
        id: String,
    },

    /// A write collided with existing state (e.g. creating an identifier that already exists).
    Conflict(String),

    /// A specification could not be translated into a native query.
    ///
    /// Raised at query-build time when a filter field, order-by key or include names a
    /// member the provider has no column or relation for.
    Translation(String),

    /// Validation failed for an entity or request.
    ValidationError(String),

    /// The backing store failed (connectivity, constraint violation, timeout).
    Repository(RepositoryError),

    /// Serialization failed when converting an entity to cache bytes.
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to an entity.
    ///
    /// **Recovery:** evict the entry and re-fetch from the backing store.
    DeserializationError(String),

    /// Cache entry header is invalid (bad magic or unreadable envelope).
    InvalidCacheEntry(String),

    /// Cached entry was written with a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Cache backend storage error.
    BackendError(String),

    /// The operation was cancelled before the backing store committed it.
    Cancelled,

    /// Configuration could not be loaded or is invalid.
    ConfigError(String),

    /// Operation is not supported by this repository or backend.
    NotImplemented(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Build a [`Error::NotFound`] for an entity type and id.
    pub fn not_found(entity: &'static str, id: &dyn fmt::Display) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap a driver error as a backing store failure.
    pub fn repository<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Repository(RepositoryError::with_source(message, source))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for failures that originate in the cache layer.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            Error::SerializationError(_)
                | Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
                | Error::BackendError(_)
        )
    }

    /// True when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Repository(_) | Error::BackendError(_) | Error::Cancelled
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound { entity, id } => write!(f, "Not found: {} {}", entity, id),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::Translation(msg) => write!(f, "Translation error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::Repository(e) => write!(f, "Repository error: {}", e),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Repository(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<RepositoryError> for Error {
    fn from(e: RepositoryError) -> Self {
        Error::Repository(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Repository(RepositoryError::with_source("I/O failure", e))
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("user", &42);
        assert_eq!(err.to_string(), "Not found: user 42");

        let err = Error::Translation("unknown column 'age'".to_string());
        assert_eq!(err.to_string(), "Translation error: unknown column 'age'");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_repository_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = Error::repository("fetch user failed", io);

        assert!(err.is_retryable());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Repository error: fetch user failed: socket timed out"
        );

        let repo_err = err.source().expect("repository error as source");
        let cause = repo_err.source().expect("driver error as source");
        assert_eq!(cause.to_string(), "socket timed out");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::not_found("user", &"1").is_not_found());
        assert!(Error::BackendError("down".to_string()).is_cache_error());
        assert!(Error::VersionMismatch {
            expected: 1,
            found: 2
        }
        .is_cache_error());
        assert!(!Error::Conflict("dup".to_string()).is_retryable());
        assert!(!Error::Translation("x".to_string()).is_cache_error());
    }
}
