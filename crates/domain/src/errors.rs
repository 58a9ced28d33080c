//! Error types used throughout the cache facade

use thiserror::Error;

use crate::types::{Capability, ProviderId};

/// Errors raised while building, resolving or using a cache.
///
/// Construction-time variants surface from the facade entry point; the
/// remaining ones surface from the operation that hit them. None of them are
/// retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A field value or a combination of fields is invalid.
    #[error("Invalid cache specification: {0}")]
    InvalidSpecification(String),

    /// A builder was used after `build()` finalized it.
    #[error("Cache specification builder has already been finalized")]
    BuilderFinalized,

    /// The explicitly requested provider cannot be used in this runtime.
    #[error("Cache provider '{0}' is not available")]
    ProviderUnavailable(ProviderId),

    /// Auto-resolution found no usable provider.
    #[error("No cache provider is available")]
    NoProviderAvailable,

    /// The provider refuses to emulate a requested semantic.
    #[error("Cache provider '{provider}' does not support {capability}")]
    UnsupportedCapability {
        /// Provider that refused.
        provider: ProviderId,
        /// The semantic it cannot reproduce.
        capability: Capability,
    },

    /// The cache was closed before the operation.
    #[error("Cache backed by '{0}' is closed")]
    ClosedCache(ProviderId),

    /// Settings could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A scheduler needed for expiry could not be started.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl CacheError {
    /// Whether the error can only occur while creating a cache.
    #[must_use]
    pub const fn is_construction_error(&self) -> bool {
        !matches!(self, Self::ClosedCache(_))
    }

    /// Whether the error reports use of a closed cache.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedCache(_))
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_provider_and_capability() {
        let err = CacheError::UnsupportedCapability {
            provider: ProviderId::Lru,
            capability: Capability::PostAccessExpiry,
        };
        assert_eq!(err.to_string(), "Cache provider 'lru' does not support post-access expiry");
        assert_eq!(
            CacheError::ProviderUnavailable(ProviderId::DashMap).to_string(),
            "Cache provider 'dashmap' is not available"
        );
    }

    #[test]
    fn test_classification() {
        assert!(CacheError::ClosedCache(ProviderId::Moka).is_closed());
        assert!(!CacheError::ClosedCache(ProviderId::Moka).is_construction_error());
        assert!(CacheError::NoProviderAvailable.is_construction_error());
        assert!(CacheError::BuilderFinalized.is_construction_error());
    }
}
