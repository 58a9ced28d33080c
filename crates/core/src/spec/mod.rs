//! Cache specification
//!
//! A [`CacheSpec`] is the frozen, validated description of the cache a
//! caller wants. It is produced only by [`CacheSpecBuilder::build`] and
//! consumed by provider factories.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use omnicache_core::{CacheSpec, ExpiryType};
//!
//! let mut builder = CacheSpec::<String, u64>::builder();
//! builder.max_size(1_000)?.expiry_type(ExpiryType::PostAccess)?.expiry_time(Duration::from_secs(30))?;
//! let spec = builder.build()?;
//!
//! assert_eq!(spec.max_size(), Some(1_000));
//! assert_eq!(spec.expiry(), Some((ExpiryType::PostAccess, Duration::from_secs(30))));
//! # Ok::<(), omnicache_core::CacheError>(())
//! ```

mod builder;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use builder::{CacheSpecBuilder, MAX_EXPIRY_TIME};
use omnicache_common::Scheduler;
use omnicache_domain::{ExpiryType, ProviderId};

use crate::cache_ports::RemovalListener;

/// Immutable cache configuration.
///
/// Two specifications are equal when every field matches; the listener and
/// executor compare by identity.
pub struct CacheSpec<K, V> {
    provider: Option<ProviderId>,
    max_size: Option<u64>,
    expiry_type: ExpiryType,
    expiry_time: Option<Duration>,
    removal_listener: Option<Arc<dyn RemovalListener<K, V>>>,
    executor: Option<Arc<dyn Scheduler>>,
    high_contention: bool,
}

impl<K, V> CacheSpec<K, V> {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> CacheSpecBuilder<K, V> {
        CacheSpecBuilder::new()
    }

    /// Explicitly requested provider; `None` means auto-resolve.
    #[must_use]
    pub const fn provider(&self) -> Option<ProviderId> {
        self.provider
    }

    /// Maximum number of entries; `None` means unbounded.
    #[must_use]
    pub const fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    /// Expiry clock reset policy.
    #[must_use]
    pub const fn expiry_type(&self) -> ExpiryType {
        self.expiry_type
    }

    /// Expiry time, present exactly when [`Self::expiry_type`] is not `None`.
    #[must_use]
    pub const fn expiry_time(&self) -> Option<Duration> {
        self.expiry_time
    }

    /// Expiry type and time together, when expiry is enabled.
    #[must_use]
    pub fn expiry(&self) -> Option<(ExpiryType, Duration)> {
        self.expiry_time.filter(|_| self.expiry_type.is_enabled()).map(|ttl| (self.expiry_type, ttl))
    }

    /// Listener notified on every removal.
    #[must_use]
    pub fn removal_listener(&self) -> Option<&Arc<dyn RemovalListener<K, V>>> {
        self.removal_listener.as_ref()
    }

    /// Caller-owned scheduler for time-driven eviction.
    #[must_use]
    pub fn executor(&self) -> Option<&Arc<dyn Scheduler>> {
        self.executor.as_ref()
    }

    /// Whether concurrency-tuned internals were requested.
    #[must_use]
    pub const fn high_contention(&self) -> bool {
        self.high_contention
    }

    /// A size bound of zero: nothing is ever retained.
    #[must_use]
    pub fn is_always_empty(&self) -> bool {
        self.max_size == Some(0)
    }
}

impl<K, V> Clone for CacheSpec<K, V> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider,
            max_size: self.max_size,
            expiry_type: self.expiry_type,
            expiry_time: self.expiry_time,
            removal_listener: self.removal_listener.clone(),
            executor: self.executor.clone(),
            high_contention: self.high_contention,
        }
    }
}

impl<K, V> PartialEq for CacheSpec<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.max_size == other.max_size
            && self.expiry_type == other.expiry_type
            && self.expiry_time == other.expiry_time
            && same_target(self.removal_listener.as_ref(), other.removal_listener.as_ref())
            && same_target(self.executor.as_ref(), other.executor.as_ref())
            && self.high_contention == other.high_contention
    }
}

impl<K, V> Eq for CacheSpec<K, V> {}

impl<K, V> fmt::Debug for CacheSpec<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSpec")
            .field("provider", &self.provider)
            .field("max_size", &self.max_size)
            .field("expiry_type", &self.expiry_type)
            .field("expiry_time", &self.expiry_time)
            .field("removal_listener", &self.removal_listener.is_some())
            .field("executor", &self.executor)
            .field("high_contention", &self.high_contention)
            .finish()
    }
}

// Data-pointer identity; vtable pointers are not stable across codegen units.
fn same_target<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>()),
        (None, None) => true,
        _ => false,
    }
}
