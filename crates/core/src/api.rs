//! Facade entry point
//!
//! [`create`] runs a configuration block against a fresh builder, freezes
//! the specification, resolves a provider and returns the adapter behind a
//! [`CacheHandle`]. Any failure aborts the whole sequence; no partially
//! built cache escapes.
//!
//! # Examples
//!
//! ```
//! use omnicache_core::{create, ProviderId, RemovalCause};
//!
//! let cache = create::<String, u32, _>(|builder| {
//!     builder
//!         .provider(ProviderId::Lru)?
//!         .max_size(2)?
//!         .removal_listener(|key: &String, _: &u32, cause: RemovalCause| {
//!             assert_eq!(cause, RemovalCause::Size);
//!             assert_eq!(key, "a");
//!         })?;
//!     Ok(())
//! })?;
//!
//! cache.put("a".to_string(), 1)?;
//! cache.put("b".to_string(), 2)?;
//! cache.put("c".to_string(), 3)?;
//! assert_eq!(cache.size()?, 2);
//! # Ok::<(), omnicache_core::CacheError>(())
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use omnicache_domain::CacheResult;
use tracing::info;

use crate::cache_ports::{Cache, CacheKey, CacheValue};
use crate::providers::empty::EmptyCache;
use crate::registry::ProviderRegistry;
use crate::spec::{CacheSpec, CacheSpecBuilder};

/// Caller-visible cache.
///
/// Cheap to clone; clones share one adapter. The adapter is torn down when
/// [`Cache::close`] is called or the last clone is dropped.
pub struct CacheHandle<K, V> {
    inner: Arc<dyn Cache<K, V>>,
}

impl<K, V> CacheHandle<K, V> {
    fn new(inner: Box<dyn Cache<K, V>>) -> Self {
        Self { inner: Arc::from(inner) }
    }

    /// Value for `key`, or `default` when absent.
    ///
    /// # Errors
    /// `ClosedCache` after close.
    pub fn get_or_default(&self, key: &K, default: V) -> CacheResult<V> {
        Ok(self.inner.get(key)?.unwrap_or(default))
    }

    /// The shared adapter as a trait object.
    #[must_use]
    pub fn as_shared(&self) -> Arc<dyn Cache<K, V>> {
        Arc::clone(&self.inner)
    }
}

impl<K, V> Deref for CacheHandle<K, V> {
    type Target = dyn Cache<K, V>;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl<K, V> Clone for CacheHandle<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V> fmt::Debug for CacheHandle<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("provider", &self.inner.provider())
            .field("state", &self.inner.state())
            .finish()
    }
}

/// Build a cache with the built-in providers.
///
/// # Errors
/// Any error from `configure`, from [`CacheSpecBuilder::build`], from
/// resolution or from the provider's factory.
pub fn create<K, V, F>(configure: F) -> CacheResult<CacheHandle<K, V>>
where
    K: CacheKey,
    V: CacheValue,
    F: FnOnce(&mut CacheSpecBuilder<K, V>) -> CacheResult<()>,
{
    create_with(&ProviderRegistry::builtin(), configure)
}

/// Build a cache resolving against `registry`.
///
/// # Errors
/// See [`create`].
pub fn create_with<K, V, F>(registry: &ProviderRegistry<K, V>, configure: F) -> CacheResult<CacheHandle<K, V>>
where
    K: CacheKey,
    V: CacheValue,
    F: FnOnce(&mut CacheSpecBuilder<K, V>) -> CacheResult<()>,
{
    let mut builder = CacheSpec::builder();
    configure(&mut builder)?;
    let spec = builder.build()?;
    create_from_spec(registry, &spec)
}

/// Build a cache from an already frozen specification.
///
/// A zero size bound still resolves the provider, so an explicit request
/// for an unavailable provider fails, but yields a cache that never
/// retains anything instead of calling the factory.
///
/// # Errors
/// `ProviderUnavailable`, `NoProviderAvailable`, or the factory's error.
pub fn create_from_spec<K, V>(registry: &ProviderRegistry<K, V>, spec: &CacheSpec<K, V>) -> CacheResult<CacheHandle<K, V>>
where
    K: CacheKey,
    V: CacheValue,
{
    let entry = registry.resolve(spec.provider())?;
    let cache: Box<dyn Cache<K, V>> = if spec.is_always_empty() {
        Box::new(EmptyCache::new(entry.id(), spec))
    } else {
        entry.create(spec)?
    };

    info!(
        provider = %entry.id(),
        max_size = ?spec.max_size(),
        expiry_type = %spec.expiry_type(),
        expiry_time = ?spec.expiry_time(),
        high_contention = spec.high_contention(),
        listener = spec.removal_listener().is_some(),
        "Cache created"
    );
    Ok(CacheHandle::new(cache))
}
