//! Built-in engine adapters
//!
//! Each engine sits behind a cargo feature of the same name. When a feature
//! is disabled its registry entry stays in place with a probe that always
//! fails and a factory that reports the provider as unavailable, so the
//! resolution order never changes shape.
//!
//! | Provider | Size bound | Expiry | Removal causes |
//! |---|---|---|---|
//! | `moka` | native | native (time-to-live / time-to-idle) | native table |
//! | `lru` | native | rejected | derived from operation |
//! | `dashmap` | rejected | scheduler-driven | derived from operation |

pub(crate) mod alter;
#[cfg(feature = "dashmap")]
pub(crate) mod dashmap;
pub(crate) mod empty;
#[cfg(feature = "lru")]
pub(crate) mod lru;
#[cfg(feature = "moka")]
pub(crate) mod moka;

use omnicache_domain::{CacheError, CacheResult, Capability, ProviderId};

use crate::cache_ports::{Cache, CacheKey, CacheValue};
use crate::registry::ProviderEntry;
use crate::spec::CacheSpec;

/// Registry entry for a built-in provider.
pub(crate) fn builtin_entry<K: CacheKey, V: CacheValue>(id: ProviderId) -> ProviderEntry<K, V> {
    match id {
        ProviderId::Moka => ProviderEntry::new(id, moka_available, build_moka::<K, V>),
        ProviderId::Lru => ProviderEntry::new(id, lru_available, build_lru::<K, V>),
        ProviderId::DashMap => ProviderEntry::new(id, dashmap_available, build_dashmap::<K, V>),
    }
}

/// Fail with `UnsupportedCapability` when `spec` requests expiry.
pub(crate) fn reject_expiry<K, V>(provider: ProviderId, spec: &CacheSpec<K, V>) -> CacheResult<()> {
    match spec.expiry().and_then(|(expiry_type, _)| Capability::for_expiry(expiry_type)) {
        Some(capability) => Err(CacheError::UnsupportedCapability { provider, capability }),
        None => Ok(()),
    }
}

/// Fail with `UnsupportedCapability` when `spec` requests a size bound.
pub(crate) fn reject_size_bound<K, V>(provider: ProviderId, spec: &CacheSpec<K, V>) -> CacheResult<()> {
    match spec.max_size() {
        Some(_) => Err(CacheError::UnsupportedCapability { provider, capability: Capability::SizeBound }),
        None => Ok(()),
    }
}

const fn moka_available() -> bool {
    cfg!(feature = "moka")
}

const fn lru_available() -> bool {
    cfg!(feature = "lru")
}

const fn dashmap_available() -> bool {
    cfg!(feature = "dashmap")
}

#[cfg(feature = "moka")]
fn build_moka<K: CacheKey, V: CacheValue>(spec: &CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>> {
    Ok(Box::new(moka::MokaAdapter::build(spec)?))
}

#[cfg(not(feature = "moka"))]
fn build_moka<K: CacheKey, V: CacheValue>(_spec: &CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>> {
    tracing::warn!("moka provider requested but the 'moka' feature is not enabled");
    Err(CacheError::ProviderUnavailable(ProviderId::Moka))
}

#[cfg(feature = "lru")]
fn build_lru<K: CacheKey, V: CacheValue>(spec: &CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>> {
    Ok(Box::new(lru::LruAdapter::build(spec)?))
}

#[cfg(not(feature = "lru"))]
fn build_lru<K: CacheKey, V: CacheValue>(_spec: &CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>> {
    tracing::warn!("lru provider requested but the 'lru' feature is not enabled");
    Err(CacheError::ProviderUnavailable(ProviderId::Lru))
}

#[cfg(feature = "dashmap")]
fn build_dashmap<K: CacheKey, V: CacheValue>(
    spec: &CacheSpec<K, V>,
) -> CacheResult<Box<dyn Cache<K, V>>> {
    Ok(Box::new(dashmap::DashMapAdapter::build(spec)?))
}

#[cfg(not(feature = "dashmap"))]
fn build_dashmap<K: CacheKey, V: CacheValue>(
    _spec: &CacheSpec<K, V>,
) -> CacheResult<Box<dyn Cache<K, V>>> {
    tracing::warn!("dashmap provider requested but the 'dashmap' feature is not enabled");
    Err(CacheError::ProviderUnavailable(ProviderId::DashMap))
}
