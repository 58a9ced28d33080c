//! Provider registry and resolution
//!
//! A [`ProviderRegistry`] lists providers in priority order, each with an
//! availability probe and an adapter factory. Resolution is deterministic:
//!
//! - An explicitly requested provider is used if its probe succeeds, and
//!   otherwise fails with `ProviderUnavailable`. There is no fallback.
//! - Without a request, the first provider whose probe succeeds wins. If none
//!   does, resolution fails with `NoProviderAvailable`.
//!
//! # Examples
//!
//! ```
//! use omnicache_core::{ProviderId, ProviderRegistry};
//!
//! // Pretend the moka engine is missing from this runtime.
//! let registry = ProviderRegistry::<String, u32>::builtin().with_probe(ProviderId::Moka, || false);
//! let entry = registry.resolve(None).unwrap();
//! assert_ne!(entry.id(), ProviderId::Moka);
//! ```

use std::fmt;

use omnicache_domain::{CacheError, CacheResult, ProviderId};
use tracing::debug;

use crate::cache_ports::{Cache, CacheKey, CacheValue};
use crate::providers;
use crate::spec::CacheSpec;

/// Cheap, side-effect-free check that a provider can be used.
pub type AvailabilityProbe = fn() -> bool;

/// Builds an adapter from a specification.
pub type AdapterFactory<K, V> = fn(&CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>>;

/// One provider known to a registry.
pub struct ProviderEntry<K, V> {
    id: ProviderId,
    probe: AvailabilityProbe,
    factory: AdapterFactory<K, V>,
}

impl<K, V> ProviderEntry<K, V> {
    /// Create an entry.
    #[must_use]
    pub const fn new(id: ProviderId, probe: AvailabilityProbe, factory: AdapterFactory<K, V>) -> Self {
        Self { id, probe, factory }
    }

    /// Provider identifier.
    #[must_use]
    pub const fn id(&self) -> ProviderId {
        self.id
    }

    /// Run the availability probe.
    #[must_use]
    pub fn is_available(&self) -> bool {
        (self.probe)()
    }

    /// Run the factory.
    ///
    /// # Errors
    /// Whatever the factory reports, typically `UnsupportedCapability`.
    pub fn create(&self, spec: &CacheSpec<K, V>) -> CacheResult<Box<dyn Cache<K, V>>> {
        (self.factory)(spec)
    }
}

impl<K, V> Clone for ProviderEntry<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for ProviderEntry<K, V> {}

impl<K, V> fmt::Debug for ProviderEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Priority-ordered provider table.
pub struct ProviderRegistry<K, V> {
    entries: Vec<ProviderEntry<K, V>>,
}

impl<K: CacheKey, V: CacheValue> ProviderRegistry<K, V> {
    /// Every built-in provider in [`ProviderId::RESOLUTION_ORDER`].
    ///
    /// Providers whose cargo feature is disabled are listed with a probe that
    /// always fails.
    #[must_use]
    pub fn builtin() -> Self {
        Self { entries: ProviderId::RESOLUTION_ORDER.iter().map(|id| providers::builtin_entry(*id)).collect() }
    }
}

impl<K, V> ProviderRegistry<K, V> {
    /// Registry with no providers.
    #[must_use]
    pub const fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add `entry`, replacing any entry with the same id in place.
    /// New ids go to the end of the priority order.
    #[must_use]
    pub fn with_entry(mut self, entry: ProviderEntry<K, V>) -> Self {
        match self.entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Replace the probe of an already registered provider.
    #[must_use]
    pub fn with_probe(mut self, id: ProviderId, probe: AvailabilityProbe) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.probe = probe;
        }
        self
    }

    /// Entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &[ProviderEntry<K, V>] {
        &self.entries
    }

    /// Entry registered for `id`.
    #[must_use]
    pub fn entry(&self, id: ProviderId) -> Option<&ProviderEntry<K, V>> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Providers whose probe currently succeeds, in priority order.
    #[must_use]
    pub fn available(&self) -> Vec<ProviderId> {
        self.entries.iter().filter(|entry| entry.is_available()).map(ProviderEntry::id).collect()
    }

    /// Pick the provider for a request.
    ///
    /// # Errors
    /// - `ProviderUnavailable` if `requested` is unregistered or its probe
    ///   fails
    /// - `NoProviderAvailable` if nothing was requested and every probe fails
    pub fn resolve(&self, requested: Option<ProviderId>) -> CacheResult<&ProviderEntry<K, V>> {
        match requested {
            Some(id) => {
                let entry = self
                    .entry(id)
                    .filter(|entry| entry.is_available())
                    .ok_or(CacheError::ProviderUnavailable(id))?;
                debug!(provider = %id, "Using explicitly requested cache provider");
                Ok(entry)
            }
            None => {
                let entry = self
                    .entries
                    .iter()
                    .find(|entry| entry.is_available())
                    .ok_or(CacheError::NoProviderAvailable)?;
                debug!(provider = %entry.id, "Auto-resolved cache provider");
                Ok(entry)
            }
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for ProviderRegistry<K, V> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<K, V> fmt::Debug for ProviderRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|entry| entry.id)).finish()
    }
}
