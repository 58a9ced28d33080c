//! Adapter contract every backing engine implements.
//!
//! Callers only ever see a [`Cache`] trait object (wrapped in a
//! [`CacheHandle`](crate::CacheHandle)); the engine's native cache object
//! stays private to its adapter.
//!
//! # Example
//!
//! ```
//! use omnicache_core::{Cache, CacheResult};
//!
//! fn warm(cache: &dyn Cache<String, u32>) -> CacheResult<()> {
//!     cache.put("answer".to_string(), 42)?;
//!     assert_eq!(cache.get(&"answer".to_string())?, Some(42));
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::hash::Hash;

use omnicache_domain::{CacheResult, ProviderId, RemovalCause};

/// Bounds required of cache keys.
pub trait CacheKey: Hash + Eq + Clone + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Hash + Eq + Clone + Send + Sync + 'static {}

/// Bounds required of cache values.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// Callback invoked once for every entry that leaves a cache.
///
/// May run on a background thread. Calling back into the same cache is
/// allowed but can interleave with the operation that caused the removal.
/// A panic is caught, logged and otherwise ignored.
pub trait RemovalListener<K, V>: Send + Sync {
    /// Called after `key` was removed with `value` for `cause`.
    fn on_removal(&self, key: &K, value: &V, cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
    F: Fn(&K, &V, RemovalCause) + Send + Sync,
{
    fn on_removal(&self, key: &K, value: &V, cause: RemovalCause) {
        self(key, value, cause);
    }
}

/// Adapter lifecycle.
///
/// `Uninitialized -> Active` when construction succeeds, `Active -> Closed`
/// on [`Cache::close`]. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    /// Under construction.
    Uninitialized,
    /// Serving operations.
    Active,
    /// Torn down; every operation fails with `ClosedCache`.
    Closed,
}

/// Uniform cache operations.
///
/// All operations are safe to call concurrently. Once the cache is closed
/// every operation except [`Cache::close`] fails with
/// [`CacheError::ClosedCache`](omnicache_domain::CacheError::ClosedCache).
pub trait Cache<K, V>: Send + Sync {
    /// Backing engine.
    fn provider(&self) -> ProviderId;

    /// Current lifecycle state.
    fn state(&self) -> AdapterState;

    /// Value for `key`, if present and not expired.
    fn get(&self, key: &K) -> CacheResult<Option<V>>;

    /// Store `value`, returning the value it replaced.
    fn put(&self, key: K, value: V) -> CacheResult<Option<V>>;

    /// Store every entry of `entries`.
    fn put_all(&self, entries: HashMap<K, V>) -> CacheResult<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Remove `key`, returning its value.
    fn remove(&self, key: &K) -> CacheResult<Option<V>>;

    /// Number of live entries.
    fn size(&self) -> CacheResult<u64>;

    /// Remove every entry, notifying `Explicit` for each.
    fn clear(&self) -> CacheResult<()>;

    /// Alias of [`Cache::clear`].
    fn invalidate_all(&self) -> CacheResult<()> {
        self.clear()
    }

    /// Tear the adapter down. Repeated calls succeed without effect.
    ///
    /// When this returns no removal listener invocation is running or will
    /// start for this cache.
    fn close(&self) -> CacheResult<()>;

    /// Whether `key` is present. Does not count as an access.
    fn contains_key(&self, key: &K) -> CacheResult<bool>;

    /// Store `value` only if `key` is absent. Returns the existing value
    /// otherwise.
    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>>;

    /// Store `value` only if `key` is present, returning the replaced value.
    fn replace(&self, key: K, value: V) -> CacheResult<Option<V>>;

    /// Store `value` only if `key` currently maps to `expected`. Returns
    /// whether the value was replaced.
    fn replace_if(&self, key: K, expected: &V, value: V) -> CacheResult<bool>
    where
        V: PartialEq;

    /// Recompute the mapping for `key` from its current value.
    ///
    /// `remap` sees the current value, if any. Returning `Some` stores the
    /// result, returning `None` removes the entry. The read and the write
    /// happen atomically with respect to other writers of `key`. Returns the
    /// new value.
    ///
    /// `remap` runs while the engine holds its lock for `key`, so it must
    /// not call back into the cache.
    fn compute(&self, key: K, remap: &mut dyn FnMut(&K, Option<&V>) -> Option<V>) -> CacheResult<Option<V>>;

    /// Like [`Cache::compute`], but only when `key` is present.
    fn compute_if_present(&self, key: K, remap: &mut dyn FnMut(&K, &V) -> Option<V>) -> CacheResult<Option<V>>;

    /// Store `value` when `key` is absent, otherwise store
    /// `remap(current, value)`; `None` removes the entry. Returns the new
    /// value.
    fn merge(&self, key: K, value: V, remap: &mut dyn FnMut(&V, V) -> Option<V>) -> CacheResult<Option<V>>;

    /// Value for `key`, computing and storing it when absent.
    ///
    /// `compute` may run even if a concurrent caller stores a value first;
    /// the stored value wins and is returned.
    fn compute_if_absent(&self, key: K, compute: &mut dyn FnMut(&K) -> V) -> CacheResult<V>
    where
        V: Clone,
    {
        if let Some(value) = self.get(&key)? {
            return Ok(value);
        }
        let value = compute(&key);
        Ok(self.put_if_absent(key, value.clone())?.unwrap_or(value))
    }
}
