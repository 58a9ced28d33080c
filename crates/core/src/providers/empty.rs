//! Adapter for caches bounded to zero entries

use std::sync::Arc;

use omnicache_domain::{CacheResult, ProviderId, RemovalCause};

use super::alter::{self, Alter, Altered, Change};
use crate::cache_ports::{AdapterState, Cache, CacheKey, CacheValue};
use crate::lifecycle::Lifecycle;
use crate::notify::RemovalNotifier;
use crate::spec::CacheSpec;

/// Cache that never retains an entry.
///
/// Used whenever the size bound is zero, whatever provider was resolved.
/// Every stored value is evicted on arrival, which is reported as a `Size`
/// removal.
pub(crate) struct EmptyCache<K, V> {
    provider: ProviderId,
    lifecycle: Arc<Lifecycle>,
    notifier: RemovalNotifier<K, V>,
}

impl<K, V> EmptyCache<K, V> {
    pub(crate) fn new(provider: ProviderId, spec: &CacheSpec<K, V>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(provider));
        let notifier = RemovalNotifier::new(spec.removal_listener().cloned(), Arc::clone(&lifecycle));
        lifecycle.activate();
        Self { provider, lifecycle, notifier }
    }
}

impl<K: CacheKey, V: CacheValue> Alter<K, V> for EmptyCache<K, V> {
    fn alter<F>(&self, key: K, decide: F) -> CacheResult<Altered<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Change<V>,
    {
        self.lifecycle.ensure_active()?;
        match decide(&key, None) {
            Change::Store(value) => {
                self.notifier.notify(&key, &value, RemovalCause::Size);
                Ok(Altered { previous: None, current: Some(value) })
            }
            Change::Keep | Change::Remove => Ok(Altered { previous: None, current: None }),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for EmptyCache<K, V> {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn get(&self, _key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(None)
    }

    fn put(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        self.notifier.notify(&key, &value, RemovalCause::Size);
        Ok(None)
    }

    fn remove(&self, _key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(None)
    }

    fn size(&self) -> CacheResult<u64> {
        self.lifecycle.ensure_active()?;
        Ok(0)
    }

    fn clear(&self) -> CacheResult<()> {
        self.lifecycle.ensure_active()
    }

    fn close(&self) -> CacheResult<()> {
        self.lifecycle.close();
        Ok(())
    }

    fn contains_key(&self, _key: &K) -> CacheResult<bool> {
        self.lifecycle.ensure_active()?;
        Ok(false)
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.put(key, value)
    }

    fn replace(&self, _key: K, _value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(None)
    }

    fn replace_if(&self, key: K, expected: &V, value: V) -> CacheResult<bool>
    where
        V: PartialEq,
    {
        alter::replace_if(self, key, expected, value)
    }

    fn compute(&self, key: K, remap: &mut dyn FnMut(&K, Option<&V>) -> Option<V>) -> CacheResult<Option<V>> {
        alter::compute(self, key, remap)
    }

    fn compute_if_present(&self, key: K, remap: &mut dyn FnMut(&K, &V) -> Option<V>) -> CacheResult<Option<V>> {
        alter::compute_if_present(self, key, remap)
    }

    fn merge(&self, key: K, value: V, remap: &mut dyn FnMut(&V, V) -> Option<V>) -> CacheResult<Option<V>> {
        alter::merge(self, key, value, remap)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_every_put_is_evicted() {
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let mut builder = CacheSpec::<&'static str, u32>::builder();
        builder
            .max_size(0)
            .unwrap()
            .removal_listener(move |k: &&'static str, v: &u32, cause: RemovalCause| {
                sink.lock().push((*k, *v, cause));
            })
            .unwrap();
        let cache = EmptyCache::new(ProviderId::Lru, &builder.build().unwrap());

        assert_eq!(cache.put("a", 1).unwrap(), None);
        assert_eq!(cache.put_if_absent("b", 2).unwrap(), None);
        assert_eq!(cache.get(&"a").unwrap(), None);
        assert_eq!(cache.compute("c", &mut |_, v| Some(v.map_or(3, |v| v + 1))).unwrap(), Some(3));
        assert_eq!(cache.compute_if_present("c", &mut |_, v| Some(v + 1)).unwrap(), None);
        assert!(!cache.replace_if("c", &3, 4).unwrap());
        assert_eq!(cache.size().unwrap(), 0);
        assert_eq!(
            *removed.lock(),
            vec![("a", 1, RemovalCause::Size), ("b", 2, RemovalCause::Size), ("c", 3, RemovalCause::Size)]
        );
    }
}
