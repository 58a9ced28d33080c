//! Adapter over `lru::LruCache`

use std::num::NonZeroUsize;
use std::sync::Arc;

use ::lru::LruCache;
use omnicache_domain::{CacheError, CacheResult, ProviderId, RemovalCause};
use parking_lot::Mutex;
use tracing::debug;

use super::alter::{self, Alter, Altered, Change};
use super::reject_expiry;
use crate::cache_ports::{AdapterState, Cache, CacheKey, CacheValue};
use crate::lifecycle::Lifecycle;
use crate::notify::RemovalNotifier;
use crate::spec::CacheSpec;

const PROVIDER: ProviderId = ProviderId::Lru;

/// Removal outcomes of `LruCache` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LruEvent {
    /// `push` returned the old value of the same key.
    Overwritten,
    /// `push` returned the least recently used entry of another key.
    Displaced,
    /// `pop` removed the key.
    Popped,
    /// `pop_lru` drained the entry during `clear`.
    Drained,
}

pub(crate) const fn map_event(event: LruEvent) -> RemovalCause {
    match event {
        LruEvent::Overwritten => RemovalCause::Replaced,
        LruEvent::Displaced => RemovalCause::Size,
        LruEvent::Popped | LruEvent::Drained => RemovalCause::Explicit,
    }
}

/// lru-backed adapter.
///
/// The engine is not thread-safe, so it sits behind one mutex. Listeners run
/// after the lock is released. The engine has no expiry, so any expiry
/// request is refused at construction.
pub(crate) struct LruAdapter<K: CacheKey, V: CacheValue> {
    inner: Mutex<LruCache<K, V>>,
    lifecycle: Arc<Lifecycle>,
    notifier: RemovalNotifier<K, V>,
}

impl<K: CacheKey, V: CacheValue> LruAdapter<K, V> {
    pub(crate) fn build(spec: &CacheSpec<K, V>) -> CacheResult<Self> {
        reject_expiry(PROVIDER, spec)?;

        let inner = match spec.max_size() {
            Some(max_size) => {
                let capacity = usize::try_from(max_size).ok().and_then(NonZeroUsize::new).ok_or_else(|| {
                    CacheError::InvalidSpecification(format!(
                        "maximum size {max_size} is out of range for the lru provider"
                    ))
                })?;
                LruCache::new(capacity)
            }
            None => LruCache::unbounded(),
        };
        if spec.high_contention() {
            debug!(provider = %PROVIDER, "high-contention hint ignored; engine has no tuning knob");
        }

        let lifecycle = Arc::new(Lifecycle::new(PROVIDER));
        let notifier = RemovalNotifier::new(spec.removal_listener().cloned(), Arc::clone(&lifecycle));
        lifecycle.activate();
        Ok(Self { inner: Mutex::new(inner), lifecycle, notifier })
    }

    /// Report what `push` handed back and return the replaced value, if any.
    fn settle_push(&self, key: &K, displaced: Option<(K, V)>) -> Option<V> {
        match displaced {
            Some((old_key, old_value)) if &old_key == key => {
                self.notifier.notify(&old_key, &old_value, map_event(LruEvent::Overwritten));
                Some(old_value)
            }
            Some((old_key, old_value)) => {
                self.notifier.notify(&old_key, &old_value, map_event(LruEvent::Displaced));
                None
            }
            None => None,
        }
    }
}

impl<K: CacheKey, V: CacheValue> Alter<K, V> for LruAdapter<K, V> {
    fn alter<F>(&self, key: K, decide: F) -> CacheResult<Altered<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Change<V>,
    {
        self.lifecycle.ensure_active()?;
        let (altered, displaced, popped) = {
            let mut inner = self.inner.lock();
            let previous = inner.get(&key).cloned();
            match decide(&key, previous.as_ref()) {
                Change::Keep => (Altered::unchanged(previous), None, None),
                Change::Store(value) => {
                    let displaced = inner.push(key.clone(), value.clone());
                    (Altered { previous, current: Some(value) }, displaced, None)
                }
                Change::Remove => {
                    let popped = inner.pop(&key);
                    (Altered { previous, current: None }, None, popped)
                }
            }
        };
        self.settle_push(&key, displaced);
        if let Some(value) = &popped {
            self.notifier.notify(&key, value, map_event(LruEvent::Popped));
        }
        Ok(altered)
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for LruAdapter<K, V> {
    fn provider(&self) -> ProviderId {
        PROVIDER
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn get(&self, key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(self.inner.lock().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        let displaced = self.inner.lock().push(key.clone(), value);
        Ok(self.settle_push(&key, displaced))
    }

    fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        let removed = self.inner.lock().pop(key);
        if let Some(value) = &removed {
            self.notifier.notify(key, value, map_event(LruEvent::Popped));
        }
        Ok(removed)
    }

    fn size(&self) -> CacheResult<u64> {
        self.lifecycle.ensure_active()?;
        Ok(self.inner.lock().len() as u64)
    }

    fn clear(&self) -> CacheResult<()> {
        self.lifecycle.ensure_active()?;
        let drained: Vec<(K, V)> = {
            let mut inner = self.inner.lock();
            std::iter::from_fn(|| inner.pop_lru()).collect()
        };
        for (key, value) in &drained {
            self.notifier.notify(key, value, map_event(LruEvent::Drained));
        }
        Ok(())
    }

    fn close(&self) -> CacheResult<()> {
        if !self.lifecycle.close() {
            return Ok(());
        }
        self.inner.lock().clear();
        debug!(provider = %PROVIDER, "cache closed");
        Ok(())
    }

    fn contains_key(&self, key: &K) -> CacheResult<bool> {
        self.lifecycle.ensure_active()?;
        Ok(self.inner.lock().contains(key))
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        let displaced = {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.get(&key) {
                return Ok(Some(existing.clone()));
            }
            inner.push(key.clone(), value)
        };
        self.settle_push(&key, displaced);
        Ok(None)
    }

    fn replace(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        let displaced = {
            let mut inner = self.inner.lock();
            if !inner.contains(&key) {
                return Ok(None);
            }
            inner.push(key.clone(), value)
        };
        Ok(self.settle_push(&key, displaced))
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
    use super::*;

    #[test]
    fn test_event_table() {
        assert_eq!(map_event(LruEvent::Overwritten), RemovalCause::Replaced);
        assert_eq!(map_event(LruEvent::Displaced), RemovalCause::Size);
        assert_eq!(map_event(LruEvent::Popped), RemovalCause::Explicit);
        assert_eq!(map_event(LruEvent::Drained), RemovalCause::Explicit);
    }

    #[test]
    fn test_clear_drains_in_lru_order() {
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let mut builder = CacheSpec::<u32, u32>::builder();
        builder
            .removal_listener(move |k: &u32, _: &u32, cause: RemovalCause| sink.lock().push((*k, cause)))
            .unwrap();
        let adapter = LruAdapter::build(&builder.build().unwrap()).unwrap();

        adapter.put(1, 10).unwrap();
        adapter.put(2, 20).unwrap();
        adapter.get(&1).unwrap();
        adapter.clear().unwrap();

        assert_eq!(*removed.lock(), vec![(2, RemovalCause::Explicit), (1, RemovalCause::Explicit)]);
        assert_eq!(adapter.size().unwrap(), 0);
    }

    #[test]
    fn test_compute_reports_replacement_and_removal() {
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let mut builder = CacheSpec::<u32, u32>::builder();
        builder
            .max_size(2)
            .unwrap()
            .removal_listener(move |k: &u32, v: &u32, cause: RemovalCause| sink.lock().push((*k, *v, cause)))
            .unwrap();
        let adapter = LruAdapter::build(&builder.build().unwrap()).unwrap();

        assert_eq!(adapter.compute(1, &mut |_, v| Some(v.map_or(10, |v| v + 1))).unwrap(), Some(10));
        assert_eq!(adapter.compute(1, &mut |_, v| Some(v.map_or(10, |v| v + 1))).unwrap(), Some(11));
        assert_eq!(adapter.merge(2, 20, &mut |old, new| Some(old + new)).unwrap(), Some(20));
        assert_eq!(adapter.compute_if_present(1, &mut |_, _| None).unwrap(), None);
        assert_eq!(adapter.compute(3, &mut |_, _| Some(30)).unwrap(), Some(30));
        assert_eq!(adapter.compute(4, &mut |_, _| Some(40)).unwrap(), Some(40));

        assert_eq!(
            *removed.lock(),
            vec![(1, 10, RemovalCause::Replaced), (1, 11, RemovalCause::Explicit), (2, 20, RemovalCause::Size)]
        );
        assert_eq!(adapter.size().unwrap(), 2);
    }
}
