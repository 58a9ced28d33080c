//! Adapter over `moka::sync::Cache`

use std::sync::Arc;
use std::time::Duration;

use ::moka::notification::RemovalCause as MokaCause;
use ::moka::ops::compute::Op;
use ::moka::policy::EvictionPolicy;
use ::moka::sync::Cache as MokaCache;
use ::moka::Entry;
use omnicache_common::scheduler::{self, Scheduler, TaskHandle};
use omnicache_domain::{CacheError, CacheResult, ExpiryType, ProviderId, RemovalCause};
use tracing::debug;

use super::alter::{self, Alter, Altered, Change};
use crate::cache_ports::{AdapterState, Cache, CacheKey, CacheValue};
use crate::lifecycle::Lifecycle;
use crate::notify::RemovalNotifier;
use crate::spec::CacheSpec;

const PROVIDER: ProviderId = ProviderId::Moka;
const MIN_HOUSEKEEPING_PERIOD: Duration = Duration::from_millis(10);
const MAX_HOUSEKEEPING_PERIOD: Duration = Duration::from_secs(1);

/// Translate moka's removal cause.
pub(crate) fn map_cause(cause: MokaCause) -> RemovalCause {
    match cause {
        MokaCause::Explicit => RemovalCause::Explicit,
        MokaCause::Replaced => RemovalCause::Replaced,
        MokaCause::Expired => RemovalCause::Expired,
        MokaCause::Size => RemovalCause::Size,
        #[allow(unreachable_patterns)]
        _ => RemovalCause::Other,
    }
}

/// moka-backed adapter.
///
/// Size bound uses moka's LRU policy so eviction order is the documented
/// least-recently-used order. `PostWrite` maps to time-to-live and
/// `PostAccess` to time-to-idle. moka has no concurrency tuning, so the
/// high-contention hint is ignored.
///
/// moka delivers notifications from its housekeeping, which runs during
/// cache operations. When expiry and a listener are configured, a recurring
/// task on the supplied executor (or the shared scheduler) keeps expiry
/// notifications timely on idle caches.
pub(crate) struct MokaAdapter<K: CacheKey, V: CacheValue> {
    cache: MokaCache<K, V>,
    lifecycle: Arc<Lifecycle>,
    housekeeping: Option<TaskHandle>,
}

impl<K: CacheKey, V: CacheValue> MokaAdapter<K, V> {
    pub(crate) fn build(spec: &CacheSpec<K, V>) -> CacheResult<Self> {
        let lifecycle = Arc::new(Lifecycle::new(PROVIDER));
        let notifier = RemovalNotifier::new(spec.removal_listener().cloned(), Arc::clone(&lifecycle));
        let listening = notifier.is_enabled();

        let mut builder = MokaCache::builder();
        if let Some(max_size) = spec.max_size() {
            builder = builder.max_capacity(max_size).eviction_policy(EvictionPolicy::lru());
        }
        match spec.expiry() {
            Some((ExpiryType::PostWrite, ttl)) => builder = builder.time_to_live(ttl),
            Some((ExpiryType::PostAccess, tti)) => builder = builder.time_to_idle(tti),
            Some((ExpiryType::None, _)) | None => {}
        }
        if listening {
            builder = builder.eviction_listener(move |key: Arc<K>, value: V, cause| {
                notifier.notify(&key, &value, map_cause(cause));
            });
        }
        if spec.high_contention() {
            debug!(provider = %PROVIDER, "high-contention hint ignored; engine has no tuning knob");
        }
        let cache = builder.build();

        let housekeeping = match (spec.expiry(), spec.executor()) {
            (Some((_, ttl)), Some(executor)) => {
                Some(start_housekeeping(Arc::clone(executor), &cache, &lifecycle, ttl))
            }
            (Some((_, ttl)), None) if listening => {
                let shared: Arc<dyn Scheduler> =
                    scheduler::shared().map_err(|e| CacheError::Scheduler(e.to_string()))?;
                Some(start_housekeeping(shared, &cache, &lifecycle, ttl))
            }
            _ => None,
        };

        lifecycle.activate();
        Ok(Self { cache, lifecycle, housekeeping })
    }

    fn stop_housekeeping(&self) {
        if let Some(handle) = &self.housekeeping {
            handle.cancel();
        }
    }

    /// Apply moka's pending maintenance.
    ///
    /// moka delivers notifications from inside its maintenance, whose lock
    /// is not re-entrant. A listener of this cache calling back into it
    /// skips the run; the outer run is already applying the same work.
    fn run_pending_tasks(&self) {
        if !self.lifecycle.is_dispatching_here() {
            self.cache.run_pending_tasks();
        }
    }
}

impl<K: CacheKey, V: CacheValue> Alter<K, V> for MokaAdapter<K, V> {
    fn alter<F>(&self, key: K, decide: F) -> CacheResult<Altered<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Change<V>,
    {
        self.lifecycle.ensure_active()?;
        let lookup = key.clone();
        let mut altered = None;
        let _ = self.cache.entry(key).and_compute_with(|entry: Option<Entry<K, V>>| {
            let previous = entry.map(Entry::into_value);
            let (op, current) = match decide(&lookup, previous.as_ref()) {
                Change::Keep => (Op::Nop, previous.clone()),
                Change::Store(value) => (Op::Put(value.clone()), Some(value)),
                Change::Remove if previous.is_some() => (Op::Remove, None),
                Change::Remove => (Op::Nop, None),
            };
            altered = Some(Altered { previous, current });
            op
        });
        Ok(altered.unwrap_or(Altered { previous: None, current: None }))
    }
}

fn housekeeping_period(ttl: Duration) -> Duration {
    (ttl / 4).clamp(MIN_HOUSEKEEPING_PERIOD, MAX_HOUSEKEEPING_PERIOD)
}

fn start_housekeeping<K: CacheKey, V: CacheValue>(
    executor: Arc<dyn Scheduler>,
    cache: &MokaCache<K, V>,
    lifecycle: &Arc<Lifecycle>,
    ttl: Duration,
) -> TaskHandle {
    let cache = cache.clone();
    let lifecycle = Arc::downgrade(lifecycle);
    scheduler::schedule_repeating(executor, housekeeping_period(ttl), move || {
        let active = lifecycle.upgrade().is_some_and(|l| l.state() == AdapterState::Active);
        if active {
            cache.run_pending_tasks();
        }
        active
    })
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for MokaAdapter<K, V> {
    fn provider(&self) -> ProviderId {
        PROVIDER
    }

    fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    fn get(&self, key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(self.cache.get(key))
    }

    fn put(&self, key: K, value: V) -> CacheResult<Option<V>> {
        alter::put(self, key, value)
    }

    fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        Ok(self.cache.remove(key))
    }

    fn size(&self) -> CacheResult<u64> {
        self.lifecycle.ensure_active()?;
        self.run_pending_tasks();
        Ok(self.cache.entry_count())
    }

    fn clear(&self) -> CacheResult<()> {
        self.lifecycle.ensure_active()?;
        self.cache.invalidate_all();
        self.run_pending_tasks();
        Ok(())
    }

    fn close(&self) -> CacheResult<()> {
        if !self.lifecycle.close() {
            return Ok(());
        }
        self.stop_housekeeping();
        // Listener is gated off; this only releases memory.
        self.cache.invalidate_all();
        self.run_pending_tasks();
        debug!(provider = %PROVIDER, "cache closed");
        Ok(())
    }

    fn contains_key(&self, key: &K) -> CacheResult<bool> {
        self.lifecycle.ensure_active()?;
        Ok(self.cache.contains_key(key))
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        self.lifecycle.ensure_active()?;
        let entry = self.cache.entry(key).or_insert(value);
        Ok(if entry.is_fresh() { None } else { Some(entry.into_value()) })
    }

    fn replace(&self, key: K, value: V) -> CacheResult<Option<V>> {
        alter::replace(self, key, value)
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

impl<K: CacheKey, V: CacheValue> Drop for MokaAdapter<K, V> {
    fn drop(&mut self) {
        self.stop_housekeeping();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_table() {
        assert_eq!(map_cause(MokaCause::Explicit), RemovalCause::Explicit);
        assert_eq!(map_cause(MokaCause::Replaced), RemovalCause::Replaced);
        assert_eq!(map_cause(MokaCause::Expired), RemovalCause::Expired);
        assert_eq!(map_cause(MokaCause::Size), RemovalCause::Size);
    }

    #[test]
    fn test_housekeeping_period_is_clamped() {
        assert_eq!(housekeeping_period(Duration::from_millis(8)), MIN_HOUSEKEEPING_PERIOD);
        assert_eq!(housekeeping_period(Duration::from_millis(400)), Duration::from_millis(100));
        assert_eq!(housekeeping_period(Duration::from_secs(3600)), MAX_HOUSEKEEPING_PERIOD);
    }
}
