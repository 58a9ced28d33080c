//! Adapter over `dashmap::DashMap` with scheduler-driven expiry

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ::dashmap::mapref::entry::Entry;
use ::dashmap::DashMap;
use omnicache_common::scheduler::{RuntimeScheduler, Scheduler, TaskHandle};
use omnicache_domain::{CacheError, CacheResult, ExpiryType, ProviderId, RemovalCause};
use tracing::debug;

use super::alter::{self, Alter, Altered, Change};
use super::reject_size_bound;
use crate::cache_ports::{AdapterState, Cache, CacheKey, CacheValue};
use crate::lifecycle::Lifecycle;
use crate::notify::RemovalNotifier;
use crate::spec::CacheSpec;

const PROVIDER: ProviderId = ProviderId::DashMap;

/// Removal outcomes of map operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapEvent {
    /// `insert` returned a live slot for the key.
    Overwritten,
    /// `remove` or `clear` took a live slot.
    Removed,
    /// A slot was found past its deadline.
    Lapsed,
}

pub(crate) const fn map_event(event: MapEvent) -> RemovalCause {
    match event {
        MapEvent::Overwritten => RemovalCause::Replaced,
        MapEvent::Removed => RemovalCause::Explicit,
        MapEvent::Lapsed => RemovalCause::Expired,
    }
}

/// Shard count used for the high-contention hint: four times dashmap's own
/// default.
fn high_contention_shards() -> usize {
    let parallelism = std::thread::available_parallelism().map_or(4, NonZeroUsize::get);
    (parallelism * 16).next_power_of_two()
}

struct Slot<V> {
    value: V,
    // Identifies one write; timers only act on the slot they were armed for.
    stamp: u64,
    deadline: Option<Instant>,
    timer: Option<TaskHandle>,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    fn disarm(&self) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
    }
}

struct Shared<K, V> {
    map: DashMap<K, Slot<V>>,
    expiry: Option<(ExpiryType, Duration)>,
    scheduler: Option<Arc<dyn Scheduler>>,
    lifecycle: Arc<Lifecycle>,
    notifier: RemovalNotifier<K, V>,
    next_stamp: AtomicU64,
}

impl<K: CacheKey, V: CacheValue> Shared<K, V> {
    fn now(&self) -> Instant {
        self.scheduler.as_ref().map_or_else(Instant::now, |scheduler| scheduler.now())
    }

    fn ttl(&self) -> Option<Duration> {
        self.expiry.map(|(_, ttl)| ttl)
    }

    // A deadline past the representable range means the entry never lapses.
    fn deadline_from(&self, now: Instant) -> Option<Instant> {
        self.ttl().and_then(|ttl| now.checked_add(ttl))
    }

    fn resets_on_read(&self) -> bool {
        self.expiry.is_some_and(|(expiry_type, _)| expiry_type.resets_on_read())
    }

    fn fresh_slot(&self, value: V, now: Instant) -> Slot<V> {
        Slot {
            value,
            stamp: self.next_stamp.fetch_add(1, Ordering::Relaxed),
            deadline: self.deadline_from(now),
            timer: None,
        }
    }

    /// Schedule expiry of the slot written with `stamp` after `delay`.
    fn arm(self: &Arc<Self>, key: &K, stamp: u64, delay: Duration) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        let shared = Arc::downgrade(self);
        let timer_key = key.clone();
        let timer = scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.on_timer(&timer_key, stamp);
                }
            }),
        );
        match self.map.get_mut(key) {
            Some(mut slot) if slot.stamp == stamp => slot.timer = Some(timer),
            _ => timer.cancel(),
        }
    }

    fn arm_fresh(self: &Arc<Self>, key: &K, stamp: u64) {
        if let Some(ttl) = self.ttl() {
            self.arm(key, stamp, ttl);
        }
    }

    /// Timer callback: expire the slot, or re-arm if reads pushed its
    /// deadline back.
    fn on_timer(self: &Arc<Self>, key: &K, stamp: u64) {
        let now = self.now();
        let mut remaining = None;
        let removed = self.map.remove_if(key, |_, slot| {
            if slot.stamp != stamp {
                return false;
            }
            match slot.deadline {
                Some(deadline) if deadline <= now => true,
                Some(deadline) => {
                    remaining = Some(deadline - now);
                    false
                }
                None => false,
            }
        });
        if let Some((key, slot)) = removed {
            self.notifier.notify(&key, &slot.value, map_event(MapEvent::Lapsed));
        } else if let Some(delay) = remaining {
            self.arm(key, stamp, delay);
        }
    }

    /// Remove `key` if its slot is past its deadline at `now`.
    fn expire_if_lapsed(&self, key: &K, now: Instant) {
        if let Some((key, slot)) = self.map.remove_if(key, |_, slot| slot.is_expired(now)) {
            slot.disarm();
            self.notifier.notify(&key, &slot.value, map_event(MapEvent::Lapsed));
        }
    }

    /// Notify for a slot taken out of the map and return its value if it was
    /// still live.
    fn retire(&self, key: &K, slot: Slot<V>, event: MapEvent, now: Instant) -> Option<V> {
        slot.disarm();
        if slot.is_expired(now) {
            self.notifier.notify(key, &slot.value, map_event(MapEvent::Lapsed));
            None
        } else {
            self.notifier.notify(key, &slot.value, map_event(event));
            Some(slot.value)
        }
    }

    fn purge_lapsed(&self, now: Instant) {
        let lapsed: Vec<K> =
            self.map.iter().filter(|entry| entry.is_expired(now)).map(|entry| entry.key().clone()).collect();
        for key in lapsed {
            self.expire_if_lapsed(&key, now);
        }
    }
}

/// dashmap-backed adapter.
///
/// dashmap has no size bound, so a maximum size is refused. Expiry is
/// emulated: every write records a deadline and arms a timer on the
/// scheduler, reads check the deadline lazily, and `PostAccess` reads push
/// the deadline back. The caller's executor is used when supplied;
/// otherwise the adapter starts a private scheduler and stops it on close.
pub(crate) struct DashMapAdapter<K: CacheKey, V: CacheValue> {
    shared: Arc<Shared<K, V>>,
    owns_scheduler: bool,
}

impl<K: CacheKey, V: CacheValue> DashMapAdapter<K, V> {
    pub(crate) fn build(spec: &CacheSpec<K, V>) -> CacheResult<Self> {
        reject_size_bound(PROVIDER, spec)?;

        let map = if spec.high_contention() {
            DashMap::with_shard_amount(high_contention_shards())
        } else {
            DashMap::new()
        };

        let (scheduler, owns_scheduler) = match (spec.expiry(), spec.executor()) {
            (None, _) => (None, false),
            (Some(_), Some(executor)) => (Some(Arc::clone(executor)), false),
            (Some(_), None) => {
                let private = RuntimeScheduler::new("omnicache-dashmap-expiry")
                    .map_err(|e| CacheError::Scheduler(e.to_string()))?;
                (Some(Arc::new(private) as Arc<dyn Scheduler>), true)
            }
        };

        let lifecycle = Arc::new(Lifecycle::new(PROVIDER));
        let notifier = RemovalNotifier::new(spec.removal_listener().cloned(), Arc::clone(&lifecycle));
        let shared = Arc::new(Shared {
            map,
            expiry: spec.expiry(),
            scheduler,
            lifecycle: Arc::clone(&lifecycle),
            notifier,
            next_stamp: AtomicU64::new(0),
        });

        lifecycle.activate();
        Ok(Self { shared, owns_scheduler })
    }

    fn teardown(&self) {
        for entry in self.shared.map.iter() {
            entry.disarm();
        }
        self.shared.map.clear();
        if self.owns_scheduler {
            if let Some(scheduler) = &self.shared.scheduler {
                scheduler.shutdown();
            }
        }
    }
}

impl<K: CacheKey, V: CacheValue> Alter<K, V> for DashMapAdapter<K, V> {
    fn alter<F>(&self, key: K, decide: F) -> CacheResult<Altered<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Change<V>,
    {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();

        let mut armed = None;
        let (altered, retired) = match shared.map.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let live = !occupied.get().is_expired(now);
                let previous = live.then(|| occupied.get().value.clone());
                match decide(&key, previous.as_ref()) {
                    // An expired slot is dropped even when nothing is written.
                    Change::Keep if live => (Altered::unchanged(previous), None),
                    Change::Keep => (Altered::unchanged(previous), Some((occupied.remove(), MapEvent::Removed))),
                    Change::Store(value) => {
                        let slot = shared.fresh_slot(value.clone(), now);
                        armed = Some(slot.stamp);
                        let old = occupied.insert(slot);
                        (Altered { previous, current: Some(value) }, Some((old, MapEvent::Overwritten)))
                    }
                    Change::Remove => (Altered { previous, current: None }, Some((occupied.remove(), MapEvent::Removed))),
                }
            }
            Entry::Vacant(vacant) => match decide(&key, None) {
                Change::Store(value) => {
                    let slot = shared.fresh_slot(value.clone(), now);
                    armed = Some(slot.stamp);
                    vacant.insert(slot);
                    (Altered { previous: None, current: Some(value) }, None)
                }
                Change::Keep | Change::Remove => (Altered { previous: None, current: None }, None),
            },
        };
        if let Some(stamp) = armed {
            shared.arm_fresh(&key, stamp);
        }
        if let Some((old, event)) = retired {
            shared.retire(&key, old, event, now);
        }
        Ok(altered)
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for DashMapAdapter<K, V> {
    fn provider(&self) -> ProviderId {
        PROVIDER
    }

    fn state(&self) -> AdapterState {
        self.shared.lifecycle.state()
    }

    fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();

        let (hit, lapsed) = if shared.resets_on_read() {
            match shared.map.get_mut(key) {
                Some(mut slot) if !slot.is_expired(now) => {
                    slot.deadline = shared.deadline_from(now);
                    (Some(slot.value.clone()), false)
                }
                Some(_) => (None, true),
                None => (None, false),
            }
        } else {
            match shared.map.get(key) {
                Some(slot) if !slot.is_expired(now) => (Some(slot.value.clone()), false),
                Some(_) => (None, true),
                None => (None, false),
            }
        };
        if lapsed {
            shared.expire_if_lapsed(key, now);
        }
        Ok(hit)
    }

    fn put(&self, key: K, value: V) -> CacheResult<Option<V>> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        let slot = shared.fresh_slot(value, now);
        let stamp = slot.stamp;

        let previous = shared.map.insert(key.clone(), slot);
        shared.arm_fresh(&key, stamp);
        Ok(previous.and_then(|old| shared.retire(&key, old, MapEvent::Overwritten, now)))
    }

    fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        Ok(shared.map.remove(key).and_then(|(key, old)| shared.retire(&key, old, MapEvent::Removed, now)))
    }

    fn size(&self) -> CacheResult<u64> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        shared.purge_lapsed(shared.now());
        Ok(shared.map.len() as u64)
    }

    fn clear(&self) -> CacheResult<()> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        let keys: Vec<K> = shared.map.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((key, old)) = shared.map.remove(&key) {
                shared.retire(&key, old, MapEvent::Removed, now);
            }
        }
        Ok(())
    }

    fn close(&self) -> CacheResult<()> {
        if !self.shared.lifecycle.close() {
            return Ok(());
        }
        self.teardown();
        debug!(provider = %PROVIDER, owns_scheduler = self.owns_scheduler, "cache closed");
        Ok(())
    }

    fn contains_key(&self, key: &K) -> CacheResult<bool> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        Ok(shared.map.get(key).is_some_and(|slot| !slot.is_expired(now)))
    }

    fn put_if_absent(&self, key: K, value: V) -> CacheResult<Option<V>> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        let slot = shared.fresh_slot(value, now);
        let stamp = slot.stamp;

        let lapsed = match shared.map.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Ok(Some(occupied.get().value.clone()));
                }
                Some(occupied.insert(slot))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                None
            }
        };
        shared.arm_fresh(&key, stamp);
        if let Some(old) = lapsed {
            shared.retire(&key, old, MapEvent::Overwritten, now);
        }
        Ok(None)
    }

    fn replace(&self, key: K, value: V) -> CacheResult<Option<V>> {
        let shared = &self.shared;
        shared.lifecycle.ensure_active()?;
        let now = shared.now();
        let fresh = shared.fresh_slot(value, now);
        let stamp = fresh.stamp;

        let replaced = match shared.map.get_mut(&key) {
            Some(mut slot) if !slot.is_expired(now) => Some(std::mem::replace(&mut *slot, fresh)),
            _ => None,
        };
        let Some(old) = replaced else {
            shared.expire_if_lapsed(&key, now);
            return Ok(None);
        };
        shared.arm_fresh(&key, stamp);
        Ok(shared.retire(&key, old, MapEvent::Overwritten, now))
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

impl<K: CacheKey, V: CacheValue> Drop for DashMapAdapter<K, V> {
    fn drop(&mut self) {
        if self.shared.lifecycle.close() {
            self.teardown();
        }
    }
}
