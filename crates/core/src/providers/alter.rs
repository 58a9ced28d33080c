//! Read-modify-write operations shared by every adapter
//!
//! Each adapter provides one atomic primitive, [`Alter::alter`], and the
//! remapping operations of the [`Cache`](crate::Cache) contract are derived
//! from it here.

use omnicache_domain::CacheResult;

/// Outcome chosen by an alteration after seeing the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Change<V> {
    /// Leave the entry as it is.
    Keep,
    /// Store a new value.
    Store(V),
    /// Remove the entry. No effect when it is absent.
    Remove,
}

impl<V> Change<V> {
    fn from_remapped(value: Option<V>) -> Self {
        value.map_or(Self::Remove, Self::Store)
    }
}

/// Values before and after an alteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Altered<V> {
    pub(crate) previous: Option<V>,
    pub(crate) current: Option<V>,
}

impl<V: Clone> Altered<V> {
    pub(crate) fn unchanged(previous: Option<V>) -> Self {
        Self { current: previous.clone(), previous }
    }
}

/// Atomic single-key read-modify-write.
///
/// `decide` runs exactly once, with the live value for the key (expired
/// entries count as absent), while no other writer can change that key.
/// Removal listeners run after the engine lock is released: `Replaced` for a
/// stored value over a live one, `Explicit` for a removed live entry.
pub(crate) trait Alter<K, V> {
    fn alter<F>(&self, key: K, decide: F) -> CacheResult<Altered<V>>
    where
        F: FnOnce(&K, Option<&V>) -> Change<V>;
}

pub(crate) fn put<K, V, A: Alter<K, V>>(cache: &A, key: K, value: V) -> CacheResult<Option<V>> {
    Ok(cache.alter(key, |_, _| Change::Store(value))?.previous)
}

pub(crate) fn replace<K, V, A: Alter<K, V>>(cache: &A, key: K, value: V) -> CacheResult<Option<V>> {
    let altered = cache.alter(key, |_, current| match current {
        Some(_) => Change::Store(value),
        None => Change::Keep,
    })?;
    Ok(altered.previous)
}

pub(crate) fn replace_if<K, V, A>(cache: &A, key: K, expected: &V, value: V) -> CacheResult<bool>
where
    V: PartialEq,
    A: Alter<K, V>,
{
    let mut replaced = false;
    cache.alter(key, |_, current| {
        if current == Some(expected) {
            replaced = true;
            Change::Store(value)
        } else {
            Change::Keep
        }
    })?;
    Ok(replaced)
}

pub(crate) fn compute<K, V, A: Alter<K, V>>(
    cache: &A,
    key: K,
    remap: &mut dyn FnMut(&K, Option<&V>) -> Option<V>,
) -> CacheResult<Option<V>> {
    Ok(cache.alter(key, |key, current| Change::from_remapped(remap(key, current)))?.current)
}

pub(crate) fn compute_if_present<K, V, A: Alter<K, V>>(
    cache: &A,
    key: K,
    remap: &mut dyn FnMut(&K, &V) -> Option<V>,
) -> CacheResult<Option<V>> {
    let altered = cache.alter(key, |key, current| match current {
        Some(current) => Change::from_remapped(remap(key, current)),
        None => Change::Keep,
    })?;
    Ok(altered.current)
}

pub(crate) fn merge<K, V, A: Alter<K, V>>(
    cache: &A,
    key: K,
    value: V,
    remap: &mut dyn FnMut(&V, V) -> Option<V>,
) -> CacheResult<Option<V>> {
    let altered = cache.alter(key, |_, current| match current {
        Some(current) => Change::from_remapped(remap(current, value)),
        None => Change::Store(value),
    })?;
    Ok(altered.current)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// Plain map alteration used to check the derived operations.
    #[derive(Default)]
    struct MapAlter {
        map: Mutex<HashMap<&'static str, u32>>,
    }

    impl Alter<&'static str, u32> for MapAlter {
        fn alter<F>(&self, key: &'static str, decide: F) -> CacheResult<Altered<u32>>
        where
            F: FnOnce(&&'static str, Option<&u32>) -> Change<u32>,
        {
            let mut map = self.map.lock();
            let previous = map.get(key).copied();
            Ok(match decide(&key, previous.as_ref()) {
                Change::Keep => Altered::unchanged(previous),
                Change::Store(value) => {
                    map.insert(key, value);
                    Altered { previous, current: Some(value) }
                }
                Change::Remove => {
                    map.remove(key);
                    Altered { previous, current: None }
                }
            })
        }
    }

    #[test]
    fn test_compute_stores_and_removes() {
        let cache = MapAlter::default();
        assert_eq!(compute(&cache, "a", &mut |_, current| Some(current.map_or(1, |v| v + 1))).unwrap(), Some(1));
        assert_eq!(compute(&cache, "a", &mut |_, current| Some(current.map_or(1, |v| v + 1))).unwrap(), Some(2));
        assert_eq!(compute(&cache, "a", &mut |_, _| None).unwrap(), None);
        assert!(cache.map.lock().is_empty());
    }

    #[test]
    fn test_compute_if_present_skips_absent_keys() {
        let cache = MapAlter::default();
        let mut calls = 0;
        let result = compute_if_present(&cache, "a", &mut |_, v| {
            calls += 1;
            Some(v + 1)
        });
        assert_eq!(result.unwrap(), None);
        assert_eq!(calls, 0);
        assert!(cache.map.lock().is_empty());
    }

    #[test]
    fn test_merge_and_conditional_replace() {
        let cache = MapAlter::default();
        assert_eq!(merge(&cache, "a", 5, &mut |old, new| Some(old + new)).unwrap(), Some(5));
        assert_eq!(merge(&cache, "a", 5, &mut |old, new| Some(old + new)).unwrap(), Some(10));

        assert!(!replace_if(&cache, "a", &9, 0).unwrap());
        assert!(replace_if(&cache, "a", &10, 11).unwrap());
        assert!(!replace_if(&cache, "b", &0, 1).unwrap());
        assert_eq!(replace(&cache, "b", 1).unwrap(), None);
        assert_eq!(put(&cache, "a", 12).unwrap(), Some(11));

        assert_eq!(merge(&cache, "a", 0, &mut |_, _| None).unwrap(), None);
        assert!(cache.map.lock().is_empty());
    }
}
