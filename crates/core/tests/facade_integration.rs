//! End-to-end tests of the facade entry point: resolution, capability
//! refusal and the uniform operation set on every provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use omnicache_core::{
    create, create_with, AdapterState, CacheError, CacheHandle, CacheSettings, CacheSpec, Capability, ExpiryType,
    ProviderId, ProviderRegistry, RemovalCause, MAX_EXPIRY_TIME,
};
use parking_lot::Mutex;

type Events = Arc<Mutex<Vec<(String, u32, RemovalCause)>>>;

const fn down() -> bool {
    false
}

fn recording_cache(provider: ProviderId, max_size: Option<u64>) -> (CacheHandle<String, u32>, Events) {
    let events: Events = Arc::default();
    let sink = Arc::clone(&events);
    let cache = create(|builder| {
        builder.provider(provider)?.removal_listener(move |key: &String, value: &u32, cause: RemovalCause| {
            sink.lock().push((key.clone(), *value, cause));
        })?;
        if let Some(max_size) = max_size {
            builder.max_size(max_size)?;
        }
        Ok(())
    })
    .unwrap();
    (cache, events)
}

#[test]
fn test_default_resolution_picks_highest_priority() {
    let cache = create::<String, u32, _>(|_| Ok(())).unwrap();
    assert_eq!(cache.provider(), ProviderId::Moka);
    assert_eq!(cache.state(), AdapterState::Active);
}

#[test]
fn test_resolution_skips_unavailable_providers() {
    let registry = ProviderRegistry::<String, u32>::builtin().with_probe(ProviderId::Moka, down);
    let cache = create_with(&registry, |_| Ok(())).unwrap();
    assert_eq!(cache.provider(), ProviderId::Lru);

    let registry = registry.with_probe(ProviderId::Lru, down);
    let cache = create_with(&registry, |_| Ok(())).unwrap();
    assert_eq!(cache.provider(), ProviderId::DashMap);
}

#[test]
fn test_explicit_unavailable_provider_fails() {
    let registry = ProviderRegistry::<String, u32>::builtin().with_probe(ProviderId::Lru, down);
    let err = create_with(&registry, |builder| {
        builder.provider(ProviderId::Lru)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err, CacheError::ProviderUnavailable(ProviderId::Lru));
    assert!(err.is_construction_error());
}

#[test]
fn test_no_provider_available() {
    let registry = ProviderRegistry::<String, u32>::builtin()
        .with_probe(ProviderId::Moka, down)
        .with_probe(ProviderId::Lru, down)
        .with_probe(ProviderId::DashMap, down);
    let err = create_with(&registry, |_| Ok(())).unwrap_err();
    assert_eq!(err, CacheError::NoProviderAvailable);
}

#[test]
fn test_lru_refuses_expiry() {
    for (expiry_type, capability) in [
        (ExpiryType::PostWrite, Capability::PostWriteExpiry),
        (ExpiryType::PostAccess, Capability::PostAccessExpiry),
    ] {
        let err = create::<String, u32, _>(|builder| {
            builder.provider(ProviderId::Lru)?.expiry_type(expiry_type)?.expiry_time(Duration::from_secs(1))?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err, CacheError::UnsupportedCapability { provider: ProviderId::Lru, capability });
    }
}

#[test]
fn test_dashmap_refuses_size_bound() {
    let err = create::<String, u32, _>(|builder| {
        builder.provider(ProviderId::DashMap)?.max_size(10)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(
        err,
        CacheError::UnsupportedCapability { provider: ProviderId::DashMap, capability: Capability::SizeBound }
    );
}

#[test]
fn test_invalid_specification_aborts_creation() {
    let err = create::<String, u32, _>(|builder| {
        builder.expiry_type(ExpiryType::PostWrite)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CacheError::InvalidSpecification(_)));

    let err = create::<String, u32, _>(|builder| {
        builder.expiry_time(Duration::from_secs(5))?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CacheError::InvalidSpecification(_)));
}

#[test]
fn test_expiry_time_beyond_engine_range_is_refused() {
    const YEAR: u64 = 365 * 24 * 60 * 60;
    for provider in [ProviderId::Moka, ProviderId::DashMap] {
        for expiry_time in [Duration::MAX, Duration::from_secs(1001 * YEAR), MAX_EXPIRY_TIME + Duration::from_secs(1)] {
            let err = create::<String, u32, _>(|builder| {
                builder.provider(provider)?.expiry_type(ExpiryType::PostWrite)?.expiry_time(expiry_time)?;
                Ok(())
            })
            .unwrap_err();
            assert!(matches!(err, CacheError::InvalidSpecification(_)), "{provider}: {err:?}");
        }

        for expiry_type in [ExpiryType::PostWrite, ExpiryType::PostAccess] {
            let cache = create::<String, u32, _>(|builder| {
                builder.provider(provider)?.expiry_type(expiry_type)?.expiry_time(MAX_EXPIRY_TIME)?;
                Ok(())
            })
            .unwrap();
            cache.put("a".to_string(), 1).unwrap();
            assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1), "{provider}");
            assert_eq!(cache.size().unwrap(), 1, "{provider}");
            cache.close().unwrap();
        }
    }
}

#[test]
fn test_size_bound_evicts_least_recently_used() {
    for provider in [ProviderId::Moka, ProviderId::Lru] {
        let (cache, events) = recording_cache(provider, Some(2));

        cache.put("a".to_string(), 1).unwrap();
        cache.put("b".to_string(), 2).unwrap();
        cache.put("c".to_string(), 3).unwrap();

        assert_eq!(cache.size().unwrap(), 2, "{provider}");
        assert_eq!(cache.get(&"c".to_string()).unwrap(), Some(3), "{provider}");

        let events = events.lock().clone();
        let evicted: Vec<_> = events.iter().filter(|(_, _, cause)| *cause == RemovalCause::Size).collect();
        assert_eq!(evicted.len(), 1, "{provider}: {events:?}");
        assert!(evicted[0].0 == "a" || evicted[0].0 == "b", "{provider}: {events:?}");
        assert_eq!(cache.get(&evicted[0].0).unwrap(), None, "{provider}");
    }
}

#[test]
fn test_zero_size_bound_never_retains() {
    for provider in ProviderId::RESOLUTION_ORDER {
        let (cache, events) = recording_cache(provider, Some(0));
        assert_eq!(cache.provider(), provider);

        assert_eq!(cache.put("a".to_string(), 1).unwrap(), None);
        assert_eq!(cache.get(&"a".to_string()).unwrap(), None);
        assert_eq!(cache.size().unwrap(), 0);
        assert_eq!(events.lock().as_slice(), &[("a".to_string(), 1, RemovalCause::Size)]);
    }
}

#[test]
fn test_zero_size_bound_still_resolves_explicit_provider() {
    let registry = ProviderRegistry::<String, u32>::builtin().with_probe(ProviderId::Moka, down);
    let err = create_with(&registry, |builder| {
        builder.provider(ProviderId::Moka)?.max_size(0)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err, CacheError::ProviderUnavailable(ProviderId::Moka));
}

#[test]
fn test_uniform_operations_on_every_provider() {
    for provider in ProviderId::RESOLUTION_ORDER {
        let (cache, events) = recording_cache(provider, None);
        let key = |k: &str| k.to_string();

        assert_eq!(cache.put(key("a"), 1).unwrap(), None, "{provider}");
        assert_eq!(cache.put(key("a"), 2).unwrap(), Some(1), "{provider}");
        assert!(cache.contains_key(&key("a")).unwrap());
        assert!(!cache.contains_key(&key("z")).unwrap());

        assert_eq!(cache.put_if_absent(key("a"), 9).unwrap(), Some(2), "{provider}");
        assert_eq!(cache.put_if_absent(key("b"), 3).unwrap(), None, "{provider}");
        assert_eq!(cache.replace(key("z"), 4).unwrap(), None, "{provider}");
        assert!(!cache.contains_key(&key("z")).unwrap());
        assert_eq!(cache.replace(key("b"), 5).unwrap(), Some(3), "{provider}");

        let mut calls = 0;
        let computed = cache
            .compute_if_absent(key("c"), &mut |_| {
                calls += 1;
                7
            })
            .unwrap();
        assert_eq!(computed, 7);
        let cached = cache
            .compute_if_absent(key("c"), &mut |_| {
                calls += 1;
                8
            })
            .unwrap();
        assert_eq!(cached, 7);
        assert_eq!(calls, 1, "{provider}");

        assert_eq!(cache.get_or_default(&key("missing"), 42).unwrap(), 42);
        assert_eq!(cache.get_or_default(&key("b"), 42).unwrap(), 5);

        cache.put_all(HashMap::from([(key("d"), 10), (key("e"), 11)])).unwrap();
        assert_eq!(cache.size().unwrap(), 5, "{provider}");

        assert_eq!(cache.remove(&key("d")).unwrap(), Some(10));
        assert_eq!(cache.remove(&key("d")).unwrap(), None);
        cache.invalidate_all().unwrap();
        assert_eq!(cache.size().unwrap(), 0, "{provider}");

        let recorded = std::mem::take(&mut *events.lock());
        let count = |cause| recorded.iter().filter(|(_, _, c)| *c == cause).count();
        assert_eq!(count(RemovalCause::Replaced), 2, "{provider}: {recorded:?}");
        // remove(d) plus a, b, c, e from invalidate_all
        assert_eq!(count(RemovalCause::Explicit), 5, "{provider}: {recorded:?}");

        let mut bump = |_: &String, current: Option<&u32>| Some(current.map_or(1, |v| v + 1));
        assert_eq!(cache.compute(key("k"), &mut bump).unwrap(), Some(1), "{provider}");
        assert_eq!(cache.compute(key("k"), &mut bump).unwrap(), Some(2), "{provider}");
        assert_eq!(cache.compute_if_present(key("absent"), &mut |_, v| Some(v + 1)).unwrap(), None);
        assert!(!cache.contains_key(&key("absent")).unwrap(), "{provider}");
        assert_eq!(cache.compute_if_present(key("k"), &mut |_, v| Some(v * 10)).unwrap(), Some(20));

        let mut sum = |old: &u32, new: u32| Some(old + new);
        assert_eq!(cache.merge(key("m"), 5, &mut sum).unwrap(), Some(5), "{provider}");
        assert_eq!(cache.merge(key("m"), 5, &mut sum).unwrap(), Some(10), "{provider}");
        assert!(!cache.replace_if(key("m"), &9, 0).unwrap(), "{provider}");
        assert!(cache.replace_if(key("m"), &10, 11).unwrap(), "{provider}");
        assert!(!cache.replace_if(key("absent"), &11, 12).unwrap(), "{provider}");
        assert_eq!(cache.get(&key("m")).unwrap(), Some(11), "{provider}");

        assert_eq!(cache.compute(key("k"), &mut |_, _| None).unwrap(), None, "{provider}");
        assert_eq!(cache.merge(key("m"), 1, &mut |_, _| None).unwrap(), None, "{provider}");
        assert_eq!(cache.compute(key("never"), &mut |_, _| None).unwrap(), None, "{provider}");
        assert_eq!(cache.size().unwrap(), 0, "{provider}");

        let recorded = events.lock().clone();
        let count = |cause| recorded.iter().filter(|(_, _, c)| *c == cause).count();
        // k twice, m by merge and by replace_if
        assert_eq!(count(RemovalCause::Replaced), 4, "{provider}: {recorded:?}");
        // k and m removed by their remaps
        assert_eq!(count(RemovalCause::Explicit), 2, "{provider}: {recorded:?}");
        assert_eq!(recorded.len(), 6, "{provider}: {recorded:?}");

        cache.close().unwrap();
    }
}

#[test]
fn test_closed_cache_rejects_every_operation() {
    for provider in ProviderId::RESOLUTION_ORDER {
        let cache = create::<String, u32, _>(|builder| {
            builder.provider(provider)?;
            Ok(())
        })
        .unwrap();
        cache.put("a".to_string(), 1).unwrap();
        cache.close().unwrap();
        assert_eq!(cache.state(), AdapterState::Closed);

        let closed = CacheError::ClosedCache(provider);
        let key = "a".to_string();
        assert_eq!(cache.get(&key).unwrap_err(), closed);
        assert_eq!(cache.put(key.clone(), 2).unwrap_err(), closed);
        assert_eq!(cache.remove(&key).unwrap_err(), closed);
        assert_eq!(cache.size().unwrap_err(), closed);
        assert_eq!(cache.clear().unwrap_err(), closed);
        assert_eq!(cache.contains_key(&key).unwrap_err(), closed);
        assert_eq!(cache.put_if_absent(key.clone(), 2).unwrap_err(), closed);
        assert_eq!(cache.replace(key.clone(), 2).unwrap_err(), closed);
        assert_eq!(cache.compute_if_absent(key.clone(), &mut |_| 2).unwrap_err(), closed);
        assert_eq!(cache.compute(key.clone(), &mut |_, _| Some(2)).unwrap_err(), closed);
        assert_eq!(cache.compute_if_present(key.clone(), &mut |_, _| Some(2)).unwrap_err(), closed);
        assert_eq!(cache.merge(key.clone(), 2, &mut |_, v| Some(v)).unwrap_err(), closed);
        assert_eq!(cache.replace_if(key.clone(), &1, 2).unwrap_err(), closed);
        assert!(cache.get_or_default(&key, 0).unwrap_err().is_closed());

        // Idempotent
        cache.close().unwrap();
        assert_eq!(cache.state(), AdapterState::Closed);
    }
}

#[test]
fn test_clones_share_one_adapter() {
    let cache = create::<String, u32, _>(|builder| {
        builder.provider(ProviderId::Lru)?;
        Ok(())
    })
    .unwrap();
    let clone = cache.clone();
    cache.put("a".to_string(), 1).unwrap();
    assert_eq!(clone.get(&"a".to_string()).unwrap(), Some(1));

    clone.close().unwrap();
    assert_eq!(cache.state(), AdapterState::Closed);
}

#[test]
fn test_settings_drive_creation() {
    let settings = CacheSettings::from_toml_str(
        r#"
        provider = "dashmap"
        expiry_type = "post_access"
        expiry_time_ms = 60000
        high_contention = true
        "#,
    )
    .unwrap();

    let cache = create::<String, u32, _>(|builder| {
        builder.apply_settings(&settings)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(cache.provider(), ProviderId::DashMap);
    cache.put("a".to_string(), 1).unwrap();
    assert_eq!(cache.get(&"a".to_string()).unwrap(), Some(1));
    cache.close().unwrap();
}

#[test]
fn test_settings_cannot_bypass_capability_checks() {
    let settings = CacheSettings::from_json_str(r#"{"provider": "lru", "expiry_type": "post_write", "expiry_time_ms": 10}"#)
        .unwrap();
    let err = create::<String, u32, _>(|builder| {
        builder.apply_settings(&settings)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, CacheError::UnsupportedCapability { provider: ProviderId::Lru, .. }));
}

#[test]
fn test_spec_can_be_reused_across_registries() {
    let spec = CacheSpec::<String, u32>::builder().max_size(4).unwrap().build().unwrap();
    let registry = ProviderRegistry::builtin();
    let first = omnicache_core::create_from_spec(&registry, &spec).unwrap();
    let second = omnicache_core::create_from_spec(&registry.with_probe(ProviderId::Moka, down), &spec).unwrap();
    assert_eq!(first.provider(), ProviderId::Moka);
    assert_eq!(second.provider(), ProviderId::Lru);
}
