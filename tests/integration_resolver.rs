//! Integration tests for expiry-aware cache resolution
//!
//! These tests drive the resolver against recording manager doubles and the
//! in-process providers; none of them needs a running server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cache_expiry::backends::JCacheManager;
use cache_expiry::{
    BackendAdapter, CacheExpiry, CacheManager, CacheNameDetector, CacheResolver, ExpiryAwareResolver,
    ExpiryCacheResolver, ExpiryError, NameResolverRegistry, ProviderKind, TargetClassNameResolver, TimeUnit,
};
use common::*;

fn detector() -> CacheNameDetector {
    CacheNameDetector::new(Arc::new(NameResolverRegistry::new()))
}

fn detector_with_default() -> CacheNameDetector {
    let registry = Arc::new(NameResolverRegistry::new());
    registry.set_default(Arc::new(TargetClassNameResolver::new()));
    CacheNameDetector::new(registry)
}

fn five_minutes() -> Option<CacheExpiry> {
    Some(CacheExpiry::new(5, TimeUnit::Minutes))
}

/// Without a TTL the resolver only fetches existing caches
#[test]
fn test_no_ttl_never_creates() {
    init_tracing();
    let manager = Arc::new(CountingManager::new().with_existing("users"));
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver.resolve_caches(&context(&["users"], None)).unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].name(), "users");
    assert_eq!(manager.creates(), 0);
    assert_eq!(manager.fetches(), 1);
}

/// A declared TTL creates the cache from the default configuration with the TTL overridden
#[test]
fn test_ttl_creates_from_default_configuration() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver.resolve_caches(&context(&["users"], five_minutes())).unwrap();

    assert_eq!(caches[0].time_to_live(), Some(Duration::from_secs(300)));
    let created = manager.created_configs.lock().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, "users");
    assert_eq!(created[0].1.ttl, Some(Duration::from_secs(300)));
    assert_eq!(created[0].1.label, "default");
    assert_eq!(manager.fetches(), 0);
}

/// When the provider cannot create, the existing cache is fetched instead
#[test]
fn test_create_unsupported_falls_back_to_fetch() {
    let manager = Arc::new(CountingManager::new().without_create().with_existing("users"));
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver.resolve_caches(&context(&["users"], five_minutes())).unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].time_to_live(), None);
    assert_eq!(manager.creates(), 1);
    assert_eq!(manager.fetches(), 1);
}

/// A cache that can be neither created nor fetched is a hard failure
#[test]
fn test_missing_cache_is_resolution_error() {
    let manager = Arc::new(CountingManager::new().without_create());
    let resolver = ExpiryCacheResolver::new(manager, detector());

    let err = resolver
        .resolve_caches(&context(&["missing"], five_minutes()))
        .err()
        .expect("resolution should fail");

    match &err {
        ExpiryError::Resolution { cache, operation } => {
            assert_eq!(cache, "missing");
            assert!(operation.starts_with("Cacheable[com.x.Demo.run]"), "operation was {operation}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("cannot find/create cache 'missing'"));
}

/// A miss on the second name fails the whole call
#[test]
fn test_missing_second_name_fails_call() {
    let manager = Arc::new(CountingManager::new().with_existing("a"));
    let resolver = ExpiryCacheResolver::new(manager, detector());

    let err = resolver.resolve_caches(&context(&["a", "b"], None)).err().expect("resolution should fail");
    assert!(matches!(err, ExpiryError::Resolution { ref cache, .. } if cache == "b"));
}

/// Handles come back in name order
#[test]
fn test_explicit_names_keep_order() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(manager, detector());

    let caches = resolver
        .resolve_caches(&context(&["b", "a"], five_minutes()))
        .unwrap();

    let names: Vec<&str> = caches.iter().map(|cache| cache.name()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

/// A name repeated on the operation is materialized once
#[test]
fn test_duplicate_names_resolve_once() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver
        .resolve_caches(&context(&["users", "users"], five_minutes()))
        .unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(manager.creates(), 1);
}

/// No names and no default resolver means no caching, not an error
#[test]
fn test_no_names_resolves_nothing() {
    let manager = Arc::new(CountingManager::new().dynamic());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver.resolve_caches(&context(&[], five_minutes())).unwrap();

    assert!(caches.is_empty());
    assert_eq!(manager.creates() + manager.fetches(), 0);
}

/// With detection on, the default name resolver names the cache
#[test]
fn test_default_resolver_synthesizes_name() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector_with_default());

    let caches = resolver.resolve_caches(&context(&[], five_minutes())).unwrap();
    assert_eq!(caches[0].name(), "com.x.Demo:run");

    let quiet = ExpiryCacheResolver::new(manager, detector_with_default()).detect_name_resolver(false);
    assert!(quiet.resolve_caches(&context(&[], five_minutes())).unwrap().is_empty());
}

/// Blank names are skipped silently
#[test]
fn test_blank_names_are_skipped() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let caches = resolver
        .resolve_caches(&context(&["", "  ", "users"], five_minutes()))
        .unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(manager.creates(), 1);
}

/// A call-scoped override resolver takes over the whole call
#[test]
fn test_override_resolver_wins() {
    let manager = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());
    let fixed = Arc::new(FixedResolver::named(&["elsewhere"]));

    let ctx = context(&["users"], five_minutes()).with_cache_resolver(fixed.clone());
    let caches = resolver.resolve_caches(&ctx).unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0].name(), "elsewhere");
    assert_eq!(fixed.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(manager.creates() + manager.fetches(), 0);
}

/// A resolver named as its own override resolves normally
#[test]
fn test_self_override_is_not_delegated() {
    let manager = Arc::new(CountingManager::new());
    let resolver: Arc<dyn CacheResolver> = Arc::new(ExpiryCacheResolver::new(Arc::clone(&manager), detector()));

    let ctx = context(&["users"], five_minutes()).with_cache_resolver(Arc::clone(&resolver));
    let caches = resolver.resolve_caches(&ctx).unwrap();

    assert_eq!(caches.len(), 1);
    assert_eq!(manager.creates(), 1);
}

/// A call-scoped manager replaces the bound one
#[test]
fn test_override_manager_is_used() {
    let bound = Arc::new(CountingManager::new());
    let scoped = Arc::new(CountingManager::new());
    let resolver = ExpiryCacheResolver::new(Arc::clone(&bound), detector());

    let ctx = context(&["users"], five_minutes()).with_cache_manager(scoped.clone());
    resolver.resolve_caches(&ctx).unwrap();

    assert_eq!(bound.creates(), 0);
    assert_eq!(scoped.creates(), 1);
}

/// A call-scoped manager of the wrong provider type is rejected
#[test]
fn test_wrong_manager_type_is_type_mismatch() {
    let resolver = ExpiryCacheResolver::new(Arc::new(CountingManager::new()), detector());

    let ctx = context(&["users"], five_minutes()).with_cache_manager(Arc::new(JCacheManager::new()));
    let err = resolver.resolve_caches(&ctx).err().expect("resolution should fail");

    match err {
        ExpiryError::TypeMismatch {
            expected,
            actual,
            manager,
        } => {
            assert_eq!(expected, ProviderKind::InProcess);
            assert_eq!(actual, ProviderKind::Standards);
            assert_eq!(manager, "JCache");
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// TTLs too large for a `Duration` are ignored
#[test]
fn test_overflowing_ttl_is_absent() {
    let manager = Arc::new(CountingManager::new().with_existing("users"));
    let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());

    let expiry = Some(CacheExpiry::new(i64::MAX, TimeUnit::Eras));
    resolver.resolve_caches(&context(&["users"], expiry)).unwrap();

    assert_eq!(manager.creates(), 0);
    assert_eq!(manager.fetches(), 1);
}

/// The façade over the standards-style provider creates caches with a created-expiry policy
#[test]
fn test_facade_over_standards_provider() {
    let manager = Arc::new(JCacheManager::new().with_cache_names(["known"]));
    let adapter = BackendAdapter::for_manager(ProviderKind::Standards, manager.clone(), detector(), true).unwrap();
    let facade = ExpiryAwareResolver::new(adapter);
    assert_eq!(facade.kind(), ProviderKind::Standards);

    let caches = facade.resolve_caches(&context(&["fresh"], five_minutes())).unwrap();
    assert_eq!(caches[0].time_to_live(), Some(Duration::from_secs(300)));
    assert!(manager.cache_names().contains(&"fresh".to_string()));

    let err = facade.resolve_caches(&context(&["unknown"], None)).err().expect("resolution should fail");
    assert!(matches!(err, ExpiryError::Resolution { .. }));
}

#[cfg(feature = "moka")]
mod moka {
    use super::*;
    use cache_expiry::MokaCacheManager;

    /// The latest TTL wins for in-process caches, equal TTLs reuse the cache
    #[test]
    fn test_moka_ttl_override_and_reuse() {
        let manager = Arc::new(MokaCacheManager::new());
        let adapter = BackendAdapter::for_manager(ProviderKind::InProcess, manager.clone(), detector(), true).unwrap();
        let facade = ExpiryAwareResolver::new(adapter);

        let first = facade.resolve_caches(&context(&["users"], five_minutes())).unwrap();
        let again = facade.resolve_caches(&context(&["users"], five_minutes())).unwrap();
        assert!(Arc::ptr_eq(&first[0], &again[0]));
        assert_eq!(first[0].time_to_live(), Some(Duration::from_secs(300)));

        let longer = Some(CacheExpiry::new(1, TimeUnit::Hours));
        facade.resolve_caches(&context(&["users"], longer)).unwrap();
        let current = manager.get_cache("users").unwrap();
        assert_eq!(current.time_to_live(), Some(Duration::from_secs(3600)));
    }

    /// Multi-millennia directives resolve instead of tripping the builder's TTL cap
    #[test]
    fn test_millennia_ttl_resolves() {
        let manager = Arc::new(MokaCacheManager::new());
        let adapter = BackendAdapter::for_manager(ProviderKind::InProcess, manager, detector(), true).unwrap();
        let facade = ExpiryAwareResolver::new(adapter);

        let expiry = CacheExpiry::new(2, TimeUnit::Millennia);
        let period = expiry.period().expect("representable period");
        let caches = facade.resolve_caches(&context(&["archive"], Some(expiry))).unwrap();

        assert_eq!(caches.len(), 1);
        assert_eq!(caches[0].time_to_live(), Some(period));
    }

    /// Concurrent creations with different TTLs leave exactly one of them in effect
    #[test]
    fn test_concurrent_creation_keeps_one_ttl() {
        let manager = Arc::new(MokaCacheManager::new());
        let resolver = ExpiryCacheResolver::new(Arc::clone(&manager), detector());
        let barrier = std::sync::Barrier::new(8);

        std::thread::scope(|scope| {
            for i in 0..8_i64 {
                let resolver = &resolver;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let expiry = Some(CacheExpiry::seconds(10 + i % 2));
                    resolver.resolve_caches(&context(&["shared"], expiry)).unwrap();
                });
            }
        });

        let ttl = manager.get_cache("shared").unwrap().time_to_live();
        assert!(
            ttl == Some(Duration::from_secs(10)) || ttl == Some(Duration::from_secs(11)),
            "unexpected ttl {ttl:?}"
        );
        assert_eq!(manager.cache_names(), vec!["shared".to_string()]);
    }
}
