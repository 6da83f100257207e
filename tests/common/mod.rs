//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Tracing setup
//! - Test data generators
//! - Recording doubles for the host, the interceptor and a cache manager

#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use cache_expiry::{
    Cache, CacheExpiry, CacheHandle, CacheInterceptor, CacheManager, CacheOperation, CacheResolver,
    ComponentHost, ExpiryAwareResolver, ExpiryCacheManager, ExpiryConfiguration, InvocationContext,
    MethodDescriptor, ProviderKind, TargetType, async_trait,
};
use parking_lot::Mutex;

/// Install a test subscriber once, honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Invocation of `com.x.Demo.run` with `names` and an optional expiry
pub fn context(names: &[&str], expiry: Option<CacheExpiry>) -> InvocationContext {
    let mut method = MethodDescriptor::new("run");
    if let Some(expiry) = expiry {
        method = method.with_expiry(expiry);
    }
    InvocationContext::new(
        TargetType::new("com.x.Demo"),
        method,
        CacheOperation::cacheable().with_cache_names(names.iter().copied()),
    )
}

/// Configuration of [`CountingManager`] caches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountingConfig {
    pub ttl: Option<Duration>,
    pub label: String,
}

impl ExpiryConfiguration for CountingConfig {
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Cache that stores nothing and only remembers how it was built
pub struct StubCache {
    pub name: String,
    pub config: CountingConfig,
}

#[async_trait]
impl Cache for StubCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.config.ttl
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: Bytes) -> Result<()> {
        Ok(())
    }

    async fn evict(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Manager double counting creations and lookups
pub struct CountingManager {
    pub caches: Mutex<HashMap<String, CacheHandle>>,
    pub default_config: CountingConfig,
    /// Whether `create_cache` returns a cache at all
    pub can_create: bool,
    /// Whether `get_cache` creates unknown caches
    pub dynamic: bool,
    pub creates: AtomicUsize,
    pub fetches: AtomicUsize,
    pub created_configs: Mutex<Vec<(String, CountingConfig)>>,
}

impl CountingManager {
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            default_config: CountingConfig {
                ttl: None,
                label: "default".to_string(),
            },
            can_create: true,
            dynamic: false,
            creates: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            created_configs: Mutex::new(Vec::new()),
        }
    }

    pub fn without_create(mut self) -> Self {
        self.can_create = false;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Pre-register a cache built from the default configuration
    pub fn with_existing(self, name: &str) -> Self {
        let cache: CacheHandle = Arc::new(StubCache {
            name: name.to_string(),
            config: self.default_config.clone(),
        });
        self.caches.lock().insert(name.to_string(), cache);
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CacheManager for CountingManager {
    fn kind(&self) -> ProviderKind {
        ProviderKind::InProcess
    }

    fn get_cache(&self, name: &str) -> Option<CacheHandle> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut caches = self.caches.lock();
        if let Some(cache) = caches.get(name) {
            return Some(Arc::clone(cache));
        }
        if !self.dynamic {
            return None;
        }
        let cache: CacheHandle = Arc::new(StubCache {
            name: name.to_string(),
            config: self.default_config.clone(),
        });
        caches.insert(name.to_string(), Arc::clone(&cache));
        Some(cache)
    }

    fn cache_names(&self) -> Vec<String> {
        self.caches.lock().keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &'static str {
        "Counting"
    }
}

impl ExpiryCacheManager for CountingManager {
    const KIND: ProviderKind = ProviderKind::InProcess;
    type Config = CountingConfig;

    fn default_configuration(&self) -> CountingConfig {
        self.default_config.clone()
    }

    fn create_cache(&self, name: &str, config: CountingConfig) -> Option<CacheHandle> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if !self.can_create {
            return None;
        }
        self.created_configs.lock().push((name.to_string(), config.clone()));
        let cache: CacheHandle = Arc::new(StubCache {
            name: name.to_string(),
            config,
        });
        self.caches.lock().insert(name.to_string(), Arc::clone(&cache));
        Some(cache)
    }
}

/// Resolver returning a fixed set of caches, counting its calls
pub struct FixedResolver {
    pub caches: Vec<CacheHandle>,
    pub calls: AtomicUsize,
}

impl FixedResolver {
    pub fn named(names: &[&str]) -> Self {
        Self {
            caches: names
                .iter()
                .map(|name| {
                    Arc::new(StubCache {
                        name: (*name).to_string(),
                        config: CountingConfig::default(),
                    }) as CacheHandle
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl CacheResolver for FixedResolver {
    fn resolve_caches(&self, _context: &InvocationContext) -> cache_expiry::ExpiryResult<Vec<CacheHandle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.caches.clone())
    }
}

/// Host double answering manager lookups from a fixed table
pub struct RecordingHost {
    pub managers: HashMap<String, ProviderKind>,
    pub accept_registration: bool,
    pub registrations: AtomicUsize,
    pub registered: Mutex<Vec<(String, Arc<ExpiryAwareResolver>)>>,
}

impl RecordingHost {
    pub fn new(managers: &[(&str, ProviderKind)]) -> Self {
        Self {
            managers: managers
                .iter()
                .map(|(name, kind)| ((*name).to_string(), *kind))
                .collect(),
            accept_registration: true,
            registrations: AtomicUsize::new(0),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl ComponentHost for RecordingHost {
    fn manager_kind(&self, name: &str) -> Option<ProviderKind> {
        self.managers.get(name).copied()
    }

    fn register_resolver(&self, name: &str, resolver: Arc<ExpiryAwareResolver>) -> bool {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.registered.lock().push((name.to_string(), resolver));
        self.accept_registration
    }
}

/// Interceptor double recording injected resolvers
#[derive(Default)]
pub struct RecordingInterceptor {
    pub injections: AtomicUsize,
    pub resolver: Mutex<Option<Arc<dyn CacheResolver>>>,
}

impl RecordingInterceptor {
    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }
}

impl CacheInterceptor for RecordingInterceptor {
    fn set_cache_resolver(&self, resolver: Arc<dyn CacheResolver>) {
        self.injections.fetch_add(1, Ordering::SeqCst);
        *self.resolver.lock() = Some(resolver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }
}
