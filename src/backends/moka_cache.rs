//! Moka Cache - In-Process Cache Provider
//!
//! Named in-memory caches backed by Moka, owned by a [`MokaCacheManager`].
//! Entry expiry is a property of each cache's builder configuration, so a
//! TTL override produces a new cache bound to the same name.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use moka::future::Cache as MokaStore;
use tracing::{debug, info};

use super::create_or_replace;
use crate::traits::{Cache, CacheHandle, CacheManager, ExpiryCacheManager, ExpiryConfiguration, ProviderKind};

/// Longest TTL / TTI Moka's builder accepts (1000 years)
pub const MAX_EXPIRY: Duration = Duration::from_secs(1000 * 365 * 24 * 3600);

/// Builder configuration for a Moka cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MokaCacheConfig {
    /// Max capacity of the cache
    pub max_capacity: u64,
    /// Time to live for cache entries, measured from write
    pub time_to_live: Option<Duration>,
    /// Time to idle for cache entries
    pub time_to_idle: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 2000,
            time_to_live: None,
            time_to_idle: None,
        }
    }
}

impl ExpiryConfiguration for MokaCacheConfig {
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

/// Named Moka in-memory cache
///
/// Provides:
/// - Fast in-memory access
/// - Automatic eviction once `max_capacity` is reached
/// - Cache-wide TTL / TTI from its configuration
/// - Statistics tracking
pub struct MokaCache {
    name: String,
    config: MokaCacheConfig,
    /// Moka cache instance
    cache: MokaStore<String, Bytes>,
    /// Hit counter
    hits: AtomicU64,
    /// Miss counter
    misses: AtomicU64,
    /// Set counter
    sets: AtomicU64,
}

impl MokaCache {
    /// Create a new named Moka cache
    pub fn new(name: impl Into<String>, config: MokaCacheConfig) -> Self {
        let name = name.into();
        let mut builder = MokaStore::builder().max_capacity(config.max_capacity);
        // Longer periods are clamped; the builder panics beyond its cap
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl.min(MAX_EXPIRY));
        }
        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti.min(MAX_EXPIRY));
        }

        debug!(cache = %name, capacity = config.max_capacity, ttl = ?config.time_to_live, "[Moka] Cache built");

        Self {
            name,
            config,
            cache: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MokaCacheConfig {
        &self.config
    }

    /// Snapshot of this cache's counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            size: self.cache.entry_count(),
        }
    }
}

#[async_trait]
impl Cache for MokaCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.config.time_to_live
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        if let Some(value) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(Some(value))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.cache.insert(key.to_string(), value).await;
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(cache = %self.name, key = %key, "[Moka] Cached key");
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub size: u64,
}

/// Manager owning named Moka caches
///
/// A dynamic manager (the default) creates caches with the default
/// configuration on first lookup; a static one only knows the names it was
/// built with plus those created through [`ExpiryCacheManager::create_cache`].
pub struct MokaCacheManager {
    caches: DashMap<String, Arc<MokaCache>>,
    default_config: MokaCacheConfig,
    dynamic: bool,
}

impl MokaCacheManager {
    /// Dynamic manager with the default configuration
    pub fn new() -> Self {
        Self::with_config(MokaCacheConfig::default())
    }

    /// Dynamic manager whose caches derive from `config`
    pub fn with_config(config: MokaCacheConfig) -> Self {
        info!(capacity = config.max_capacity, ttl = ?config.time_to_live, "Initializing Moka cache manager");
        Self {
            caches: DashMap::new(),
            default_config: config,
            dynamic: true,
        }
    }

    /// Static manager holding exactly `names`
    #[must_use]
    pub fn with_cache_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            let cache = Arc::new(MokaCache::new(name.clone(), self.default_config));
            self.caches.insert(name, cache);
        }
        Self { dynamic: false, ..self }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Typed lookup, without dynamic creation
    pub fn moka_cache(&self, name: &str) -> Option<Arc<MokaCache>> {
        self.caches.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for MokaCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager for MokaCacheManager {
    fn kind(&self) -> ProviderKind {
        ProviderKind::InProcess
    }

    fn get_cache(&self, name: &str) -> Option<CacheHandle> {
        if let Some(cache) = self.moka_cache(name) {
            return Some(cache);
        }
        if !self.dynamic {
            return None;
        }
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MokaCache::new(name, self.default_config)))
            .clone();
        Some(cache)
    }

    fn cache_names(&self) -> Vec<String> {
        self.caches.iter().map(|entry| entry.key().clone()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &'static str {
        "Moka"
    }
}

impl ExpiryCacheManager for MokaCacheManager {
    const KIND: ProviderKind = ProviderKind::InProcess;
    type Config = MokaCacheConfig;

    fn default_configuration(&self) -> MokaCacheConfig {
        self.default_config
    }

    fn create_cache(&self, name: &str, config: MokaCacheConfig) -> Option<CacheHandle> {
        let cache = create_or_replace(
            &self.caches,
            name,
            |current| current.config() == &config,
            || MokaCache::new(name, config),
        );
        Some(cache)
    }
}
