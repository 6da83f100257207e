//! `DashMap` Cache - JSR-107 Style Cache Provider
//!
//! A concurrent `HashMap` cache whose expiry follows a JSR-107 style
//! expiry policy (eternal, created, accessed), owned by a [`JCacheManager`]
//! that creates caches from a [`MutableConfiguration`].

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, info};

use super::create_or_replace;
use crate::traits::{Cache, CacheHandle, CacheManager, ExpiryCacheManager, ExpiryConfiguration, ProviderKind};

/// When entries of a cache expire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Entries never expire
    #[default]
    Eternal,
    /// Entries expire a fixed time after creation
    Created(Duration),
    /// Entries expire a fixed time after their last creation or access
    Accessed(Duration),
}

impl ExpiryPolicy {
    fn duration(self) -> Option<Duration> {
        match self {
            Self::Eternal => None,
            Self::Created(ttl) | Self::Accessed(ttl) => Some(ttl),
        }
    }
}

/// Cache configuration in the shape of a JSR-107 `MutableConfiguration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutableConfiguration {
    pub expiry_policy: ExpiryPolicy,
    /// Copy values in and out instead of sharing the caller's buffer
    pub store_by_value: bool,
    pub statistics_enabled: bool,
}

impl Default for MutableConfiguration {
    fn default() -> Self {
        Self {
            expiry_policy: ExpiryPolicy::Eternal,
            store_by_value: true,
            statistics_enabled: false,
        }
    }
}

impl ExpiryConfiguration for MutableConfiguration {
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry_policy = ExpiryPolicy::Created(ttl);
        self
    }
}

/// Deadline `ttl` from now, `None` (never expires) when past what `Instant` can represent
fn expiry_from_now(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(expiry_from_now),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

/// Concurrent cache using `DashMap`
///
/// **Features**:
/// - Lock-free concurrent reads/writes
/// - Expiry tracked per entry from the cache's [`ExpiryPolicy`]
/// - No size limits and no background eviction; expired entries are
///   dropped on read or by [`DashMapCache::cleanup_expired`]
pub struct DashMapCache {
    name: String,
    config: MutableConfiguration,
    /// Concurrent `HashMap`
    map: DashMap<String, CacheEntry>,
    /// Hit counter
    hits: AtomicU64,
    /// Miss counter
    misses: AtomicU64,
    /// Set counter
    sets: AtomicU64,
}

impl DashMapCache {
    /// Create new `DashMap` cache
    pub fn new(name: impl Into<String>, config: MutableConfiguration) -> Self {
        Self {
            name: name.into(),
            config,
            map: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MutableConfiguration {
        &self.config
    }

    /// Cleanup expired entries
    ///
    /// **Note**: `DashMap` doesn't have automatic eviction, so callers run
    /// this periodically to reclaim memory.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(cache = %self.name, count = removed, "[DashMap] Cleaned up expired entries");
        }
        removed
    }

    /// Get current cache size
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `(hits, misses, sets)`, all zero unless statistics are enabled
    pub fn statistics(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
        )
    }

    fn record(&self, counter: &AtomicU64) {
        if self.config.statistics_enabled {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn stored(&self, value: Bytes) -> Bytes {
        if self.config.store_by_value {
            Bytes::copy_from_slice(&value)
        } else {
            value
        }
    }
}

#[async_trait]
impl Cache for DashMapCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.config.expiry_policy.duration()
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let Some(mut entry) = self.map.get_mut(key) else {
            self.record(&self.misses);
            return Ok(None);
        };
        if entry.is_expired() {
            // Release the shard lock before removing; a concurrent put may land in between
            drop(entry);
            self.map.remove_if(key, |_, entry| entry.is_expired());
            self.record(&self.misses);
            return Ok(None);
        }
        if let ExpiryPolicy::Accessed(ttl) = self.config.expiry_policy {
            entry.expires_at = expiry_from_now(ttl);
        }
        let value = entry.value.clone();
        drop(entry);
        self.record(&self.hits);
        Ok(Some(self.stored(value)))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let entry = CacheEntry::new(self.stored(value), self.config.expiry_policy.duration());
        self.map.insert(key.to_string(), entry);
        self.record(&self.sets);
        debug!(cache = %self.name, key = %key, "[DashMap] Cached key");
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}

/// JSR-107 style manager of [`DashMapCache`]s
///
/// Creating a cache under a name that already exists with a different
/// configuration replaces it, so the last creation is the one in effect.
pub struct JCacheManager {
    caches: DashMap<String, Arc<DashMapCache>>,
    default_config: MutableConfiguration,
    dynamic: bool,
}

impl JCacheManager {
    /// Dynamic manager with the default configuration
    pub fn new() -> Self {
        Self::with_config(MutableConfiguration::default())
    }

    /// Dynamic manager whose caches derive from `config`
    pub fn with_config(config: MutableConfiguration) -> Self {
        info!(expiry = ?config.expiry_policy, "Initializing JCache manager (DashMap)");
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
            let cache = Arc::new(DashMapCache::new(name.clone(), self.default_config));
            self.caches.insert(name, cache);
        }
        Self { dynamic: false, ..self }
    }

    /// Remove a cache and its entries
    pub fn destroy_cache(&self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Typed lookup, without dynamic creation
    pub fn dashmap_cache(&self, name: &str) -> Option<Arc<DashMapCache>> {
        self.caches.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for JCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager for JCacheManager {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Standards
    }

    fn get_cache(&self, name: &str) -> Option<CacheHandle> {
        if let Some(cache) = self.dashmap_cache(name) {
            return Some(cache);
        }
        if !self.dynamic {
            return None;
        }
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DashMapCache::new(name, self.default_config)))
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
        "JCache"
    }
}

impl ExpiryCacheManager for JCacheManager {
    const KIND: ProviderKind = ProviderKind::Standards;
    type Config = MutableConfiguration;

    fn default_configuration(&self) -> MutableConfiguration {
        self.default_config
    }

    fn create_cache(&self, name: &str, config: MutableConfiguration) -> Option<CacheHandle> {
        let cache = create_or_replace(
            &self.caches,
            name,
            |current| current.config() == &config,
            || DashMapCache::new(name, config),
        );
        Some(cache)
    }
}
