//! Redis Cache - Distributed Cache Provider
//!
//! Named caches stored in Redis under a per-cache key prefix. The entry TTL
//! is part of the write-time configuration: changing a cache's TTL affects
//! later writes only and never touches entries already stored.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use super::create_or_replace;
use crate::traits::{Cache, CacheHandle, CacheManager, ExpiryCacheManager, ExpiryConfiguration, ProviderKind};

/// Write-time configuration of a Redis cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisCacheConfig {
    /// Entry TTL, `None` stores entries without expiry
    pub entry_ttl: Option<Duration>,
    /// Prepended to the `<cache name>::` key prefix
    pub key_prefix: Option<String>,
    /// Whether keys are prefixed with the cache name at all
    pub use_prefix: bool,
    /// Whether empty payloads may be stored
    pub cache_null_values: bool,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: None,
            key_prefix: None,
            use_prefix: true,
            cache_null_values: true,
        }
    }
}

impl RedisCacheConfig {
    #[must_use]
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn prefix_cache_name_with(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn disable_caching_null_values(mut self) -> Self {
        self.cache_null_values = false;
        self
    }

    #[must_use]
    pub fn disable_key_prefix(mut self) -> Self {
        self.use_prefix = false;
        self
    }

    /// Key prefix for `cache_name`, e.g. `app:users::`
    pub fn key_prefix_for(&self, cache_name: &str) -> String {
        if !self.use_prefix {
            return String::new();
        }
        format!("{}{cache_name}::", self.key_prefix.as_deref().unwrap_or_default())
    }

    /// SCAN pattern matching every key of `cache_name`
    ///
    /// # Errors
    ///
    /// Fails when key prefixes are disabled, since the pattern would match
    /// every key in the database.
    pub fn clear_pattern(&self, cache_name: &str) -> Result<String> {
        if !self.use_prefix {
            bail!("cache '{cache_name}' cannot be cleared without a key prefix");
        }
        Ok(format!("{}*", self.key_prefix_for(cache_name)))
    }

    /// Full Redis key of `key` in `cache_name`
    pub fn redis_key(&self, cache_name: &str, key: &str) -> String {
        format!("{}{key}", self.key_prefix_for(cache_name))
    }
}

impl ExpiryConfiguration for RedisCacheConfig {
    fn with_ttl(self, ttl: Duration) -> Self {
        self.entry_ttl(ttl)
    }
}

/// Named cache stored in Redis
///
/// Shares the manager's `ConnectionManager`, which reconnects automatically.
pub struct RedisCache {
    name: String,
    config: RedisCacheConfig,
    /// Redis connection manager - handles reconnection automatically
    conn_manager: ConnectionManager,
    /// Hit counter
    hits: AtomicU64,
    /// Miss counter
    misses: AtomicU64,
    /// Set counter
    sets: AtomicU64,
}

impl RedisCache {
    fn new(name: impl Into<String>, config: RedisCacheConfig, conn_manager: ConnectionManager) -> Self {
        Self {
            name: name.into(),
            config,
            conn_manager,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    /// Scan keys of this cache (glob-style pattern, cursor-based SCAN)
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            // SCAN cursor MATCH pattern COUNT 100
            let result: (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .with_context(|| format!("Redis SCAN failed for pattern {pattern}"))?;

            cursor = result.0;
            keys.extend(result.1);

            // Cursor 0 means iteration is complete
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, count = keys.len(), "[Redis] Scanned keys matching pattern");
        Ok(keys)
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.config.entry_ttl
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.conn_manager.clone();
        let redis_key = self.config.redis_key(&self.name, key);

        let value: Option<Vec<u8>> = conn
            .get(&redis_key)
            .await
            .with_context(|| format!("Redis GET failed for {redis_key}"))?;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value.map(Bytes::from))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        if value.is_empty() && !self.config.cache_null_values {
            bail!("cache '{}' does not allow empty values", self.name);
        }
        let mut conn = self.conn_manager.clone();
        let redis_key = self.config.redis_key(&self.name, key);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(&*value);
        if let Some(ttl) = self.config.entry_ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis SET failed for {redis_key}"))?;

        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(cache = %self.name, key = %redis_key, ttl = ?self.config.entry_ttl, "[Redis] Cached key");
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let redis_key = self.config.redis_key(&self.name, key);
        let _: () = conn
            .del(&redis_key)
            .await
            .with_context(|| format!("Redis DEL failed for {redis_key}"))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let pattern = self.config.clear_pattern(&self.name)?;
        let keys = self.scan_keys(&pattern).await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn_manager.clone();
        let count: usize = conn.del(&keys).await.context("Redis bulk DEL failed")?;
        debug!(cache = %self.name, count = count, "[Redis] Cleared cache");
        Ok(())
    }
}

/// Manager creating Redis caches on demand
pub struct RedisCacheManager {
    conn_manager: ConnectionManager,
    caches: DashMap<String, Arc<RedisCache>>,
    default_config: RedisCacheConfig,
}

impl RedisCacheManager {
    /// Connect using `REDIS_URL`, defaulting to `redis://127.0.0.1:6379`
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn new() -> Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Connect to `redis_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis cache manager with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        // Test connection
        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis cache manager connected successfully");

        Ok(Self {
            conn_manager,
            caches: DashMap::new(),
            default_config: RedisCacheConfig::default(),
        })
    }

    /// Configuration caches created by this manager derive from
    #[must_use]
    pub fn with_default_config(mut self, config: RedisCacheConfig) -> Self {
        self.default_config = config;
        self
    }
}

impl CacheManager for RedisCacheManager {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DistributedKv
    }

    fn get_cache(&self, name: &str) -> Option<CacheHandle> {
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RedisCache::new(name, self.default_config.clone(), self.conn_manager.clone()))
            })
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
        "Redis"
    }
}

impl ExpiryCacheManager for RedisCacheManager {
    const KIND: ProviderKind = ProviderKind::DistributedKv;
    type Config = RedisCacheConfig;

    fn default_configuration(&self) -> RedisCacheConfig {
        self.default_config.clone()
    }

    fn create_cache(&self, name: &str, config: RedisCacheConfig) -> Option<CacheHandle> {
        let cache = create_or_replace(
            &self.caches,
            name,
            |current| current.config() == &config,
            || RedisCache::new(name, config.clone(), self.conn_manager.clone()),
        );
        Some(cache)
    }
}
