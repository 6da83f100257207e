//! Cache Provider Implementations
//!
//! The cache managers the expiry-aware resolver can drive.
//!
//! # Available Providers
//!
//! - **Moka** - In-process bounded cache, TTL fixed per cache (feature: `moka`)
//! - **Redis** - Distributed key-value store, TTL applied on write (feature: `redis`)
//! - **`DashMap`** - JSR-107 style manager with expiry policies (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use cache_expiry::backends::{JCacheManager, MokaCacheManager, RedisCacheManager};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let moka = MokaCacheManager::new();
//! let jcache = JCacheManager::new();
//! let redis = RedisCacheManager::new().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

pub mod dashmap_cache;

#[cfg(feature = "moka")]
pub mod moka_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use dashmap_cache::{DashMapCache, ExpiryPolicy, JCacheManager, MutableConfiguration};

#[cfg(feature = "moka")]
pub use moka_cache::{CacheStats, MokaCache, MokaCacheConfig, MokaCacheManager};

#[cfg(feature = "redis")]
pub use redis_cache::{RedisCache, RedisCacheConfig, RedisCacheManager};

/// Cache registered under `name`, built with `build` unless the current one `is_current`
///
/// Runs under the map's entry lock, so concurrent creations of one name
/// serialize and the last differing configuration stays in effect.
pub(crate) fn create_or_replace<C>(
    caches: &DashMap<String, Arc<C>>,
    name: &str,
    is_current: impl Fn(&C) -> bool,
    build: impl FnOnce() -> C,
) -> Arc<C> {
    match caches.entry(name.to_string()) {
        Entry::Occupied(entry) if is_current(entry.get()) => Arc::clone(entry.get()),
        Entry::Occupied(mut entry) => {
            debug!(cache = %name, "Replacing cache with new configuration");
            let cache = Arc::new(build());
            entry.insert(Arc::clone(&cache));
            cache
        }
        Entry::Vacant(entry) => {
            let cache = Arc::new(build());
            entry.insert(Arc::clone(&cache));
            cache
        }
    }
}
