//! Cache Provider Traits
//!
//! This module defines the seams between the resolver core and the cache
//! providers it drives.
//!
//! # Architecture
//!
//! - `Cache`: A named cache handle returned to the caller
//! - `CacheManager`: Provider-level owner of named caches
//! - `ExpiryCacheManager`: Extended manager that can create caches from a cloned configuration
//! - `ExpiryConfiguration`: Provider configuration with an overridable TTL
//! - `CacheResolver`: Per-call resolution of cache handles
//! - `CacheNameResolver`: Per-call generation of cache names
//!
//! # Example: Custom Manager
//!
//! ```rust,ignore
//! use cache_expiry::{CacheManager, CacheHandle, ExpiryCacheManager, ProviderKind};
//!
//! struct MyManager { /* ... */ }
//!
//! impl CacheManager for MyManager {
//!     fn kind(&self) -> ProviderKind { ProviderKind::InProcess }
//!     fn get_cache(&self, name: &str) -> Option<CacheHandle> { /* ... */ }
//!     fn cache_names(&self) -> Vec<String> { /* ... */ }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! impl ExpiryCacheManager for MyManager {
//!     const KIND: ProviderKind = ProviderKind::InProcess;
//!     type Config = MyConfig;
//!     fn default_configuration(&self) -> MyConfig { /* ... */ }
//!     fn create_cache(&self, name: &str, config: MyConfig) -> Option<CacheHandle> { /* ... */ }
//! }
//! ```

use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ExpiryResult;
use crate::invocation::InvocationContext;

/// Provider family a cache manager belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// In-process bounded cache (Moka)
    InProcess,
    /// Distributed key-value store (Redis)
    DistributedKv,
    /// JSR-107 shaped cache manager
    Standards,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProcess => "in-process",
            Self::DistributedKv => "distributed-kv",
            Self::Standards => "standards",
        })
    }
}

/// Named cache handle returned to the invoker
///
/// The resolver core never looks inside a handle; it only hands it back to
/// the caller that stores and reads values through it.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so handles can be shared across tasks.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name this cache was created or fetched under
    fn name(&self) -> &str;

    /// Entry lifetime applied to writes, `None` when entries never expire
    fn time_to_live(&self) -> Option<Duration>;

    /// Get value from cache by key
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - Value found
    /// * `Ok(None)` - Key not found or expired
    /// * `Err(e)` - The provider failed
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a value under `key`, expiring per this cache's configuration
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove a single key (no error if it did not exist)
    async fn evict(&self, key: &str) -> Result<()>;

    /// Remove every entry of this cache
    async fn clear(&self) -> Result<()>;
}

/// Shared cache handle
pub type CacheHandle = Arc<dyn Cache>;

/// Provider-level object owning named caches
pub trait CacheManager: Send + Sync + 'static {
    /// Provider family of this manager
    fn kind(&self) -> ProviderKind;

    /// Fetch an existing named cache (dynamic managers may create it on demand)
    fn get_cache(&self, name: &str) -> Option<CacheHandle>;

    /// Names of the caches currently known to this manager
    fn cache_names(&self) -> Vec<String>;

    /// Concrete manager access, used to check an adapter's required provider type
    fn as_any(&self) -> &dyn Any;

    /// Get the name of this manager implementation
    ///
    /// This is used for logging and error messages.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Manager capability required by the expiry-aware resolver
///
/// Providers expose their default configuration explicitly instead of having
/// it read out of their internals, and accept a cloned, TTL-overridden copy
/// back when creating a cache.
pub trait ExpiryCacheManager: CacheManager + Sized {
    /// Provider kind the adapter for this manager serves
    const KIND: ProviderKind;

    /// Provider specific cache configuration
    type Config: ExpiryConfiguration;

    /// Configuration new caches are derived from
    fn default_configuration(&self) -> Self::Config;

    /// Create, or fetch when an identical one exists, the cache bound to `name` and `config`
    ///
    /// Returns `None` when the provider cannot create caches; callers then
    /// fall back to [`CacheManager::get_cache`]. Concurrent calls for one name
    /// must leave the manager consistent: the last successful creation is the
    /// one subsequent lookups observe.
    fn create_cache(&self, name: &str, config: Self::Config) -> Option<CacheHandle>;
}

/// Provider configuration whose entry TTL can be overridden
pub trait ExpiryConfiguration: Clone + PartialEq + Debug + Send + Sync {
    /// Return this configuration with the entry time-to-live replaced by `ttl`
    #[must_use]
    fn with_ttl(self, ttl: Duration) -> Self;
}

/// Resolves the cache handles a cached operation works against
pub trait CacheResolver: Send + Sync {
    /// Resolve the caches for one invocation, in name resolution order
    ///
    /// # Errors
    ///
    /// Fails when the effective manager has the wrong provider type or when a
    /// resolved name can neither be created nor fetched.
    fn resolve_caches(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>>;
}

/// Generates cache names for an invocation
pub trait CacheNameResolver: Send + Sync {
    /// Cache names for `context`, never containing a synthesized name when explicit names exist
    fn cache_names(&self, context: &InvocationContext) -> Vec<String>;
}
