//! Cache Expiry
//!
//! Per-method cache expiry for named caches, for Rust services whose cached
//! operations declare a time-to-live next to the cache names they use:
//! - **TTL Directives**: `ttl` + [`TimeUnit`] declared on a method, nanoseconds to eras
//! - **Name Resolution**: explicit names, named name resolvers, or a synthesized `Type:method`
//! - **Expiry-Aware Resolution**: each named cache is created with the declared TTL
//! - **Three Providers**: Moka (in-process), Redis (distributed), `DashMap` (JSR-107 style)
//! - **Startup Wiring**: binds the resolver to the right cache manager exactly once
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cache_expiry::backends::JCacheManager;
//! use cache_expiry::{
//!     BackendAdapter, CacheExpiry, CacheNameDetector, CacheOperation, CacheResolver,
//!     ExpiryAwareResolver, InvocationContext, MethodDescriptor, NameResolverRegistry,
//!     ProviderKind, TargetType, TimeUnit,
//! };
//!
//! let manager = Arc::new(JCacheManager::new());
//! let names = CacheNameDetector::new(Arc::new(NameResolverRegistry::new()));
//! let adapter = BackendAdapter::for_manager(ProviderKind::Standards, manager, names, true)?;
//! let resolver = ExpiryAwareResolver::new(adapter);
//!
//! let context = InvocationContext::new(
//!     TargetType::new("app::UserService"),
//!     MethodDescriptor::new("find_user").with_expiry(CacheExpiry::new(5, TimeUnit::Minutes)),
//!     CacheOperation::cacheable().with_cache_names(["users"]),
//! );
//!
//! let caches = resolver.resolve_caches(&context)?;
//! assert_eq!(caches[0].time_to_live(), Some(Duration::from_secs(300)));
//! # Ok::<(), cache_expiry::ExpiryError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! Invocation → override resolver? ──yes──→ delegate
//!                  │ no
//!                  ↓
//!              cache names → TTL → create(name, default config + TTL) → handles
//!                                        ↓ none
//!                                    get(name) → missing: ResolutionError
//! ```

pub mod backends;
pub mod builder;
pub mod config;
pub mod error;
pub mod expiry;
pub mod interceptor;
pub mod invocation;
pub mod naming;
pub mod processor;
pub mod resolver;
pub mod traits;

pub use backends::{DashMapCache, ExpiryPolicy, JCacheManager, MutableConfiguration};
#[cfg(feature = "moka")]
pub use backends::{MokaCache, MokaCacheConfig, MokaCacheManager};
#[cfg(feature = "redis")]
pub use backends::{RedisCache, RedisCacheConfig, RedisCacheManager};
pub use builder::CacheExpiryBuilder;
pub use config::{
    CacheInterceptorProperties, CacheManagerProperties, CacheNameResolverProperties, CacheResolverProperties,
    ExpiryProperties,
};
pub use error::{ExpiryError, ExpiryResult};
pub use expiry::{CacheExpiry, TimeUnit, detect_cache_period};
pub use interceptor::{CacheInterceptor, SimpleCacheInterceptor};
pub use invocation::{CacheOperation, InvocationContext, MethodDescriptor, OperationKind, TargetType};
pub use naming::{
    CacheNameDetector, METHOD_NAME_TOKEN, NameResolverRegistry, PlaceholderPolicy, TARGET_CLASS_TOKEN,
    TargetClassNameResolver,
};
pub use processor::{
    CACHE_MANAGER, CACHE_RESOLVER, CacheManagerBinding, Component, ComponentHost, ExpiryResolverProcessor,
    ManagerSelection,
};
pub use resolver::{BackendAdapter, ExpiryAwareResolver, ExpiryCacheResolver, TargetClassCacheResolver};
pub use traits::{
    Cache, CacheHandle, CacheManager, CacheNameResolver, CacheResolver, ExpiryCacheManager, ExpiryConfiguration,
    ProviderKind,
};

// Re-export async_trait for providers implementing `Cache`
pub use async_trait::async_trait;
