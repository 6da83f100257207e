//! Expiry-Aware Cache Resolver
//!
//! Resolves the caches of one invocation against a cache manager, creating
//! each named cache with the TTL declared on the method when there is one.
//!
//! # Resolution order
//!
//! 1. a call-scoped override resolver (other than this one) handles the call entirely
//! 2. the effective manager is the call-scoped one, else the bound one, and
//!    must be of the provider type the resolver serves
//! 3. cache names come from [`CacheNameDetector`]; no names means no caches
//! 4. each name is created with the TTL override, or fetched when there is no TTL
//!    or the provider cannot create it
//!
//! Resolution holds no locks of its own. Concurrent creations of one name
//! are left to the provider: for in-process and standards-style providers
//! the last creation wins, so two calls racing with different TTLs leave a
//! non-deterministic TTL in effect.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::backends::JCacheManager;
#[cfg(feature = "moka")]
use crate::backends::MokaCacheManager;
#[cfg(feature = "redis")]
use crate::backends::RedisCacheManager;
use crate::error::{ExpiryError, ExpiryResult};
use crate::expiry::detect_cache_period;
use crate::invocation::InvocationContext;
use crate::naming::{CacheNameDetector, TargetClassNameResolver};
use crate::traits::{
    CacheHandle, CacheManager, CacheNameResolver, CacheResolver, ExpiryCacheManager, ExpiryConfiguration,
    ProviderKind,
};

/// Expiry-aware resolver for managers of type `M`
pub struct ExpiryCacheResolver<M: ExpiryCacheManager> {
    cache_manager: Arc<dyn CacheManager>,
    names: CacheNameDetector,
    detect_name_resolver: bool,
    _manager: PhantomData<fn() -> M>,
}

impl<M: ExpiryCacheManager> ExpiryCacheResolver<M> {
    /// Resolver bound to `cache_manager`
    pub fn new(cache_manager: Arc<M>, names: CacheNameDetector) -> Self {
        Self {
            cache_manager,
            names,
            detect_name_resolver: true,
            _manager: PhantomData,
        }
    }

    /// Resolver bound to a manager known only through [`CacheManager`]
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::TypeMismatch`] when `cache_manager` is not an `M`.
    pub fn try_new(cache_manager: Arc<dyn CacheManager>, names: CacheNameDetector) -> ExpiryResult<Self> {
        check_manager::<M>(cache_manager.as_ref())?;
        Ok(Self {
            cache_manager,
            names,
            detect_name_resolver: true,
            _manager: PhantomData,
        })
    }

    /// Whether calls without names fall back to the default name resolver
    #[must_use]
    pub fn detect_name_resolver(mut self, enabled: bool) -> Self {
        self.detect_name_resolver = enabled;
        self
    }

    pub fn cache_manager(&self) -> &Arc<dyn CacheManager> {
        &self.cache_manager
    }

    /// Resolve the caches of `context`, ignoring any override resolver on it
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::TypeMismatch`] when the effective manager is not
    /// an `M`, and [`ExpiryError::Resolution`] when a named cache can neither
    /// be created nor fetched.
    pub fn resolve_expiring(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        let manager = self.effective_manager(context)?;

        let Some(names) = self.names.detect(context, self.detect_name_resolver) else {
            debug!(operation = %context.describe(), "No cache names resolved, nothing to cache");
            return Ok(Vec::new());
        };

        let ttl = detect_cache_period(context.method());
        let mut caches = Vec::with_capacity(names.len());
        for name in names.iter().filter(|name| !name.trim().is_empty()) {
            caches.push(materialize(manager, name, ttl, context)?);
        }
        Ok(caches)
    }

    fn effective_manager<'a>(&'a self, context: &'a InvocationContext) -> ExpiryResult<&'a M> {
        let manager: &dyn CacheManager = match context.cache_manager() {
            Some(manager) => manager.as_ref(),
            None => self.cache_manager.as_ref(),
        };
        check_manager::<M>(manager)
    }
}

impl<M: ExpiryCacheManager> CacheResolver for ExpiryCacheResolver<M> {
    fn resolve_caches(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        if let Some(resolver) = context.cache_resolver() {
            if !std::ptr::addr_eq(Arc::as_ptr(resolver), self) {
                return resolver.resolve_caches(context);
            }
        }
        self.resolve_expiring(context)
    }
}

fn check_manager<M: ExpiryCacheManager>(manager: &dyn CacheManager) -> ExpiryResult<&M> {
    manager
        .as_any()
        .downcast_ref::<M>()
        .ok_or_else(|| ExpiryError::TypeMismatch {
            expected: M::KIND,
            actual: manager.kind(),
            manager: manager.name().to_string(),
        })
}

fn materialize<M: ExpiryCacheManager>(
    manager: &M,
    name: &str,
    ttl: Option<Duration>,
    context: &InvocationContext,
) -> ExpiryResult<CacheHandle> {
    let created = ttl.and_then(|ttl| {
        let config = manager.default_configuration().with_ttl(ttl);
        debug!(cache = %name, ttl_ms = ttl.as_millis(), manager = manager.name(), "Creating cache with expiry");
        manager.create_cache(name, config)
    });

    created
        .or_else(|| {
            debug!(cache = %name, manager = manager.name(), "Fetching existing cache");
            manager.get_cache(name)
        })
        .ok_or_else(|| ExpiryError::Resolution {
            cache: name.to_string(),
            operation: context.describe(),
        })
}

/// Expiry-aware resolver for one of the supported provider kinds
pub enum BackendAdapter {
    #[cfg(feature = "moka")]
    InProcess(ExpiryCacheResolver<MokaCacheManager>),
    #[cfg(feature = "redis")]
    DistributedKv(ExpiryCacheResolver<RedisCacheManager>),
    Standards(ExpiryCacheResolver<JCacheManager>),
}

impl BackendAdapter {
    /// Adapter of `kind` bound to `cache_manager`
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::Configuration`] when `kind` is not compiled in and
    /// [`ExpiryError::TypeMismatch`] when `cache_manager` is not of that kind.
    pub fn for_manager(
        kind: ProviderKind,
        cache_manager: Arc<dyn CacheManager>,
        names: CacheNameDetector,
        detect_name_resolver: bool,
    ) -> ExpiryResult<Self> {
        match kind {
            #[cfg(feature = "moka")]
            ProviderKind::InProcess => Ok(Self::InProcess(
                ExpiryCacheResolver::try_new(cache_manager, names)?.detect_name_resolver(detect_name_resolver),
            )),
            #[cfg(feature = "redis")]
            ProviderKind::DistributedKv => Ok(Self::DistributedKv(
                ExpiryCacheResolver::try_new(cache_manager, names)?.detect_name_resolver(detect_name_resolver),
            )),
            ProviderKind::Standards => Ok(Self::Standards(
                ExpiryCacheResolver::try_new(cache_manager, names)?.detect_name_resolver(detect_name_resolver),
            )),
            #[allow(unreachable_patterns)]
            other => Err(ExpiryError::Configuration(format!(
                "the {other} cache provider is not enabled in this build"
            ))),
        }
    }

    /// Whether an adapter of `kind` can be bound to `cache_manager`
    pub fn supports(kind: ProviderKind, cache_manager: &dyn CacheManager) -> bool {
        let manager = cache_manager.as_any();
        match kind {
            #[cfg(feature = "moka")]
            ProviderKind::InProcess => manager.is::<MokaCacheManager>(),
            #[cfg(feature = "redis")]
            ProviderKind::DistributedKv => manager.is::<RedisCacheManager>(),
            ProviderKind::Standards => manager.is::<JCacheManager>(),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            #[cfg(feature = "moka")]
            Self::InProcess(_) => ProviderKind::InProcess,
            #[cfg(feature = "redis")]
            Self::DistributedKv(_) => ProviderKind::DistributedKv,
            Self::Standards(_) => ProviderKind::Standards,
        }
    }

    /// Manager this adapter is bound to
    pub fn cache_manager(&self) -> &Arc<dyn CacheManager> {
        match self {
            #[cfg(feature = "moka")]
            Self::InProcess(resolver) => resolver.cache_manager(),
            #[cfg(feature = "redis")]
            Self::DistributedKv(resolver) => resolver.cache_manager(),
            Self::Standards(resolver) => resolver.cache_manager(),
        }
    }

    /// See [`ExpiryCacheResolver::resolve_expiring`]
    ///
    /// # Errors
    ///
    /// Propagates the errors of the underlying resolver.
    pub fn resolve_expiring(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        match self {
            #[cfg(feature = "moka")]
            Self::InProcess(resolver) => resolver.resolve_expiring(context),
            #[cfg(feature = "redis")]
            Self::DistributedKv(resolver) => resolver.resolve_expiring(context),
            Self::Standards(resolver) => resolver.resolve_expiring(context),
        }
    }
}

/// The resolver registered with the host once a manager is bound
///
/// Honors call-scoped override resolvers, then delegates to its
/// [`BackendAdapter`].
pub struct ExpiryAwareResolver {
    adapter: BackendAdapter,
}

impl ExpiryAwareResolver {
    pub fn new(adapter: BackendAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &BackendAdapter {
        &self.adapter
    }

    pub fn kind(&self) -> ProviderKind {
        self.adapter.kind()
    }
}

impl CacheResolver for ExpiryAwareResolver {
    fn resolve_caches(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        if let Some(resolver) = context.cache_resolver() {
            if !std::ptr::addr_eq(Arc::as_ptr(resolver), self) {
                debug!(operation = %context.describe(), "Delegating to call-scoped cache resolver");
                return resolver.resolve_caches(context);
            }
        }
        self.adapter.resolve_expiring(context)
    }
}

/// Plain resolver fetching the caches named by a [`TargetClassNameResolver`]
///
/// Never creates caches and never applies a TTL.
pub struct TargetClassCacheResolver {
    cache_manager: Arc<dyn CacheManager>,
    name_resolver: TargetClassNameResolver,
}

impl TargetClassCacheResolver {
    pub fn new(cache_manager: Arc<dyn CacheManager>) -> Self {
        Self::with_name_resolver(cache_manager, TargetClassNameResolver::default())
    }

    pub fn with_name_resolver(cache_manager: Arc<dyn CacheManager>, name_resolver: TargetClassNameResolver) -> Self {
        Self {
            cache_manager,
            name_resolver,
        }
    }
}

impl CacheResolver for TargetClassCacheResolver {
    fn resolve_caches(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        let manager = context.cache_manager().unwrap_or(&self.cache_manager);
        self.name_resolver
            .cache_names(context)
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                manager.get_cache(name).ok_or_else(|| ExpiryError::Resolution {
                    cache: name.clone(),
                    operation: context.describe(),
                })
            })
            .collect()
    }
}
