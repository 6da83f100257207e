//! Cache Interceptor
//!
//! The call-dispatch component that consumes the wired resolver. Hosts plug
//! their own interceptor in through [`CacheInterceptor`]; the
//! [`SimpleCacheInterceptor`] covers the common read-through case.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ExpiryResult;
use crate::invocation::InvocationContext;
use crate::traits::{CacheHandle, CacheResolver};

/// Interceptor-like component the wiring processor injects its resolver into
pub trait CacheInterceptor: Send + Sync {
    /// Replace the resolver this interceptor resolves caches with
    fn set_cache_resolver(&self, resolver: Arc<dyn CacheResolver>);
}

/// Read-through interceptor driving an injected [`CacheResolver`]
///
/// Values are stored as JSON. Reads consult the first resolved cache only;
/// writes go to every resolved cache.
#[derive(Default)]
pub struct SimpleCacheInterceptor {
    resolver: RwLock<Option<Arc<dyn CacheResolver>>>,
}

impl SimpleCacheInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_resolver(resolver: Arc<dyn CacheResolver>) -> Self {
        Self {
            resolver: RwLock::new(Some(resolver)),
        }
    }

    pub fn cache_resolver(&self) -> Option<Arc<dyn CacheResolver>> {
        self.resolver.read().clone()
    }

    /// Caches for `context`; empty when no resolver has been injected
    ///
    /// # Errors
    ///
    /// Propagates resolution errors.
    pub fn resolve(&self, context: &InvocationContext) -> ExpiryResult<Vec<CacheHandle>> {
        match self.cache_resolver() {
            Some(resolver) => resolver.resolve_caches(context),
            None => Ok(Vec::new()),
        }
    }

    /// Return the cached value for `key`, computing and caching it on a miss
    ///
    /// Without any resolved cache the value is computed on every call.
    ///
    /// # Errors
    ///
    /// Fails when resolution fails, a cache read or write fails, a cached
    /// value cannot be decoded, or `compute` fails.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        context: &InvocationContext,
        key: &str,
        compute: F,
    ) -> ExpiryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let caches = self.resolve(context)?;

        if let Some(cache) = caches.first() {
            if let Some(bytes) = cache.get(key).await? {
                debug!(cache = %cache.name(), key = %key, "Cache hit");
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to decode cached value for {key}"))?;
                return Ok(value);
            }
        }

        let value = compute().await?;
        if caches.is_empty() {
            return Ok(value);
        }

        let bytes = Bytes::from(serde_json::to_vec(&value).context("Failed to encode computed value")?);
        for cache in &caches {
            cache.put(key, bytes.clone()).await?;
        }
        debug!(key = %key, caches = caches.len(), "Cached computed value");
        Ok(value)
    }

    /// Remove `key` from every cache resolved for `context`
    ///
    /// # Errors
    ///
    /// Fails when resolution or a cache eviction fails.
    pub async fn evict(&self, context: &InvocationContext, key: &str) -> ExpiryResult<()> {
        for cache in self.resolve(context)? {
            cache.evict(key).await?;
        }
        Ok(())
    }
}

impl CacheInterceptor for SimpleCacheInterceptor {
    fn set_cache_resolver(&self, resolver: Arc<dyn CacheResolver>) {
        *self.resolver.write() = Some(resolver);
    }
}
