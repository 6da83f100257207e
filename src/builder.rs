//! Cache Expiry Builder
//!
//! Assembles the name-resolver registry and the wiring processor from
//! [`ExpiryProperties`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cache_expiry::{CacheExpiryBuilder, Component, ExpiryProperties, ProviderKind};
//!
//! let processor = CacheExpiryBuilder::new(ProviderKind::InProcess)
//!     .with_properties(ExpiryProperties::from_env())
//!     .build(host)?
//!     .expect("cache expiry enabled");
//!
//! processor.on_component_available("cacheExpiryCacheManager", Component::CacheManager(manager))?;
//! processor.on_component_available("cacheInterceptor", Component::Interceptor(interceptor))?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::ExpiryProperties;
use crate::error::ExpiryResult;
use crate::naming::{CacheNameDetector, NameResolverRegistry, PlaceholderPolicy, TargetClassNameResolver};
use crate::processor::{ComponentHost, ExpiryResolverProcessor};
use crate::traits::ProviderKind;

/// Builder for the expiry resolver wiring of one provider kind
///
/// # Default Behavior
///
/// - Properties: [`ExpiryProperties::default`]
/// - Registry: a fresh [`NameResolverRegistry`]
/// - A [`TargetClassNameResolver`] built from the `cache-name-resolver`
///   section becomes the default name resolver, unless the registry already
///   has one or that section is disabled
pub struct CacheExpiryBuilder {
    kind: ProviderKind,
    properties: ExpiryProperties,
    registry: Option<Arc<NameResolverRegistry>>,
}

impl CacheExpiryBuilder {
    /// Builder for managers of `kind`
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            properties: ExpiryProperties::default(),
            registry: None,
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ExpiryProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Use a registry the host has already populated with named resolvers
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<NameResolverRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the wiring processor
    ///
    /// # Returns
    ///
    /// * `Ok(Some(processor))` - Subsystem enabled and configuration valid
    /// * `Ok(None)` - Subsystem disabled by `enabled = false`
    /// * `Err(e)` - No cache manager can ever be selected
    ///
    /// # Errors
    ///
    /// See [`ExpiryResolverProcessor::new`].
    pub fn build(self, host: Arc<dyn ComponentHost>) -> ExpiryResult<Option<ExpiryResolverProcessor>> {
        if !self.properties.enabled {
            info!(kind = %self.kind, "Cache expiry disabled");
            return Ok(None);
        }

        let registry = self.registry.unwrap_or_default();
        let name_props = &self.properties.cache_name_resolver;
        if name_props.enabled && registry.default_resolver().is_none() {
            registry.set_default(Arc::new(TargetClassNameResolver::from_properties(name_props)));
        }

        let mut names = CacheNameDetector::new(registry);
        if self.properties.cache_resolver.resolve_name_placeholders {
            names = names.with_placeholders(PlaceholderPolicy {
                short_class_name: name_props.short_class_name,
            });
        }

        ExpiryResolverProcessor::new(self.kind, self.properties, names, host).map(Some)
    }
}
