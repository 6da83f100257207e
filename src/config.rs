//! Configuration knobs for the expiry resolver subsystem
//!
//! All sections deserialize from kebab-case keys and fall back to their
//! defaults when a key is missing, so a partial document is always valid.
//!
//! # Example
//!
//! ```rust
//! use cache_expiry::ExpiryProperties;
//!
//! let props: ExpiryProperties = serde_json::from_str(
//!     r#"{ "cache-manager": { "cache-manager-name": "primaryCacheManager" } }"#,
//! ).unwrap();
//! assert_eq!(props.cache_manager.cache_manager_name.as_deref(), Some("primaryCacheManager"));
//! assert!(props.enabled);
//! ```

use serde::Deserialize;
use tracing::warn;

/// Default priority of the wiring processor among other startup processors
pub const DEFAULT_PROCESSOR_ORDER: i32 = i32::MAX - 1000;

/// Root properties for cache expiry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExpiryProperties {
    /// Toggles the whole subsystem
    pub enabled: bool,
    pub cache_interceptor: CacheInterceptorProperties,
    pub cache_manager: CacheManagerProperties,
    pub cache_resolver: CacheResolverProperties,
    pub cache_name_resolver: CacheNameResolverProperties,
}

impl Default for ExpiryProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_interceptor: CacheInterceptorProperties::default(),
            cache_manager: CacheManagerProperties::default(),
            cache_resolver: CacheResolverProperties::default(),
            cache_name_resolver: CacheNameResolverProperties::default(),
        }
    }
}

/// Properties for the interceptor that consumes the resolver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheInterceptorProperties {
    /// Whether the wired resolver is injected into the interceptor
    pub inject_cache_resolver: bool,
}

impl Default for CacheInterceptorProperties {
    fn default() -> Self {
        Self {
            inject_cache_resolver: true,
        }
    }
}

/// Properties for cache manager discovery
///
/// The manager is chosen in this order:
/// 1. the manager registered under `cache_manager_name`
/// 2. the manager registered under the conventional `cacheExpiryCacheManager` name
/// 3. the first compatible manager observed, unless `detect_cache_manager` is off
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheManagerProperties {
    pub cache_manager_name: Option<String>,
    pub detect_cache_manager: bool,
}

impl Default for CacheManagerProperties {
    fn default() -> Self {
        Self {
            cache_manager_name: None,
            detect_cache_manager: true,
        }
    }
}

/// Properties for the expiry-aware cache resolver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheResolverProperties {
    /// Fall back to the globally registered name resolver when a call has no names
    pub detect_cache_name_resolver: bool,
    /// Relative priority of the wiring processor
    pub processor_order: i32,
    /// Rewrite `#root.targetClass` / `#root.methodName` tokens in explicit names
    pub resolve_name_placeholders: bool,
}

impl Default for CacheResolverProperties {
    fn default() -> Self {
        Self {
            detect_cache_name_resolver: true,
            processor_order: DEFAULT_PROCESSOR_ORDER,
            resolve_name_placeholders: false,
        }
    }
}

/// Properties for the default target-class name resolver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheNameResolverProperties {
    /// Whether the default name resolver is registered at all
    pub enabled: bool,
    pub short_class_name: bool,
    pub include_method_name: bool,
    /// `DemoService:run` when true, `DemoService.run` otherwise
    pub use_colon_separator: bool,
    pub resolve_template_tokens: bool,
    pub name_prefix: String,
    pub name_suffix: String,
}

impl Default for CacheNameResolverProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            short_class_name: false,
            include_method_name: true,
            use_colon_separator: true,
            resolve_template_tokens: false,
            name_prefix: String::new(),
            name_suffix: String::new(),
        }
    }
}

impl ExpiryProperties {
    /// Build properties from defaults overlaid with `CACHE_EXPIRY_*` environment variables
    ///
    /// Recognized variables:
    /// - `CACHE_EXPIRY_ENABLED`
    /// - `CACHE_EXPIRY_CACHE_MANAGER_NAME`
    /// - `CACHE_EXPIRY_DETECT_CACHE_MANAGER`
    /// - `CACHE_EXPIRY_INJECT_CACHE_RESOLVER`
    /// - `CACHE_EXPIRY_PROCESSOR_ORDER`
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut props = Self::default();
        if let Some(enabled) = env_flag("CACHE_EXPIRY_ENABLED") {
            props.enabled = enabled;
        }
        if let Ok(name) = std::env::var("CACHE_EXPIRY_CACHE_MANAGER_NAME") {
            if !name.trim().is_empty() {
                props.cache_manager.cache_manager_name = Some(name);
            }
        }
        if let Some(detect) = env_flag("CACHE_EXPIRY_DETECT_CACHE_MANAGER") {
            props.cache_manager.detect_cache_manager = detect;
        }
        if let Some(inject) = env_flag("CACHE_EXPIRY_INJECT_CACHE_RESOLVER") {
            props.cache_interceptor.inject_cache_resolver = inject;
        }
        if let Ok(order) = std::env::var("CACHE_EXPIRY_PROCESSOR_ORDER") {
            match order.trim().parse() {
                Ok(order) => props.cache_resolver.processor_order = order,
                Err(_) => warn!(value = %order, "Ignoring invalid CACHE_EXPIRY_PROCESSOR_ORDER"),
            }
        }
        props
    }

    /// Configured manager name, if it is not blank
    pub fn cache_manager_name(&self) -> Option<&str> {
        self.cache_manager
            .cache_manager_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

fn env_flag(var: &str) -> Option<bool> {
    let value = std::env::var(var).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!(var = %var, value = %value, "Ignoring invalid boolean environment value");
            None
        }
    }
}
