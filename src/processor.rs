//! Resolver Wiring
//!
//! Binds an expiry-aware resolver to a cache manager while the host starts
//! up. The host reports every component it initializes through
//! [`ExpiryResolverProcessor::on_component_available`]; once both a
//! qualifying manager and an interceptor have been seen, the resolver is
//! built, registered with the host under [`CACHE_RESOLVER`] and optionally
//! injected into the interceptor. That transition happens exactly once.
//!
//! # Manager selection
//!
//! Fixed when the processor is created:
//! 1. the manager named by `cache-manager.cache-manager-name`, when the host has one of the right kind
//! 2. else the manager named [`CACHE_MANAGER`], when the host has one of the right kind
//! 3. else the first compatible manager reported, unless `detect-cache-manager` is off

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ExpiryProperties;
use crate::error::{ExpiryError, ExpiryResult};
use crate::interceptor::CacheInterceptor;
use crate::naming::CacheNameDetector;
use crate::resolver::{BackendAdapter, ExpiryAwareResolver};
use crate::traits::{CacheManager, CacheResolver, ProviderKind};

/// Conventional name of the manager the expiry resolver binds to
pub const CACHE_MANAGER: &str = "cacheExpiryCacheManager";
/// Name the expiry resolver is registered under
pub const CACHE_RESOLVER: &str = "cacheExpiryCacheResolver";

/// Component registry of the hosting application
pub trait ComponentHost: Send + Sync {
    /// Provider kind of the manager registered under `name`, if there is one
    fn manager_kind(&self, name: &str) -> Option<ProviderKind>;

    /// Register `resolver` under `name`
    ///
    /// # Returns
    ///
    /// `false` when the host refused the registration
    fn register_resolver(&self, name: &str, resolver: Arc<ExpiryAwareResolver>) -> bool;
}

/// A component the host has finished initializing
#[derive(Clone)]
pub enum Component {
    CacheManager(Arc<dyn CacheManager>),
    Interceptor(Arc<dyn CacheInterceptor>),
    /// Anything the processor does not care about
    Other,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheManager(manager) => f.debug_tuple("CacheManager").field(&manager.name()).finish(),
            Self::Interceptor(_) => f.write_str("Interceptor"),
            Self::Other => f.write_str("Other"),
        }
    }
}

/// Which reported manager the processor binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerSelection {
    /// The manager registered under the configured name
    Named(String),
    /// The manager registered under [`CACHE_MANAGER`]
    Conventional,
    /// The first compatible manager
    Detect,
}

impl ManagerSelection {
    fn accepts(&self, name: &str) -> bool {
        match self {
            Self::Named(expected) => expected == name,
            Self::Conventional => name == CACHE_MANAGER,
            Self::Detect => true,
        }
    }
}

/// Result of wiring: the bound manager and the resolver built for it
pub struct CacheManagerBinding {
    manager_name: String,
    manager: Arc<dyn CacheManager>,
    resolver: Arc<ExpiryAwareResolver>,
}

impl CacheManagerBinding {
    pub fn manager_name(&self) -> &str {
        &self.manager_name
    }

    pub fn manager(&self) -> &Arc<dyn CacheManager> {
        &self.manager
    }

    pub fn resolver(&self) -> &Arc<ExpiryAwareResolver> {
        &self.resolver
    }
}

#[derive(Default)]
struct WiringState {
    manager: Option<(String, Arc<dyn CacheManager>)>,
    interceptor: Option<Arc<dyn CacheInterceptor>>,
}

/// Startup processor binding the expiry resolver to a cache manager
pub struct ExpiryResolverProcessor {
    kind: ProviderKind,
    properties: ExpiryProperties,
    names: CacheNameDetector,
    selection: ManagerSelection,
    host: Arc<dyn ComponentHost>,
    state: Mutex<WiringState>,
    binding: OnceLock<CacheManagerBinding>,
}

impl ExpiryResolverProcessor {
    /// Validate the configuration against `host` and fix the manager selection
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::Configuration`] when neither the configured nor
    /// the conventional manager exists and auto-detection is disabled.
    pub fn new(
        kind: ProviderKind,
        properties: ExpiryProperties,
        names: CacheNameDetector,
        host: Arc<dyn ComponentHost>,
    ) -> ExpiryResult<Self> {
        let configured = properties
            .cache_manager_name()
            .filter(|name| host.manager_kind(name) == Some(kind));
        let conventional = host.manager_kind(CACHE_MANAGER) == Some(kind);

        let selection = match (configured, conventional) {
            (Some(name), _) => ManagerSelection::Named(name.to_string()),
            (None, true) => ManagerSelection::Conventional,
            (None, false) if properties.cache_manager.detect_cache_manager => ManagerSelection::Detect,
            (None, false) => {
                return Err(ExpiryError::Configuration(format!(
                    "no {kind} manager named by 'cache-manager-name' or '{CACHE_MANAGER}', and 'detect-cache-manager' is disabled"
                )));
            }
        };

        info!(kind = %kind, selection = ?selection, "Cache expiry resolver processor initialized");

        Ok(Self {
            kind,
            properties,
            names,
            selection,
            host,
            state: Mutex::new(WiringState::default()),
            binding: OnceLock::new(),
        })
    }

    /// Handle a component the host has finished initializing
    ///
    /// Once bound, every further call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the resolver cannot be built for the selected
    /// manager; the processor then stays unbound.
    pub fn on_component_available(&self, name: &str, component: Component) -> ExpiryResult<()> {
        if self.is_bound() {
            return Ok(());
        }

        let mut state = self.state.lock();
        if self.is_bound() {
            return Ok(());
        }

        match component {
            Component::CacheManager(manager) if state.manager.is_none() => {
                if !self.selection.accepts(name) {
                    return Ok(());
                }
                if !BackendAdapter::supports(self.kind, manager.as_ref()) {
                    if !matches!(self.selection, ManagerSelection::Detect) {
                        warn!(manager = %name, kind = %self.kind, "Selected cache manager has the wrong provider type, ignoring it");
                    }
                    return Ok(());
                }
                debug!(manager = %name, "Cache manager observed");
                state.manager = Some((name.to_string(), manager));
            }
            Component::Interceptor(interceptor) if state.interceptor.is_none() => {
                debug!(component = %name, "Cache interceptor observed");
                state.interceptor = Some(interceptor);
            }
            _ => return Ok(()),
        }

        let (Some((manager_name, manager)), Some(interceptor)) = (&state.manager, &state.interceptor) else {
            return Ok(());
        };

        let detect_name_resolver = self.properties.cache_resolver.detect_cache_name_resolver;
        let adapter =
            BackendAdapter::for_manager(self.kind, Arc::clone(manager), self.names.clone(), detect_name_resolver)?;
        let resolver = Arc::new(ExpiryAwareResolver::new(adapter));

        if !self.host.register_resolver(CACHE_RESOLVER, Arc::clone(&resolver)) {
            warn!(name = CACHE_RESOLVER, "Host refused the cache resolver registration");
        }
        if self.properties.cache_interceptor.inject_cache_resolver {
            let injected: Arc<dyn CacheResolver> = Arc::<ExpiryAwareResolver>::clone(&resolver);
            interceptor.set_cache_resolver(injected);
        }

        info!(manager = %manager_name, kind = %self.kind, "Cache expiry resolver bound");

        let binding = CacheManagerBinding {
            manager_name: manager_name.clone(),
            manager: Arc::clone(manager),
            resolver,
        };
        *state = WiringState::default();
        if self.binding.set(binding).is_err() {
            debug!("Cache expiry resolver already bound");
        }
        Ok(())
    }

    pub fn binding(&self) -> Option<&CacheManagerBinding> {
        self.binding.get()
    }

    pub fn resolver(&self) -> Option<Arc<ExpiryAwareResolver>> {
        self.binding().map(|binding| Arc::clone(&binding.resolver))
    }

    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    pub fn selection(&self) -> &ManagerSelection {
        &self.selection
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Priority among the host's startup processors, lower runs first
    pub fn order(&self) -> i32 {
        self.properties.cache_resolver.processor_order
    }
}
