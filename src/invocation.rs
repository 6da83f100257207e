//! Invocation Context
//!
//! Call-scoped, read-only metadata handed to the resolver by the interceptor
//! layer. The declarations on the method and on its target type arrive here
//! already parsed; the resolver never re-derives them.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::expiry::CacheExpiry;
use crate::traits::{CacheManager, CacheResolver};

/// Identity of the type a cached method is invoked on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetType {
    qualified_name: String,
    name_resolver: Option<String>,
}

impl TargetType {
    /// Target identified by a qualified name such as `com.x.Demo` or `app::service::Demo`
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            name_resolver: None,
        }
    }

    /// Target identified by a Rust type
    pub fn of<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// Type-level name-resolver reference, used when the method declares none
    #[must_use]
    pub fn with_name_resolver(mut self, name_resolver: impl Into<String>) -> Self {
        self.name_resolver = Some(name_resolver.into());
        self
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Last path segment of the qualified name, without generic arguments
    pub fn simple_name(&self) -> &str {
        let base = self
            .qualified_name
            .split('<')
            .next()
            .unwrap_or(&self.qualified_name);
        base.rsplit(['.', ':']).next().unwrap_or(base)
    }

    pub fn name_resolver(&self) -> Option<&str> {
        self.name_resolver.as_deref()
    }
}

/// A cached method and its expiry declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    expiry: Option<CacheExpiry>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiry: None,
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expiry: CacheExpiry) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expiry(&self) -> Option<&CacheExpiry> {
        self.expiry.as_ref()
    }
}

/// Kind of cache operation being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Cacheable,
    CachePut,
    CacheEvict,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cacheable => "Cacheable",
            Self::CachePut => "CachePut",
            Self::CacheEvict => "CacheEvict",
        })
    }
}

/// Declared cache operation with its explicit cache names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOperation {
    kind: OperationKind,
    cache_names: Vec<String>,
}

impl CacheOperation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            cache_names: Vec::new(),
        }
    }

    pub fn cacheable() -> Self {
        Self::new(OperationKind::Cacheable)
    }

    #[must_use]
    pub fn with_cache_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn cache_names(&self) -> &[String] {
        &self.cache_names
    }
}

/// Per-call context passed to cache resolvers
#[derive(Clone)]
pub struct InvocationContext {
    target: TargetType,
    method: MethodDescriptor,
    operation: CacheOperation,
    cache_resolver: Option<Arc<dyn CacheResolver>>,
    cache_manager: Option<Arc<dyn CacheManager>>,
}

impl InvocationContext {
    pub fn new(target: TargetType, method: MethodDescriptor, operation: CacheOperation) -> Self {
        Self {
            target,
            method,
            operation,
            cache_resolver: None,
            cache_manager: None,
        }
    }

    /// Call-scoped resolver that takes precedence over the expiry resolver
    #[must_use]
    pub fn with_cache_resolver(mut self, resolver: Arc<dyn CacheResolver>) -> Self {
        self.cache_resolver = Some(resolver);
        self
    }

    /// Call-scoped manager used instead of the bound one
    #[must_use]
    pub fn with_cache_manager(mut self, manager: Arc<dyn CacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn operation(&self) -> &CacheOperation {
        &self.operation
    }

    pub fn cache_resolver(&self) -> Option<&Arc<dyn CacheResolver>> {
        self.cache_resolver.as_ref()
    }

    pub fn cache_manager(&self) -> Option<&Arc<dyn CacheManager>> {
        self.cache_manager.as_ref()
    }

    /// Operation identity used in diagnostics, e.g. `Cacheable[com.x.Demo.run] caches=["a"]`
    pub fn describe(&self) -> String {
        format!(
            "{}[{}.{}] caches={:?}",
            self.operation.kind(),
            self.target.qualified_name(),
            self.method.name(),
            self.operation.cache_names()
        )
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("operation", &self.operation)
            .field("cache_resolver", &self.cache_resolver.is_some())
            .field("cache_manager", &self.cache_manager.as_ref().map(|m| m.name()))
            .finish()
    }
}
