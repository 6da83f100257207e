//! Cache name resolution
//!
//! Cache names come from one of three places, in order:
//!
//! 1. explicit names declared on the operation
//! 2. a name resolver referenced by the method's expiry declaration, or by its target type
//! 3. the globally registered default name resolver, when detection is enabled
//!
//! The default resolver, [`TargetClassNameResolver`], synthesizes
//! `[prefix]<TypeName>[:|.]<methodName>[suffix]`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::CacheNameResolverProperties;
use crate::invocation::InvocationContext;
use crate::traits::CacheNameResolver;

/// Placeholder standing for the target type name in a cache name
pub const TARGET_CLASS_TOKEN: &str = "#root.targetClass";
/// Placeholder standing for the method name in a cache name
pub const METHOD_NAME_TOKEN: &str = "#root.methodName";

/// Generates cache names from the target type and method of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetClassNameResolver {
    short_class_name: bool,
    include_method_name: bool,
    use_colon_separator: bool,
    resolve_template_tokens: bool,
    name_prefix: String,
    name_suffix: String,
}

impl Default for TargetClassNameResolver {
    fn default() -> Self {
        Self {
            short_class_name: false,
            include_method_name: true,
            use_colon_separator: true,
            resolve_template_tokens: false,
            name_prefix: String::new(),
            name_suffix: String::new(),
        }
    }
}

impl TargetClassNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(props: &CacheNameResolverProperties) -> Self {
        Self {
            short_class_name: props.short_class_name,
            include_method_name: props.include_method_name,
            use_colon_separator: props.use_colon_separator,
            resolve_template_tokens: props.resolve_template_tokens,
            name_prefix: props.name_prefix.clone(),
            name_suffix: props.name_suffix.clone(),
        }
    }

    #[must_use]
    pub fn short_class_name(mut self, enabled: bool) -> Self {
        self.short_class_name = enabled;
        self
    }

    #[must_use]
    pub fn include_method_name(mut self, enabled: bool) -> Self {
        self.include_method_name = enabled;
        self
    }

    #[must_use]
    pub fn use_colon_separator(mut self, enabled: bool) -> Self {
        self.use_colon_separator = enabled;
        self
    }

    /// Publish explicit names as templates, replacing the literal type and
    /// method names with [`TARGET_CLASS_TOKEN`] and [`METHOD_NAME_TOKEN`]
    #[must_use]
    pub fn resolve_template_tokens(mut self, enabled: bool) -> Self {
        self.resolve_template_tokens = enabled;
        self
    }

    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = suffix.into();
        self
    }

    fn class_name<'a>(&self, context: &'a InvocationContext) -> &'a str {
        if self.short_class_name {
            context.target().simple_name()
        } else {
            context.target().qualified_name()
        }
    }

    fn synthesize(&self, class_name: &str, method_name: &str) -> String {
        let mut name = String::with_capacity(
            self.name_prefix.len() + class_name.len() + method_name.len() + self.name_suffix.len() + 1,
        );
        name.push_str(&self.name_prefix);
        name.push_str(class_name);
        if self.include_method_name {
            name.push(if self.use_colon_separator { ':' } else { '.' });
            name.push_str(method_name);
        }
        name.push_str(&self.name_suffix);
        name
    }
}

impl CacheNameResolver for TargetClassNameResolver {
    fn cache_names(&self, context: &InvocationContext) -> Vec<String> {
        let class_name = self.class_name(context);
        let method_name = context.method().name();
        let explicit = context.operation().cache_names();

        if explicit.is_empty() {
            return vec![self.synthesize(class_name, method_name)];
        }
        if !self.resolve_template_tokens {
            return explicit.to_vec();
        }
        let replacements = [(class_name, TARGET_CLASS_TOKEN), (method_name, METHOD_NAME_TOKEN)];
        dedup(explicit.iter().map(|name| replace_literals(name, &replacements)))
    }
}

/// Named and default name resolvers available to the expiry resolver
#[derive(Default)]
pub struct NameResolverRegistry {
    named: DashMap<String, Arc<dyn CacheNameResolver>>,
    default_resolver: RwLock<Option<Arc<dyn CacheNameResolver>>>,
}

impl NameResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver that expiry declarations can reference by `name`
    pub fn register(&self, name: impl Into<String>, resolver: Arc<dyn CacheNameResolver>) {
        self.named.insert(name.into(), resolver);
    }

    /// Set the resolver used when a call references none
    pub fn set_default(&self, resolver: Arc<dyn CacheNameResolver>) {
        *self.default_resolver.write() = Some(resolver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CacheNameResolver>> {
        self.named.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn default_resolver(&self) -> Option<Arc<dyn CacheNameResolver>> {
        self.default_resolver.read().clone()
    }
}

/// Derives the cache names an expiry-aware resolver should materialize
#[derive(Clone)]
pub struct CacheNameDetector {
    registry: Arc<NameResolverRegistry>,
    placeholders: Option<PlaceholderPolicy>,
}

/// How placeholder tokens in explicit names are rewritten to runtime names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderPolicy {
    /// Substitute the simple type name rather than the qualified one
    pub short_class_name: bool,
}

impl CacheNameDetector {
    pub fn new(registry: Arc<NameResolverRegistry>) -> Self {
        Self {
            registry,
            placeholders: None,
        }
    }

    /// Rewrite [`TARGET_CLASS_TOKEN`] and [`METHOD_NAME_TOKEN`] in explicit names
    #[must_use]
    pub fn with_placeholders(mut self, policy: PlaceholderPolicy) -> Self {
        self.placeholders = Some(policy);
        self
    }

    pub fn registry(&self) -> &Arc<NameResolverRegistry> {
        &self.registry
    }

    /// Cache names for `context`
    ///
    /// Returns `None` when nothing names the caches: no explicit names, no
    /// resolvable name-resolver reference, and no default resolver (or
    /// `detect_resolver` off). A reference to an unregistered resolver is a
    /// soft miss, not an error. Duplicate names are dropped, keeping first occurrences.
    pub fn detect(&self, context: &InvocationContext, detect_resolver: bool) -> Option<Vec<String>> {
        let explicit = context.operation().cache_names();
        if !explicit.is_empty() {
            return Some(match self.placeholders {
                Some(policy) => self.substitute(context, explicit, policy),
                None => dedup(explicit.iter().cloned()),
            });
        }

        let reference = context
            .method()
            .expiry()
            .and_then(|expiry| expiry.name_resolver.as_deref())
            .filter(|name| !name.trim().is_empty())
            .or_else(|| context.target().name_resolver().filter(|name| !name.trim().is_empty()));

        match reference {
            Some(name) => match self.registry.get(name) {
                Some(resolver) => Some(resolver.cache_names(context)),
                None => {
                    warn!(name_resolver = %name, operation = %context.describe(), "Cache name resolver not registered, skipping expiry");
                    None
                }
            },
            None if detect_resolver => {
                let resolver = self.registry.default_resolver()?;
                let names = resolver.cache_names(context);
                debug!(names = ?names, "Cache names generated by default name resolver");
                Some(names)
            }
            None => None,
        }
    }

    fn substitute(&self, context: &InvocationContext, names: &[String], policy: PlaceholderPolicy) -> Vec<String> {
        let target = context.target();
        let class_name = if policy.short_class_name {
            target.simple_name()
        } else {
            target.qualified_name()
        };
        let replacements = [(TARGET_CLASS_TOKEN, class_name), (METHOD_NAME_TOKEN, context.method().name())];
        dedup(names.iter().map(|name| replace_literals(name, &replacements)))
    }
}

/// Replace every occurrence of each `from` with its `to` in a single left-to-right pass
///
/// At each position the longest matching `from` wins; replaced text is never rescanned.
fn replace_literals(text: &str, replacements: &[(&str, &str)]) -> String {
    let mut ordered: Vec<&(&str, &str)> = replacements.iter().filter(|(from, _)| !from.is_empty()).collect();
    ordered.sort_by_key(|(from, _)| std::cmp::Reverse(from.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (from, to) in &ordered {
            if let Some(tail) = rest.strip_prefix(*from) {
                out.push_str(to);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    out
}

fn dedup(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
