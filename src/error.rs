//! Error types for cache expiry resolution
//!
//! Every failure raised by the resolver core is synchronous and reaches the
//! caller of the per-call resolution entry point unchanged. Nothing here is
//! retried internally.

use thiserror::Error;

use crate::traits::ProviderKind;

/// Errors raised while wiring or resolving expiry-aware caches
#[derive(Debug, Error)]
pub enum ExpiryError {
    /// No usable cache manager can be resolved at startup.
    ///
    /// Raised when neither a configured nor a conventionally named manager
    /// exists and auto-detection is disabled. Aborts wiring of this subsystem only.
    #[error("no cache manager resolvable: {0}")]
    Configuration(String),

    /// The effective cache manager is not the provider kind the adapter requires
    #[error("cache manager '{manager}' ({actual}) cannot be used by the {expected} cache resolver")]
    TypeMismatch {
        expected: ProviderKind,
        actual: ProviderKind,
        manager: String,
    },

    /// A resolved cache name could neither be created nor fetched
    #[error("cannot find/create cache '{cache}' with operation {operation}")]
    Resolution { cache: String, operation: String },

    /// A cache provider failed while reading or writing a resolved cache
    #[error("cache backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Result alias for resolver operations
pub type ExpiryResult<T> = std::result::Result<T, ExpiryError>;
