//! TTL directives declared on cached methods

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::invocation::MethodDescriptor;

const NANOS_PER_SEC: u128 = 1_000_000_000;
/// Average Gregorian year, in seconds
const SECONDS_PER_YEAR: u128 = 31_556_952;

/// Unit a TTL amount is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
    Hours,
    HalfDays,
    Days,
    Weeks,
    /// A twelfth of an average Gregorian year
    Months,
    Years,
    Decades,
    Centuries,
    Millennia,
    /// A billion years
    Eras,
    /// Entries never expire
    Forever,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds, `None` for [`TimeUnit::Forever`]
    fn nanos(self) -> Option<u128> {
        let seconds = match self {
            Self::Nanos => return Some(1),
            Self::Micros => return Some(1_000),
            Self::Millis => return Some(1_000_000),
            Self::Forever => return None,
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::HalfDays => 43_200,
            Self::Days => 86_400,
            Self::Weeks => 604_800,
            Self::Months => SECONDS_PER_YEAR / 12,
            Self::Years => SECONDS_PER_YEAR,
            Self::Decades => SECONDS_PER_YEAR * 10,
            Self::Centuries => SECONDS_PER_YEAR * 100,
            Self::Millennia => SECONDS_PER_YEAR * 1_000,
            Self::Eras => SECONDS_PER_YEAR * 1_000_000_000,
        };
        Some(seconds * NANOS_PER_SEC)
    }
}

/// Expiry declaration attached to a cached method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheExpiry {
    pub ttl: i64,
    pub unit: TimeUnit,
    /// Name of a registered name resolver, used when the call has no explicit cache names
    #[serde(default)]
    pub name_resolver: Option<String>,
}

impl CacheExpiry {
    pub fn new(ttl: i64, unit: TimeUnit) -> Self {
        Self {
            ttl,
            unit,
            name_resolver: None,
        }
    }

    pub fn seconds(ttl: i64) -> Self {
        Self::new(ttl, TimeUnit::Seconds)
    }

    #[must_use]
    pub fn with_name_resolver(mut self, name_resolver: impl Into<String>) -> Self {
        self.name_resolver = Some(name_resolver.into());
        self
    }

    /// Requested entry lifetime
    ///
    /// `None` when the amount is not positive, the unit is
    /// [`TimeUnit::Forever`], or the product does not fit in a [`Duration`].
    pub fn period(&self) -> Option<Duration> {
        let amount = u128::try_from(self.ttl).ok().filter(|amount| *amount > 0)?;
        let total = self.unit.nanos()?.checked_mul(amount)?;
        let Ok(secs) = u64::try_from(total / NANOS_PER_SEC) else {
            warn!(ttl = self.ttl, unit = ?self.unit, "Cache expiry overflows, ignoring it");
            return None;
        };
        let nanos = u32::try_from(total % NANOS_PER_SEC).ok()?;
        Some(Duration::new(secs, nanos))
    }
}

/// Extract the TTL declared on `method`, if any
pub fn detect_cache_period(method: &MethodDescriptor) -> Option<Duration> {
    method.expiry().and_then(CacheExpiry::period)
}
