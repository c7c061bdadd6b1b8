// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default maximum number of cached entries.
pub(crate) const DEFAULT_MAX_SIZE: u64 = 5000;

/// Default lifetime of a cached entry.
pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(1);

/// Response cache settings.
///
/// Zero values fall back to the defaults: 5000 entries and a TTL of one second. When the cache
/// is full, the least valuable entries are evicted using the `TinyLFU` policy.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_max_size(10_000)
///     .with_ttl(Duration::from_secs(30));
///
/// assert_eq!(config.max_size, 10_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default))]
#[non_exhaustive]
pub struct CacheConfig {
    /// Maximum number of entries held by the cache.
    pub max_size: u64,

    /// Default lifetime of a cached entry. Serialized in seconds.
    #[cfg_attr(any(feature = "serde", test), serde(with = "crate::config::duration_serde::secs"))]
    pub ttl: Duration,
}

impl CacheConfig {
    /// Sets the maximum number of entries.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the default entry lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn max_size_or_default(&self) -> u64 {
        if self.max_size == 0 { DEFAULT_MAX_SIZE } else { self.max_size }
    }

    pub(crate) fn ttl_or_default(&self) -> Duration {
        if self.ttl.is_zero() { DEFAULT_TTL } else { self.ttl }
    }
}
