// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::breaker::BreakerConfig;
use crate::cache::CacheConfig;

/// Configuration of a [`Wrapper`][crate::Wrapper].
///
/// The configuration is fixed once the wrapper is built. Each policy is enabled independently:
///
/// - `call_timeout`: zero disables the default deadline; calls can still set one through
///   [`with_timeout_deadline`][crate::with_timeout_deadline].
/// - `singleflight`: coalesces concurrent calls that share a non-empty key.
/// - `breaker` and `cache`: `None` disables the policy, `Some(Default::default())` enables it
///   with default settings, and any populated config enables it with those settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::{BreakerConfig, CacheConfig, Config};
///
/// let config = Config::default()
///     .with_call_timeout(Duration::from_millis(500))
///     .with_singleflight(true)
///     .with_breaker(BreakerConfig::default().with_min_requests(5))
///     .with_cache(CacheConfig::default());
///
/// assert!(config.breaker.is_some());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default))]
#[non_exhaustive]
pub struct Config {
    /// Default deadline of every call. Serialized in milliseconds.
    #[cfg_attr(any(feature = "serde", test), serde(with = "duration_serde::millis"))]
    pub call_timeout: Duration,

    /// Coalesces concurrent calls with the same key into one execution.
    pub singleflight: bool,

    /// Circuit breaker settings; `None` disables the breaker.
    pub breaker: Option<BreakerConfig>,

    /// Response cache settings; `None` disables the cache.
    pub cache: Option<CacheConfig>,
}

impl Config {
    /// Sets the default deadline of every call.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Enables or disables coalescing of concurrent calls.
    #[must_use]
    pub fn with_singleflight(mut self, enabled: bool) -> Self {
        self.singleflight = enabled;
        self
    }

    /// Enables the circuit breaker.
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Enables the response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn call_timeout(&self) -> Option<Duration> {
        (!self.call_timeout.is_zero()).then_some(self.call_timeout)
    }
}

/// Serde adapters that encode a [`Duration`] as a whole number of units.
#[cfg(any(feature = "serde", test))]
pub(crate) mod duration_serde {
    macro_rules! duration_unit {
        ($name:ident, $to:ident, $from:ident) => {
            pub(crate) mod $name {
                use std::time::Duration;

                use serde::{Deserialize, Deserializer, Serializer};

                pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_u64(u64::try_from(value.$to()).unwrap_or(u64::MAX))
                }

                pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
                    u64::deserialize(deserializer).map(Duration::$from)
                }
            }
        };
    }

    duration_unit!(millis, as_millis, from_millis);
    duration_unit!(secs, as_secs, from_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_disables_everything() {
        let config = Config::default();

        assert_eq!(config.call_timeout(), None);
        assert!(!config.singleflight);
        assert!(config.breaker.is_none());
        assert!(config.cache.is_none());
    }

    #[test]
    fn builders_enable_policies() {
        let config = Config::default()
            .with_call_timeout(Duration::from_millis(50))
            .with_singleflight(true)
            .with_breaker(BreakerConfig::default())
            .with_cache(CacheConfig::default());

        assert_eq!(config.call_timeout(), Some(Duration::from_millis(50)));
        assert!(config.singleflight);
        assert!(config.breaker.is_some());
        assert!(config.cache.is_some());
    }

    #[test]
    fn deserialize_uses_configured_units() {
        let config: Config = serde_json::from_str(
            r#"{
                "call_timeout": 250,
                "singleflight": true,
                "breaker": { "open_timeout": 10, "half_open_max_requests": 2 },
                "cache": {}
            }"#,
        )
        .unwrap();

        assert_eq!(config.call_timeout, Duration::from_millis(250));
        assert!(config.singleflight);

        let breaker = config.breaker.unwrap();
        assert_eq!(breaker.open_timeout, Duration::from_secs(10));
        assert_eq!(breaker.half_open_max_requests, 2);

        let cache = config.cache.unwrap();
        assert_eq!(cache.max_size, 0);
        assert_eq!(cache.ttl, Duration::ZERO);
    }

    #[test]
    fn missing_sections_stay_disabled() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert!(config.breaker.is_none());
        assert!(config.cache.is_none());
        assert_eq!(config.call_timeout, Duration::ZERO);
    }

    #[test]
    fn serialize_round_trips_units() {
        let config = Config::default()
            .with_call_timeout(Duration::from_millis(1500))
            .with_cache(CacheConfig::default().with_ttl(Duration::from_secs(30)));

        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["call_timeout"], 1500);
        assert_eq!(json["cache"]["ttl"], 30);
        assert!(json["breaker"].is_null());
    }
}
