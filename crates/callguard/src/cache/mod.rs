// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Response cache policy.

mod config;

use std::fmt;
use std::time::{Duration, Instant};

pub use config::CacheConfig;
use moka::sync::Cache;

use crate::Clock;
use crate::clock::far_future;

/// A bounded map from call keys to successful results.
///
/// Entries expire lazily: an entry past its expiry is never returned, and is overwritten by the
/// next successful call with the same key or evicted when the cache is full.
pub(crate) struct ResponseCache<T> {
    store: Cache<String, Entry<T>>,
    default_ttl: Duration,
    clock: Clock,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig, clock: Clock) -> Self {
        Self {
            store: Cache::builder().max_capacity(config.max_size_or_default()).build(),
            default_ttl: config.ttl_or_default(),
            clock,
        }
    }

    /// Returns a clone of the fresh value stored under `key`.
    pub fn get(&self, key: &str) -> Option<T> {
        let entry = self.store.get(key)?;
        (entry.expires_at > self.clock.instant()).then_some(entry.value)
    }

    /// Stores `value` under `key` for `ttl`, or for the configured TTL when `None`.
    pub fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        let now = self.clock.instant();
        let expires_at = now
            .checked_add(ttl.unwrap_or(self.default_ttl))
            .unwrap_or_else(|| far_future(now));

        self.store.insert(key.to_owned(), Entry { value, expires_at });
    }

    #[cfg(test)]
    fn entry_count(&self) -> u64 {
        self.store.run_pending_tasks();
        self.store.entry_count()
    }
}

impl<T> fmt::Debug for ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.store.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClockControl;

    fn cache(control: &ClockControl) -> ResponseCache<String> {
        ResponseCache::new(&CacheConfig::default().with_ttl(Duration::from_secs(10)), control.to_clock())
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(ResponseCache<String>: Send, Sync, std::fmt::Debug);
    }

    #[test]
    fn get_missing_returns_none() {
        let control = ClockControl::new();

        assert_eq!(cache(&control).get("missing"), None);
    }

    #[test]
    fn set_then_get() {
        let control = ClockControl::new();
        let cache = cache(&control);

        cache.set("user:1", "alice".to_string(), None);

        assert_eq!(cache.get("user:1").as_deref(), Some("alice"));
    }

    #[test]
    fn entry_expires_after_default_ttl() {
        let control = ClockControl::new();
        let cache = cache(&control);
        cache.set("user:1", "alice".to_string(), None);

        control.advance(Duration::from_secs(9));
        assert!(cache.get("user:1").is_some());

        control.advance(Duration::from_secs(1));
        assert_eq!(cache.get("user:1"), None);
    }

    #[test]
    fn explicit_ttl_overrides_default() {
        let control = ClockControl::new();
        let cache = cache(&control);
        cache.set("short", "a".to_string(), Some(Duration::from_secs(1)));
        cache.set("long", "b".to_string(), Some(Duration::from_secs(60)));

        control.advance(Duration::from_secs(30));

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long").as_deref(), Some("b"));
    }

    #[test]
    fn set_overwrites_expired_entry() {
        let control = ClockControl::new();
        let cache = cache(&control);
        cache.set("user:1", "alice".to_string(), None);
        control.advance(Duration::from_secs(11));

        cache.set("user:1", "bob".to_string(), None);

        assert_eq!(cache.get("user:1").as_deref(), Some("bob"));
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let control = ClockControl::new();
        let cache = cache(&control);

        cache.set("forever", "x".to_string(), Some(Duration::MAX));
        control.advance(Duration::from_secs(86_400));

        assert_eq!(cache.get("forever").as_deref(), Some("x"));
    }

    #[test]
    fn capacity_is_bounded() {
        let control = ClockControl::new();
        let cache = ResponseCache::new(&CacheConfig::default().with_max_size(10), control.to_clock());

        for index in 0..100 {
            cache.set(&format!("key:{index}"), index, None);
        }

        assert!(cache.entry_count() <= 10);
    }
}
