// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::error::Error;
use std::time::Duration;

use super::constants::*;
use crate::fn_wrapper::define_fn_wrapper;

/// Circuit breaker settings.
///
/// Every field falls back to its default when left at zero or set out of range, so
/// `BreakerConfig::default()` enables the breaker with default behavior:
///
/// | Field | Default |
/// |---|---|
/// | `open_timeout` | 60 seconds |
/// | `half_open_max_requests` | 1 |
/// | `failure_ratio_threshold` | 0.7, valid range `(0, 1]` |
/// | `min_requests` | 10 |
/// | `whitelist` | empty |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::{BreakerConfig, Whitelist};
///
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("not found")]
/// # struct NotFound;
/// let config = BreakerConfig::default()
///     .with_open_timeout(Duration::from_secs(10))
///     .with_half_open_max_requests(2)
///     .with_failure_ratio_threshold(0.5)
///     .with_min_requests(5)
///     .with_whitelist(Whitelist::new().with_type::<NotFound>());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default))]
#[non_exhaustive]
pub struct BreakerConfig {
    /// How long the circuit stays open before the next call is let through as a trial.
    /// Serialized in seconds.
    #[cfg_attr(any(feature = "serde", test), serde(with = "crate::config::duration_serde::secs"))]
    pub open_timeout: Duration,

    /// The maximum number of concurrent trial calls while half-open. This many successful
    /// trials close the circuit.
    pub half_open_max_requests: u32,

    /// The failure ratio that opens a closed circuit once `min_requests` calls completed.
    pub failure_ratio_threshold: f64,

    /// The minimum number of completed calls before the failure ratio is evaluated.
    pub min_requests: u32,

    /// Errors that count as successes for the breaker. They are still returned to the caller.
    #[cfg_attr(any(feature = "serde", test), serde(skip))]
    pub whitelist: Whitelist,
}

impl BreakerConfig {
    /// Sets how long the circuit stays open.
    #[must_use]
    pub fn with_open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// Sets the half-open trial budget.
    #[must_use]
    pub fn with_half_open_max_requests(mut self, max_requests: u32) -> Self {
        self.half_open_max_requests = max_requests;
        self
    }

    /// Sets the failure ratio that trips the circuit.
    #[must_use]
    pub fn with_failure_ratio_threshold(mut self, threshold: f64) -> Self {
        self.failure_ratio_threshold = threshold;
        self
    }

    /// Sets the minimum number of completed calls before the circuit may trip.
    #[must_use]
    pub fn with_min_requests(mut self, min_requests: u32) -> Self {
        self.min_requests = min_requests;
        self
    }

    /// Sets the errors that count as successes.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub(crate) fn resolve(&self) -> BreakerOptions {
        let threshold = self.failure_ratio_threshold;

        BreakerOptions {
            open_timeout: if self.open_timeout.is_zero() {
                DEFAULT_OPEN_TIMEOUT
            } else {
                self.open_timeout
            },
            half_open_max_requests: if self.half_open_max_requests == 0 {
                DEFAULT_HALF_OPEN_MAX_REQUESTS
            } else {
                self.half_open_max_requests
            },
            failure_ratio_threshold: if threshold > 0.0 && threshold <= 1.0 {
                threshold
            } else {
                DEFAULT_FAILURE_RATIO_THRESHOLD
            },
            min_requests: if self.min_requests == 0 {
                DEFAULT_MIN_REQUESTS
            } else {
                self.min_requests
            },
        }
    }
}

/// Normalized breaker settings with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BreakerOptions {
    pub open_timeout: Duration,
    pub half_open_max_requests: u32,
    pub failure_ratio_threshold: f64,
    pub min_requests: u32,
}

impl BreakerOptions {
    pub fn should_trip(&self, requests: u32, failures: u32) -> bool {
        requests >= self.min_requests && f64::from(failures) / f64::from(requests) >= self.failure_ratio_threshold
    }
}

define_fn_wrapper!(ErrorMatcher(Fn(error: &(dyn Error + 'static)) -> bool));

/// Errors that the circuit breaker records as successful calls.
///
/// A whitelisted error does not push the breaker toward opening, but it is still returned to
/// the caller. A typical use is a "not found" error from a healthy upstream.
///
/// Each matcher is tried against the error and every error in its [`source`][Error::source]
/// chain.
///
/// # Examples
///
/// ```
/// use callguard::Whitelist;
///
/// #[derive(Debug, PartialEq, thiserror::Error)]
/// enum RepoError {
///     #[error("no rows")]
///     NoRows,
///     #[error("connection reset")]
///     Reset,
/// }
///
/// let whitelist = Whitelist::new().with_error(RepoError::NoRows);
///
/// assert!(whitelist.matches(&RepoError::NoRows));
/// assert!(!whitelist.matches(&RepoError::Reset));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    matchers: Vec<ErrorMatcher>,
}

impl Whitelist {
    /// Creates an empty whitelist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelists every error of type `T`.
    #[must_use]
    pub fn with_type<T: Error + 'static>(self) -> Self {
        self.with_fn(|error| error.is::<T>())
    }

    /// Whitelists errors equal to `expected`.
    #[must_use]
    pub fn with_error<T>(self, expected: T) -> Self
    where
        T: Error + PartialEq + Send + Sync + 'static,
    {
        self.with_fn(move |error| error.downcast_ref::<T>().is_some_and(|error| *error == expected))
    }

    /// Whitelists errors accepted by `predicate`.
    #[must_use]
    pub fn with_fn(mut self, predicate: impl Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static) -> Self {
        self.matchers.push(ErrorMatcher::new(predicate));
        self
    }

    /// Returns `true` if no matchers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Returns `true` if `error`, or any error in its source chain, is whitelisted.
    #[must_use]
    pub fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        if self.matchers.is_empty() {
            return false;
        }

        std::iter::successors(Some(error), |&error| error.source()).any(|link| self.matchers.iter().any(|matcher| matcher.call(link)))
    }
}
