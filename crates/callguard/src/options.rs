// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::fn_wrapper::define_fn_wrapper;

/// Per-call overrides of the wrapper configuration.
///
/// The record starts empty and is filled by applying the [`CallOption`]s passed to
/// [`Wrapper::call`][crate::Wrapper::call] in order; a later option overrides an earlier one
/// that touches the same field. A zero duration is the same as not setting the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    timeout: Option<Duration>,
    cache_ttl: Option<Duration>,
}

impl CallOptions {
    /// Builds the record by applying `options` left to right.
    pub fn from_options(options: impl IntoIterator<Item = CallOption>) -> Self {
        let mut record = Self::default();
        for option in options {
            option.call(&mut record);
        }
        record
    }

    /// The deadline override, if set to a non-zero duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }

    /// The cache TTL override, if set to a non-zero duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl.filter(|ttl| !ttl.is_zero())
    }
}

define_fn_wrapper!(
    /// A mutator applied to the [`CallOptions`] of a single call.
    ///
    /// Create options with [`with_timeout_deadline`] and [`with_cache_ttl`].
    pub CallOption(Fn(options: &mut CallOptions) -> ())
);

/// Overrides the wrapper's call timeout for one call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::{CallOptions, with_timeout_deadline};
///
/// let options = CallOptions::from_options([
///     with_timeout_deadline(Duration::from_millis(100)),
///     with_timeout_deadline(Duration::from_millis(250)),
/// ]);
///
/// assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
/// ```
#[must_use]
pub fn with_timeout_deadline(timeout: Duration) -> CallOption {
    CallOption::new(move |options| options.timeout = Some(timeout))
}

/// Overrides the cache's default TTL for the entry written by one call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::{CallOptions, with_cache_ttl};
///
/// let options = CallOptions::from_options([with_cache_ttl(Duration::from_secs(30))]);
///
/// assert_eq!(options.cache_ttl(), Some(Duration::from_secs(30)));
/// ```
#[must_use]
pub fn with_cache_ttl(ttl: Duration) -> CallOption {
    CallOption::new(move |options| options.cache_ttl = Some(ttl))
}
