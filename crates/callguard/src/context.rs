// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;

/// The operation context handed to the work of a [`Wrapper::call`][crate::Wrapper::call].
///
/// A context carries the deadline of a call, if any. Callers may pass their own context into
/// a call to impose an outer deadline; the wrapper then derives a child context whose deadline
/// is the earlier of the outer deadline and the effective call timeout. The derived context is
/// handed to the work so it can bound its own I/O by [`remaining`][CallContext::remaining].
///
/// Cancellation is expressed the Rust way: when the deadline elapses, the work's future is
/// dropped at its next suspension point.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::CallContext;
///
/// let background = CallContext::background();
/// assert!(background.deadline().is_none());
///
/// let bounded = CallContext::with_timeout(Duration::from_secs(2));
/// assert!(bounded.remaining().unwrap() <= Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline) }
    }

    /// A context that expires `timeout` from now.
    ///
    /// A timeout too large to be represented as an instant yields a context with no deadline.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or_else(Self::background, Self::with_deadline)
    }

    /// The instant at which the context expires, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The time left until the deadline, if any. Returns zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= Instant::now())
    }

    /// Derives a child context bounded by both this context and `timeout`.
    pub(crate) fn child(self, timeout: Option<Duration>) -> Self {
        let Some(timeout) = timeout else {
            return self;
        };

        // unrepresentable timeouts never expire, so the parent bound is all that is left
        let Some(candidate) = Instant::now().checked_add(timeout) else {
            return self;
        };
        let deadline = match self.deadline {
            Some(parent) => parent.min(candidate),
            None => candidate,
        };

        Self::with_deadline(deadline)
    }
}
