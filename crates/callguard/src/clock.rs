// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

#[cfg(any(feature = "test-util", test))]
use std::sync::Arc;

#[cfg(any(feature = "test-util", test))]
use parking_lot::Mutex;

/// Source of monotonic time for the cache and circuit breaker policies.
///
/// Cache entry expiry and the circuit breaker open timeout are measured against the clock
/// handed to [`WrapperBuilder::clock`][crate::WrapperBuilder::clock]. In production this is
/// the system clock. In tests, enable the `test-util` feature and drive time through
/// [`ClockControl`] instead of sleeping.
///
/// Cloning a clock is cheap and every clone observes the same time.
///
/// Deadlines are not measured with this clock; they are enforced by the Tokio timer.
///
/// # Examples
///
/// ```
/// use callguard::Clock;
///
/// let clock = Clock::system();
/// let earlier = clock.instant();
///
/// assert!(clock.instant() >= earlier);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Clock(Source);

#[derive(Debug, Clone, Default)]
enum Source {
    #[default]
    System,
    #[cfg(any(feature = "test-util", test))]
    Controlled(ClockControl),
}

impl Clock {
    /// Creates a clock that reads the system monotonic time.
    #[must_use]
    pub fn system() -> Self {
        Self(Source::System)
    }

    /// Returns the current instant.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            Source::System => Instant::now(),
            #[cfg(any(feature = "test-util", test))]
            Source::Controlled(control) => control.instant(),
        }
    }
}

impl AsRef<Self> for Clock {
    fn as_ref(&self) -> &Self {
        self
    }
}

/// An instant far enough ahead of `now` to never be reached by a running process.
///
/// Stands in for `now + duration` when the sum is not representable.
pub(crate) fn far_future(now: Instant) -> Instant {
    // roughly 30 years
    now.checked_add(Duration::from_secs(86_400 * 365 * 30)).unwrap_or(now)
}

/// Controls the flow of time in tests.
///
/// A clock created by [`ClockControl::to_clock`] is frozen: its time moves only when
/// [`advance`][ClockControl::advance] is called. All clocks created from the same control,
/// and all clones of those clocks, observe the same time.
///
/// Only enable the `test-util` feature for `dev-dependencies`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let before = clock.instant();
/// control.advance(Duration::from_secs(5));
///
/// assert_eq!(clock.instant() - before, Duration::from_secs(5));
/// ```
#[cfg(any(feature = "test-util", test))]
#[derive(Debug, Clone)]
pub struct ClockControl {
    state: Arc<Mutex<Instant>>,
}

#[cfg(any(feature = "test-util", test))]
impl ClockControl {
    /// Creates a control starting at the current system instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Moves the time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.state.lock();
        *now += duration;
    }

    /// Converts the control to a [`Clock`] that follows it.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock(Source::Controlled(self.clone()))
    }

    fn instant(&self) -> Instant {
        *self.state.lock()
    }
}

#[cfg(any(feature = "test-util", test))]
impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}
