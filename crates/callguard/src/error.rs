// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The error returned by [`Wrapper::call`][crate::Wrapper::call].
///
/// Each variant maps to a different recovery strategy, so callers can branch on the kind
/// of failure:
///
/// - [`Upstream`][CallError::Upstream]: the work itself failed; the error is passed through
///   untouched.
/// - [`DeadlineExceeded`][CallError::DeadlineExceeded]: the call ran out of time before the
///   work completed.
/// - [`CircuitOpen`][CallError::CircuitOpen] and [`TooManyProbes`][CallError::TooManyProbes]:
///   the circuit breaker rejected the call and the work was never invoked.
///
/// # Examples
///
/// ```
/// use callguard::CallError;
///
/// # #[derive(Debug, Clone, thiserror::Error)]
/// # #[error("not found")]
/// # struct NotFound;
/// fn describe(error: &CallError<NotFound>) -> &'static str {
///     if error.is_circuit_rejection() {
///         "upstream is being protected, use a fallback"
///     } else if error.is_deadline_exceeded() {
///         "too slow, maybe retry later"
///     } else {
///         "upstream failed"
///     }
/// }
///
/// assert_eq!(describe(&CallError::CircuitOpen), "upstream is being protected, use a fallback");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CallError<E> {
    /// The work returned an error.
    #[error(transparent)]
    Upstream(E),

    /// The deadline elapsed before the work completed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,

    /// The circuit breaker is open and rejected the call.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The circuit breaker is half-open and all trial slots are taken.
    #[error("circuit breaker is half-open and has no trial capacity left")]
    TooManyProbes,
}

impl<E> CallError<E> {
    /// Returns `true` if the work itself failed.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Returns `true` if the call ran out of time.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// Returns `true` if the circuit breaker rejected the call without running the work.
    #[must_use]
    pub fn is_circuit_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::TooManyProbes)
    }

    /// Returns the upstream error, if the work failed.
    #[must_use]
    pub fn upstream(&self) -> Option<&E> {
        match self {
            Self::Upstream(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes the error and returns the upstream error, if the work failed.
    #[must_use]
    pub fn into_upstream(self) -> Option<E> {
        match self {
            Self::Upstream(error) => Some(error),
            _ => None,
        }
    }
}
