// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker policy.

mod config;
mod constants;
mod engine;

use std::error::Error;
use std::fmt;

pub use config::{BreakerConfig, Whitelist};
use engine::{Engine, Enter, Outcome, Rejection, Transition};
use parking_lot::Mutex;

use crate::Clock;
use crate::error::CallError;
use crate::telemetry::{Event, Telemetry};

/// The observable state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitState {
    /// Calls flow through and their outcomes are counted.
    Closed,
    /// Calls are rejected without running.
    Open,
    /// A limited number of trial calls probe whether the upstream recovered.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs calls through the circuit state machine.
///
/// The engine lock is never held across an await point; time is read before it is taken.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    engine: Mutex<Engine>,
    whitelist: Whitelist,
    clock: Clock,
    telemetry: Telemetry,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig, clock: Clock, telemetry: Telemetry) -> Self {
        Self {
            engine: Mutex::new(Engine::new(config.resolve())),
            whitelist: config.whitelist.clone(),
            clock,
            telemetry,
        }
    }

    pub fn state(&self) -> CircuitState {
        let now = self.clock.instant();
        self.engine.lock().state(now)
    }

    /// Runs `work` unless the circuit rejects it and records the outcome.
    ///
    /// `Ok` and whitelisted upstream errors are successes; everything else, deadline expiry
    /// included, is a failure. Dropping the returned future before it completes releases any
    /// half-open trial slot without recording an outcome.
    pub async fn execute<T, E, F>(&self, work: F) -> Result<T, CallError<E>>
    where
        E: Error + 'static,
        F: Future<Output = Result<T, CallError<E>>>,
    {
        let mut attempt = self.enter::<E>()?;
        let result = work.await;
        attempt.exit(self.classify(&result));
        result
    }

    fn enter<E>(&self) -> Result<Attempt<'_>, CallError<E>> {
        let now = self.clock.instant();
        let enter = self.engine.lock().enter(now);

        match enter {
            Enter::Accepted { generation, half_opened } => {
                if half_opened {
                    self.telemetry.report(Event::CircuitHalfOpened);
                }
                Ok(Attempt {
                    breaker: self,
                    generation,
                    settled: false,
                })
            }
            Enter::Rejected(rejection) => {
                self.telemetry.report(Event::CircuitRejected);
                Err(match rejection {
                    Rejection::Open => CallError::CircuitOpen,
                    Rejection::TooManyProbes => CallError::TooManyProbes,
                })
            }
        }
    }

    fn classify<T, E: Error + 'static>(&self, result: &Result<T, CallError<E>>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(CallError::Upstream(error)) if self.whitelist.matches(error) => Outcome::Success,
            Err(_) => Outcome::Failure,
        }
    }

    fn exit(&self, generation: u64, outcome: Outcome) {
        let now = self.clock.instant();
        let transition = self.engine.lock().exit(generation, outcome, now);

        match transition {
            Transition::Unchanged => {}
            Transition::Opened | Transition::Reopened => self.telemetry.report(Event::CircuitOpened),
            Transition::Closed => self.telemetry.report(Event::CircuitClosed),
        }
    }
}

/// An admitted call. Dropping it unsettled records the call as abandoned.
#[derive(Debug)]
struct Attempt<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Attempt<'_> {
    fn exit(&mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.exit(self.generation, outcome);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.exit(self.generation, Outcome::Abandoned);
        }
    }
}
