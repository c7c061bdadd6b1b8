// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Instant;

use super::CircuitState;
use super::config::BreakerOptions;
use crate::clock::far_future;

/// The circuit state machine.
///
/// The engine holds no clock; callers read the time outside of any lock and pass it in. Every
/// state change bumps the generation so that outcomes of calls admitted before the change are
/// ignored.
#[derive(Debug)]
pub(crate) struct Engine {
    options: BreakerOptions,
    state: State,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { requests: u32, failures: u32 },
    Open { open_until: Instant },
    HalfOpen { admitted: u32, successes: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enter {
    Accepted { generation: u64, half_opened: bool },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Open,
    TooManyProbes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    /// The call was dropped before it completed.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Unchanged,
    Opened,
    Reopened,
    Closed,
}

impl Engine {
    pub fn new(options: BreakerOptions) -> Self {
        Self {
            options,
            state: State::Closed { requests: 0, failures: 0 },
            generation: 0,
        }
    }

    pub fn state(&self, now: Instant) -> CircuitState {
        match self.state {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { open_until } if now >= open_until => CircuitState::HalfOpen,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn enter(&mut self, now: Instant) -> Enter {
        match self.state {
            State::Closed { .. } => Enter::Accepted {
                generation: self.generation,
                half_opened: false,
            },
            State::Open { open_until } if now >= open_until => {
                self.transition(State::HalfOpen { admitted: 0, successes: 0 });
                self.admit_trial(true)
            }
            State::Open { .. } => Enter::Rejected(Rejection::Open),
            State::HalfOpen { .. } => self.admit_trial(false),
        }
    }

    pub fn exit(&mut self, generation: u64, outcome: Outcome, now: Instant) -> Transition {
        if generation != self.generation {
            return Transition::Unchanged;
        }

        match (&mut self.state, outcome) {
            (State::HalfOpen { admitted, .. }, Outcome::Abandoned) => {
                *admitted = admitted.saturating_sub(1);
                Transition::Unchanged
            }
            (_, Outcome::Abandoned) | (State::Open { .. }, _) => Transition::Unchanged,
            (State::Closed { requests, failures }, outcome) => {
                *requests = requests.saturating_add(1);
                if outcome == Outcome::Failure {
                    *failures = failures.saturating_add(1);
                }

                if self.options.should_trip(*requests, *failures) {
                    self.open(now);
                    Transition::Opened
                } else {
                    Transition::Unchanged
                }
            }
            (State::HalfOpen { successes, .. }, Outcome::Success) => {
                *successes = successes.saturating_add(1);

                if *successes >= self.options.half_open_max_requests {
                    self.transition(State::Closed { requests: 0, failures: 0 });
                    Transition::Closed
                } else {
                    Transition::Unchanged
                }
            }
            (State::HalfOpen { .. }, Outcome::Failure) => {
                self.open(now);
                Transition::Reopened
            }
        }
    }

    fn admit_trial(&mut self, half_opened: bool) -> Enter {
        if let State::HalfOpen { admitted, .. } = &mut self.state {
            if *admitted >= self.options.half_open_max_requests {
                return Enter::Rejected(Rejection::TooManyProbes);
            }
            *admitted += 1;
        }

        Enter::Accepted {
            generation: self.generation,
            half_opened,
        }
    }

    fn open(&mut self, now: Instant) {
        let open_until = now.checked_add(self.options.open_timeout).unwrap_or_else(|| far_future(now));
        self.transition(State::Open { open_until });
    }

    fn transition(&mut self, state: State) {
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }
}
