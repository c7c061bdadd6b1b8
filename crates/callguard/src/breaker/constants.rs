// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default time the circuit stays open before admitting trial calls.
pub(crate) const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of trial calls admitted while half-open. The same number of successful
/// trials closes the circuit again.
pub(crate) const DEFAULT_HALF_OPEN_MAX_REQUESTS: u32 = 1;

/// Default failure ratio, in `(0, 1]`, that trips a closed circuit.
pub(crate) const DEFAULT_FAILURE_RATIO_THRESHOLD: f64 = 0.7;

/// Default number of completed calls required before the failure ratio is evaluated.
pub(crate) const DEFAULT_MIN_REQUESTS: u32 = 10;
