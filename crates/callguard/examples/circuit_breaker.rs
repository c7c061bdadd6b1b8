// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker example that simulates a service outage:
//!
//! 1. Failures are counted while the circuit is closed.
//! 2. The circuit opens once the failure ratio crosses the threshold and calls are rejected.
//! 3. After the open timeout a trial call probes whether the service recovered.
//! 4. A successful trial closes the circuit again.

use std::time::Duration;

use callguard::{BreakerConfig, CallContext, Config, Whitelist, Wrapper};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// The service fails every request before this attempt
const RECOVERS_AT: u32 = 12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum InventoryError {
    #[error("item not found")]
    NotFound,
    #[error("inventory service unavailable")]
    Unavailable,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let breaker = BreakerConfig::default()
        .with_min_requests(4)
        .with_failure_ratio_threshold(0.5)
        .with_open_timeout(Duration::from_millis(500))
        // a missing item is a valid answer, not a sign of an unhealthy service
        .with_whitelist(Whitelist::new().with_error(InventoryError::NotFound));

    let wrapper = Wrapper::<u32, InventoryError>::builder(Config::default().with_breaker(breaker))
        .name("inventory")
        .enable_logs()
        .build();

    for attempt in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;

        let result = wrapper.call(None, "", move |ctx| check_stock(ctx, attempt), []).await;
        let state = wrapper.circuit_state().map_or("disabled", |state| state.as_str());

        match result {
            Ok(stock) => println!("{attempt} [{state}]: {stock} in stock"),
            Err(e) if e.is_circuit_rejection() => println!("{attempt} [{state}]: rejected, {e}"),
            Err(e) => println!("{attempt} [{state}]: {e}"),
        }
    }
}

async fn check_stock(_ctx: CallContext, attempt: u32) -> Result<u32, InventoryError> {
    if attempt >= RECOVERS_AT {
        return Ok(attempt * 10);
    }

    if attempt % 5 == 0 {
        Err(InventoryError::NotFound)
    } else {
        Err(InventoryError::Unavailable)
    }
}
