// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "test-util", feature = "logs", feature = "metrics")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "feature-gated items are linked from the crate docs"
    )
)]

//! Deadlines, coalescing, caching and circuit breaking for fallible async calls.
//!
//! A [`Wrapper`] decorates calls to a remote dependency with up to four independent policies,
//! each enabled through its [`Config`]:
//!
//! - **Deadline**: bounds how long the caller waits for the work, see
//!   [`Config::with_call_timeout`] and [`with_timeout_deadline`].
//! - **Coalescing**: concurrent calls sharing a key run the work once and all receive the same
//!   result, see [`Config::with_singleflight`].
//! - **Caching**: successful results are kept for a time-to-live and served without running the
//!   work again, see [`CacheConfig`] and [`with_cache_ttl`].
//! - **Circuit breaking**: a failing dependency is cut off for a cool-down period and then
//!   probed for recovery, see [`BreakerConfig`].
//!
//! The policies compose in a fixed order. A cache hit returns before anything else runs. On a
//! miss, the work runs under the deadline, guarded by the circuit breaker, and coalesced with
//! concurrent calls for the same key. Only successful results are cached. An empty key opts a
//! call out of caching and coalescing.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use callguard::{BreakerConfig, CacheConfig, CallError, Config, Wrapper};
//!
//! # #[derive(Debug, Clone, thiserror::Error)]
//! # #[error("profile service failed")]
//! # struct ProfileError;
//! # async fn fetch_profile(id: u64) -> Result<String, ProfileError> { Ok(format!("profile {id}")) }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let wrapper = Wrapper::<String, ProfileError>::new(
//!     Config::default()
//!         .with_call_timeout(Duration::from_millis(200))
//!         .with_singleflight(true)
//!         .with_cache(CacheConfig::default().with_ttl(Duration::from_secs(30)))
//!         .with_breaker(BreakerConfig::default()),
//! );
//!
//! match wrapper.call(None, "profile:7", |_ctx| fetch_profile(7), []).await {
//!     Ok(profile) => println!("{profile}"),
//!     Err(CallError::CircuitOpen | CallError::TooManyProbes) => println!("service is unhealthy"),
//!     Err(CallError::DeadlineExceeded) => println!("service is slow"),
//!     Err(error) => println!("service failed: {error}"),
//! }
//! # }
//! ```
//!
//! # Errors
//!
//! Failures are reported as [`CallError`], which keeps the error returned by the work apart
//! from deadline expiry and circuit breaker rejections.
//!
//! # Whose deadline governs a coalesced call
//!
//! Coalesced calls share one execution, and that execution runs under the deadline of the call
//! that started it. Calls joining later wait for the shared result regardless of their own
//! deadline. Give calls that share a key the same timeout, or bound the wait on the caller side.
//!
//! # Features
//!
//! - `logs` (default): emits a `tracing` event for every resilience decision once enabled with
//!   [`WrapperBuilder::enable_logs`].
//! - `metrics`: reports resilience events to an OpenTelemetry counter, see
//!   [`WrapperBuilder::enable_metrics`].
//! - `serde`: serialization of [`Config`], [`BreakerConfig`] and [`CacheConfig`].
//! - `test-util`: [`ClockControl`] for driving cache expiry and breaker timeouts in tests.

mod breaker;
mod cache;
mod clock;
mod config;
mod context;
mod error;
mod flight;
mod fn_wrapper;
mod options;
mod telemetry;
mod wrapper;

pub use breaker::{BreakerConfig, CircuitState, Whitelist};
pub use cache::CacheConfig;
pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub use clock::ClockControl;
pub use config::Config;
pub use context::CallContext;
pub use error::CallError;
pub use options::{CallOption, CallOptions, with_cache_ttl, with_timeout_deadline};
pub use wrapper::{Wrapper, WrapperBuilder};
