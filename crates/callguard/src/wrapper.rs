// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::context::CallContext;
use crate::error::CallError;
use crate::flight::{Flights, Role};
use crate::options::{CallOption, CallOptions};
use crate::telemetry::{Event, Telemetry};
use crate::Clock;

/// Applies deadline, coalescing, caching and circuit breaking around async calls.
///
/// A wrapper owns one instance of every policy enabled in its [`Config`] for its whole
/// lifetime. It is `Send` and `Sync`; share it behind an [`Arc`] to call it from many tasks.
///
/// Every [`call`][Self::call] runs the policies in a fixed order:
///
/// 1. The effective deadline is resolved: the per-call override, else the configured
///    `call_timeout`, bounded by any deadline of the caller's [`CallContext`].
/// 2. With caching enabled and a non-empty key, a fresh cached value is returned immediately.
///    Nothing else runs.
/// 3. The work runs under the deadline, through the circuit breaker, and, with coalescing
///    enabled and a non-empty key, shared with every concurrent call for the same key.
/// 4. A successful result is written to the cache. Errors are never cached.
///
/// `T` and `E` must be [`Clone`]: coalesced waiters and cache hits each receive a copy.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use callguard::{CacheConfig, Config, Wrapper, with_timeout_deadline};
///
/// # #[derive(Debug, Clone, thiserror::Error)]
/// # #[error("lookup failed")]
/// # struct LookupError;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let wrapper = Wrapper::<String, LookupError>::new(
///     Config::default()
///         .with_call_timeout(Duration::from_secs(1))
///         .with_cache(CacheConfig::default()),
/// );
///
/// let name = wrapper
///     .call(None, "user:42", |_ctx| async { Ok("alice".to_string()) }, [])
///     .await
///     .unwrap();
///
/// // served from the cache, the work does not run
/// let cached = wrapper
///     .call(
///         None,
///         "user:42",
///         |_ctx| async { Err(LookupError) },
///         [with_timeout_deadline(Duration::from_millis(50))],
///     )
///     .await
///     .unwrap();
///
/// assert_eq!(name, cached);
/// # }
/// ```
pub struct Wrapper<T, E> {
    call_timeout: Option<Duration>,
    flights: Option<Flights<T, E>>,
    breaker: Option<Arc<CircuitBreaker>>,
    cache: Option<ResponseCache<T>>,
    telemetry: Telemetry,
}

impl<T, E> Wrapper<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    /// Creates a wrapper with the system clock and telemetry disabled.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    /// Creates a builder for a wrapper with a custom clock, name or telemetry.
    #[must_use]
    pub fn builder(config: Config) -> WrapperBuilder<T, E> {
        WrapperBuilder::new(config)
    }

    /// Runs `work` through the enabled policies.
    ///
    /// `ctx` is the caller's context; `None` stands for [`CallContext::background`]. `work`
    /// receives the derived context carrying the effective deadline, which it may forward to its
    /// own I/O. An empty `key` bypasses both the cache and coalescing.
    ///
    /// When the deadline elapses the work future is dropped and
    /// [`CallError::DeadlineExceeded`] is returned; anything the work spawned on its own keeps
    /// running. A coalesced execution runs under the deadline of the call that started it and
    /// is dropped only once every waiter is gone.
    ///
    /// # Errors
    ///
    /// - [`CallError::Upstream`] with the error returned by `work`.
    /// - [`CallError::DeadlineExceeded`] if the effective deadline elapsed first.
    /// - [`CallError::CircuitOpen`] or [`CallError::TooManyProbes`] if the circuit breaker
    ///   rejected the call; `work` was not invoked.
    pub async fn call<F, Fut>(
        &self,
        ctx: impl Into<Option<CallContext>>,
        key: &str,
        work: F,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce(CallContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let parent = ctx.into().unwrap_or_default();
        let options = CallOptions::from_options(options);
        let context = parent.child(options.timeout().or(self.call_timeout));

        let cache = self.cache.as_ref().filter(|_| !key.is_empty());
        if let Some(cache) = cache {
            if let Some(value) = cache.get(key) {
                self.telemetry.report(Event::CacheHit);
                return Ok(value);
            }
            self.telemetry.report(Event::CacheMiss);
        }

        let execution = guarded(self.breaker.clone(), self.telemetry.clone(), context, work);
        let value = match self.flights.as_ref().filter(|_| !key.is_empty()) {
            Some(flights) => {
                let (shared, role) = flights.join(key, || execution.boxed());
                if role == Role::Follower {
                    self.telemetry.report(Event::Coalesced);
                }
                shared.await?
            }
            None => execution.await?,
        };

        if let Some(cache) = cache {
            cache.set(key, value.clone(), options.cache_ttl());
        }

        Ok(value)
    }

    /// Returns the current state of the circuit breaker, or `None` if it is disabled.
    #[must_use]
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.breaker.as_ref().map(|breaker| breaker.state())
    }

    /// Returns the fresh cached value for `key` without running anything.
    ///
    /// Returns `None` if caching is disabled, `key` is empty, or no fresh entry exists.
    #[must_use]
    pub fn cached(&self, key: &str) -> Option<T> {
        self.cache.as_ref().filter(|_| !key.is_empty())?.get(key)
    }
}

/// The breaker-guarded, deadline-bound execution of one unit of work.
async fn guarded<T, E, F, Fut>(
    breaker: Option<Arc<CircuitBreaker>>,
    telemetry: Telemetry,
    context: CallContext,
    work: F,
) -> Result<T, CallError<E>>
where
    E: Error + 'static,
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let bounded = bounded(&telemetry, context, work);

    match breaker {
        Some(breaker) => breaker.execute(bounded).await,
        None => bounded.await,
    }
}

async fn bounded<T, E, F, Fut>(telemetry: &Telemetry, context: CallContext, work: F) -> Result<T, CallError<E>>
where
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let future = work(context);

    let Some(deadline) = context.deadline() else {
        return future.await.map_err(CallError::Upstream);
    };

    match tokio::time::timeout_at(deadline, future).await {
        Ok(result) => result.map_err(CallError::Upstream),
        Err(_elapsed) => {
            telemetry.report(Event::DeadlineExceeded);
            Err(CallError::DeadlineExceeded)
        }
    }
}

impl<T, E> fmt::Debug for Wrapper<T, E>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("name", &self.telemetry.wrapper_name)
            .field("call_timeout", &self.call_timeout)
            .field("flights", &self.flights)
            .field("breaker", &self.breaker)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Builds a [`Wrapper`].
///
/// Created by [`Wrapper::builder`].
///
/// # Examples
///
/// ```
/// use callguard::{BreakerConfig, Clock, Config, Wrapper};
///
/// # #[derive(Debug, Clone, thiserror::Error)]
/// # #[error("payment failed")]
/// # struct PaymentError;
/// let wrapper = Wrapper::<u64, PaymentError>::builder(Config::default().with_breaker(BreakerConfig::default()))
///     .name("payments")
///     .clock(Clock::system())
///     .build();
/// ```
pub struct WrapperBuilder<T, E> {
    config: Config,
    clock: Clock,
    telemetry: Telemetry,
    _types: PhantomData<fn() -> (T, E)>,
}

impl<T, E> WrapperBuilder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    fn new(config: Config) -> Self {
        Self {
            config,
            clock: Clock::system(),
            telemetry: Telemetry::new(Cow::Borrowed("default")),
            _types: PhantomData,
        }
    }

    /// Sets the clock used for cache expiry and the breaker open timeout.
    #[must_use]
    pub fn clock(mut self, clock: impl AsRef<Clock>) -> Self {
        self.clock = clock.as_ref().clone();
        self
    }

    /// Sets the name reported with logs and metrics.
    ///
    /// Keep it short, preferably in `snake_case`, such as `user_lookup`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.telemetry.wrapper_name = name.into();
        self
    }

    /// Emits a `tracing` event for every resilience decision.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn enable_logs(mut self) -> Self {
        self.telemetry = self.telemetry.with_logs(true);
        self
    }

    /// Reports resilience events to a `resilience.event` counter created from `meter_provider`.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn enable_metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.telemetry = self.telemetry.with_metrics(meter_provider);
        self
    }

    /// Builds the wrapper.
    #[must_use]
    pub fn build(self) -> Wrapper<T, E> {
        let Self {
            config,
            clock,
            telemetry,
            _types,
        } = self;

        Wrapper {
            call_timeout: config.call_timeout(),
            flights: config.singleflight.then(Flights::new),
            breaker: config
                .breaker
                .as_ref()
                .map(|breaker| Arc::new(CircuitBreaker::new(breaker, clock.clone(), telemetry.clone()))),
            cache: config.cache.as_ref().map(|cache| ResponseCache::new(cache, clock)),
            telemetry,
        }
    }
}

impl<T, E> fmt::Debug for WrapperBuilder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperBuilder")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}
