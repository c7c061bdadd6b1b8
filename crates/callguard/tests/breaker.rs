// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the circuit breaker using only the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use callguard::{BreakerConfig, CallError, CircuitState, Config, Whitelist, Wrapper};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable")]
    Unavailable,
}

type StoreWrapper = Wrapper<u32, StoreError>;

fn breaker_wrapper(breaker: BreakerConfig) -> StoreWrapper {
    Wrapper::new(Config::default().with_breaker(breaker))
}

async fn invoke(wrapper: &StoreWrapper, calls: &Arc<AtomicUsize>, result: Result<u32, StoreError>) -> Result<u32, CallError<StoreError>> {
    let calls = Arc::clone(calls);

    wrapper
        .call(
            None,
            "",
            move |_ctx| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                result
            },
            [],
        )
        .await
}

#[tokio::test]
async fn trips_after_failure_ratio_and_rejects_without_invoking() {
    let wrapper = breaker_wrapper(BreakerConfig::default().with_min_requests(5).with_failure_ratio_threshold(0.5));
    let calls = Arc::new(AtomicUsize::new(0));

    for result in [
        Ok(1),
        Err(StoreError::Unavailable),
        Ok(1),
        Err(StoreError::Unavailable),
        Err(StoreError::Unavailable),
    ] {
        let _ = invoke(&wrapper, &calls, result).await;
    }

    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Open));

    let error = invoke(&wrapper, &calls, Ok(1)).await.unwrap_err();

    assert!(matches!(error, CallError::CircuitOpen));
    assert!(error.is_circuit_rejection());
    assert!(!error.is_upstream());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn stays_closed_below_min_requests() {
    let wrapper = breaker_wrapper(BreakerConfig::default().with_min_requests(5).with_failure_ratio_threshold(0.5));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        invoke(&wrapper, &calls, Err(StoreError::Unavailable)).await.unwrap_err();
    }

    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(invoke(&wrapper, &calls, Ok(3)).await.unwrap(), 3);
}

#[tokio::test]
async fn recovers_after_open_timeout() {
    let wrapper = breaker_wrapper(
        BreakerConfig::default()
            .with_min_requests(1)
            .with_failure_ratio_threshold(1.0)
            .with_open_timeout(Duration::from_millis(100)),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    invoke(&wrapper, &calls, Err(StoreError::Unavailable)).await.unwrap_err();
    assert!(matches!(invoke(&wrapper, &calls, Ok(1)).await, Err(CallError::CircuitOpen)));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::HalfOpen));

    assert_eq!(invoke(&wrapper, &calls, Ok(2)).await.unwrap(), 2);
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(invoke(&wrapper, &calls, Ok(3)).await.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_trial_reopens() {
    let wrapper = breaker_wrapper(
        BreakerConfig::default()
            .with_min_requests(1)
            .with_failure_ratio_threshold(1.0)
            .with_open_timeout(Duration::from_millis(100)),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    invoke(&wrapper, &calls, Err(StoreError::Unavailable)).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let error = invoke(&wrapper, &calls, Err(StoreError::Unavailable)).await.unwrap_err();

    assert_eq!(error.upstream(), Some(&StoreError::Unavailable));
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Open));
}

#[tokio::test]
async fn half_open_rejects_calls_beyond_trial_budget() {
    let wrapper = Arc::new(breaker_wrapper(
        BreakerConfig::default()
            .with_min_requests(1)
            .with_failure_ratio_threshold(1.0)
            .with_open_timeout(Duration::from_millis(50)),
    ));
    let calls = Arc::new(AtomicUsize::new(0));

    invoke(&wrapper, &calls, Err(StoreError::Unavailable)).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let trial = tokio::spawn({
        let wrapper = Arc::clone(&wrapper);
        async move {
            wrapper
                .call(
                    None,
                    "",
                    |_ctx| async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(1)
                    },
                    [],
                )
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let error = invoke(&wrapper, &calls, Ok(2)).await.unwrap_err();
    assert!(matches!(error, CallError::TooManyProbes));
    assert!(error.is_circuit_rejection());

    assert_eq!(trial.await.unwrap().unwrap(), 1);
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));
}

#[tokio::test]
async fn whitelisted_errors_do_not_trip() {
    let wrapper = breaker_wrapper(
        BreakerConfig::default()
            .with_min_requests(5)
            .with_failure_ratio_threshold(0.5)
            .with_whitelist(Whitelist::new().with_error(StoreError::NotFound)),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let error = invoke(&wrapper, &calls, Err(StoreError::NotFound)).await.unwrap_err();
        assert_eq!(error.into_upstream(), Some(StoreError::NotFound));
    }

    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn whitelist_matches_wrapped_source() {
    #[derive(Debug, Clone, thiserror::Error)]
    #[error("query failed")]
    struct QueryError(#[source] StoreError);

    let wrapper = Wrapper::<u32, QueryError>::new(Config::default().with_breaker(
        BreakerConfig::default()
            .with_min_requests(1)
            .with_failure_ratio_threshold(0.5)
            .with_whitelist(Whitelist::new().with_error(StoreError::NotFound)),
    ));

    for _ in 0..3 {
        wrapper
            .call(None, "", |_ctx| async { Err(QueryError(StoreError::NotFound)) }, [])
            .await
            .unwrap_err();
    }
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));

    // whitelisted outcomes stay in the counts: 2 of 5 failed
    for _ in 0..2 {
        wrapper
            .call(None, "", |_ctx| async { Err(QueryError(StoreError::Unavailable)) }, [])
            .await
            .unwrap_err();
    }
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Closed));

    // 3 of 6
    wrapper
        .call(None, "", |_ctx| async { Err(QueryError(StoreError::Unavailable)) }, [])
        .await
        .unwrap_err();
    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Open));
}

#[tokio::test]
async fn deadline_exceeded_counts_as_failure() {
    let wrapper = Wrapper::<u32, StoreError>::new(
        Config::default()
            .with_call_timeout(Duration::from_millis(10))
            .with_breaker(BreakerConfig::default().with_min_requests(2).with_failure_ratio_threshold(1.0)),
    );

    for _ in 0..2 {
        let error = wrapper
            .call(
                None,
                "",
                |_ctx| async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(1)
                },
                [],
            )
            .await
            .unwrap_err();
        assert!(error.is_deadline_exceeded());
    }

    assert_eq!(wrapper.circuit_state(), Some(CircuitState::Open));
}

#[test]
fn disabled_breaker_has_no_state() {
    let wrapper = StoreWrapper::new(Config::default());

    assert_eq!(wrapper.circuit_state(), None);
}
