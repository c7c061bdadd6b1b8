// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Combines every policy in front of a flaky, sometimes slow upstream and reports the
//! resulting events as logs and metrics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use callguard::{BreakerConfig, CacheConfig, CallContext, CallError, Config, Wrapper, with_cache_ttl};
use futures::future::join_all;
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, thiserror::Error)]
#[error("weather service returned an error")]
struct WeatherError;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let exporter = InMemoryMetricExporter::default();
    let meter_provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter.clone()).build())
        .build();

    let config = Config::default()
        .with_call_timeout(Duration::from_millis(150))
        .with_singleflight(true)
        .with_cache(CacheConfig::default().with_ttl(Duration::from_millis(300)))
        .with_breaker(
            BreakerConfig::default()
                .with_min_requests(3)
                .with_failure_ratio_threshold(0.6)
                .with_open_timeout(Duration::from_secs(1)),
        );

    let wrapper = Arc::new(
        Wrapper::<String, WeatherError>::builder(config)
            .name("weather")
            .enable_logs()
            .enable_metrics(&meter_provider)
            .build(),
    );
    let upstream_calls = Arc::new(AtomicU32::new(0));

    for round in 0..6 {
        // a burst of identical requests is served by one upstream call
        let burst = (0..4).map(|_| {
            let wrapper = Arc::clone(&wrapper);
            let upstream_calls = Arc::clone(&upstream_calls);
            async move {
                wrapper
                    .call(
                        None,
                        "forecast:seattle",
                        move |ctx| forecast(ctx, upstream_calls),
                        [with_cache_ttl(Duration::from_millis(200))],
                    )
                    .await
            }
        });

        for result in join_all(burst).await {
            match result {
                Ok(forecast) => println!("round {round}: {forecast}"),
                Err(CallError::DeadlineExceeded) => println!("round {round}: too slow"),
                Err(e) if e.is_circuit_rejection() => println!("round {round}: circuit is protecting the service"),
                Err(e) => println!("round {round}: {e}"),
            }
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!("upstream called {} time(s)", upstream_calls.load(Ordering::SeqCst));

    if let Err(e) = meter_provider.force_flush() {
        println!("failed to flush metrics: {e}");
    }
    if let Ok(metrics) = exporter.get_finished_metrics() {
        println!("exported {} metric batch(es)", metrics.len());
    }
}

// Alternates between a fast answer, a failure and a response slower than the deadline
async fn forecast(_ctx: CallContext, upstream_calls: Arc<AtomicU32>) -> Result<String, WeatherError> {
    match upstream_calls.fetch_add(1, Ordering::SeqCst) % 3 {
        0 => Ok("light rain".to_string()),
        1 => Err(WeatherError),
        _ => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("sunny".to_string())
        }
    }
}
