// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalesces concurrent calls for the same key into a single execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use callguard::{Config, Wrapper};
use futures::future::join_all;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const CONCURRENT_CALLS: usize = 8;

#[derive(Debug, Clone, thiserror::Error)]
#[error("config service unavailable")]
struct ConfigError;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let wrapper = Arc::new(
        Wrapper::<String, ConfigError>::builder(Config::default().with_singleflight(true))
            .name("config_loader")
            .enable_logs()
            .build(),
    );
    let executions = Arc::new(AtomicUsize::new(0));

    let calls = (0..CONCURRENT_CALLS).map(|caller| {
        let wrapper = Arc::clone(&wrapper);
        let executions = Arc::clone(&executions);
        tokio::spawn(async move {
            let result = wrapper
                .call(
                    None,
                    "feature_flags",
                    move |_ctx| async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("dark_mode=on".to_string())
                    },
                    [],
                )
                .await;
            println!("caller {caller}: {result:?}");
        })
    });
    join_all(calls).await;

    println!(
        "{CONCURRENT_CALLS} callers, {} execution(s)",
        executions.load(Ordering::SeqCst)
    );
}
