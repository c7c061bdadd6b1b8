// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serves repeated lookups from the cache until their time-to-live elapses.

use std::time::Duration;

use callguard::{CacheConfig, CallContext, Config, Wrapper, with_cache_ttl};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, thiserror::Error)]
#[error("price lookup failed")]
struct PriceError;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let cache = CacheConfig::default().with_max_size(1_000).with_ttl(Duration::from_millis(200));
    let wrapper = Wrapper::<u64, PriceError>::builder(Config::default().with_cache(cache))
        .name("prices")
        .enable_logs()
        .build();

    // The first call runs the lookup, the second is a cache hit
    for _ in 0..2 {
        let price = wrapper.call(None, "sku:1234", lookup_price, []).await;
        println!("sku:1234 costs {price:?}");
    }

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Expired: the lookup runs again and the fresh entry is kept for longer
    let price = wrapper
        .call(None, "sku:1234", lookup_price, [with_cache_ttl(Duration::from_secs(5))])
        .await;
    println!("sku:1234 costs {price:?}");
    println!("cached: {:?}", wrapper.cached("sku:1234"));
}

async fn lookup_price(_ctx: CallContext) -> Result<u64, PriceError> {
    println!("looking up price");
    Ok(1_999)
}
