// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounds slow calls with a wrapper-wide timeout and a per-call override.

use std::time::Duration;

use callguard::{CallContext, Config, Wrapper, with_timeout_deadline};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const CALL_TIMEOUT: Duration = Duration::from_millis(100);
const PROCESSING_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, thiserror::Error)]
#[error("report generation failed")]
struct ReportError;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let wrapper = Wrapper::<String, ReportError>::builder(Config::default().with_call_timeout(CALL_TIMEOUT))
        .name("reports")
        .enable_logs()
        .build();

    // Times out: the work is slower than the call timeout
    match wrapper.call(None, "", generate_report, []).await {
        Ok(report) => println!("report: {report}"),
        Err(e) => println!("first attempt failed: {e}"),
    }

    // A longer per-call deadline lets the same work complete
    match wrapper
        .call(None, "", generate_report, [with_timeout_deadline(Duration::from_secs(1))])
        .await
    {
        Ok(report) => println!("report: {report}"),
        Err(e) => println!("second attempt failed: {e}"),
    }
}

async fn generate_report(ctx: CallContext) -> Result<String, ReportError> {
    println!("generating report, time left: {:?}", ctx.remaining());
    tokio::time::sleep(PROCESSING_DELAY).await; // simulate a slow upstream
    Ok("quarterly numbers".to_string())
}
