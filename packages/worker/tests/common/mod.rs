use std::time::Duration;

use actors::SubscriptionConfig;
use serde_json::Value;
use worker::ProcessSettings;
use worker_core::{ActivatedJob, Variables};

pub fn job(key: &str, variables: Value) -> ActivatedJob {
    let variables: Variables = match variables {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    };
    ActivatedJob::new(key, "DoMathTask", variables)
}

/// Short backoff and polling so lifecycle tests finish quickly.
pub fn fast_settings(connect_attempts: u32) -> ProcessSettings {
    ProcessSettings {
        connect_attempts,
        connect_backoff: Duration::from_millis(5),
        subscription: SubscriptionConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_job_timeout(Duration::from_secs(5)),
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
