use std::time::Duration;

use actors::SubscriptionConfig;
use serde_json::Value;
use worker_core::{ActivatedJob, Variables};

pub fn vars(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn job(key: &str, task_type: &str, variables: Value) -> ActivatedJob {
    ActivatedJob::new(key, task_type, vars(variables))
}

pub fn fast_config() -> SubscriptionConfig {
    SubscriptionConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_job_timeout(Duration::from_secs(5))
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
