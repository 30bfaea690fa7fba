//! Worker configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use actors::{DEFAULT_TASK_TYPE, SubscriptionConfig};
use engine::{EngineConfig, OAuthCredentials};

use crate::process::ProcessSettings;

/// Region used for SaaS clusters when `ZEEBE_REGION` is unset.
pub const DEFAULT_REGION: &str = "bru-2";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ZEEBE_ADDRESS or ZEEBE_CLUSTER_ID must be set")]
    MissingAddress,

    #[error("{set} is set but {missing} is not")]
    IncompleteCredentials {
        set: &'static str,
        missing: &'static str,
    },

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the worker process needs to start.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub engine: EngineConfig,
    /// Task type to subscribe to.
    pub task_type: String,
    pub subscription: SubscriptionConfig,
    /// Topology checks before giving up.
    pub connect_attempts: u32,
    /// Delay after the first failed topology check, doubled each retry.
    pub connect_backoff: Duration,
    /// Log at DEBUG instead of INFO.
    pub debug: bool,
}

impl WorkerConfig {
    /// Build a config from environment variables.
    ///
    /// Connection:
    /// - `ZEEBE_ADDRESS` - REST gateway URL; takes precedence over the cluster id
    /// - `ZEEBE_CLUSTER_ID`, `ZEEBE_REGION` (default: `bru-2`) - SaaS cluster
    /// - `ZEEBE_CLIENT_ID`, `ZEEBE_CLIENT_SECRET` - OAuth credentials (both or neither)
    /// - `ZEEBE_AUTHORIZATION_SERVER_URL`, `ZEEBE_TOKEN_AUDIENCE` - OAuth overrides
    ///
    /// Worker:
    /// - `WORKER_TASK_TYPE` (default: `DoMathTask`)
    /// - `WORKER_NAME` (default: `do-math-worker`)
    /// - `WORKER_CONCURRENCY` (default: 1)
    /// - `WORKER_MAX_JOBS_ACTIVE` (default: 32)
    /// - `WORKER_JOB_TIMEOUT_MS` (default: 300000)
    /// - `WORKER_POLL_INTERVAL_MS` (default: 100)
    /// - `WORKER_REQUEST_TIMEOUT_MS` (default: 10000)
    /// - `WORKER_CONNECT_ATTEMPTS` (default: 3)
    /// - `WORKER_DEBUG` (`true`/`false`, default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).and_then(non_empty);

        let subscription = SubscriptionConfig::default();
        let subscription = SubscriptionConfig {
            worker_name: get("WORKER_NAME").unwrap_or(subscription.worker_name),
            concurrency: parse_positive(&get, "WORKER_CONCURRENCY", subscription.concurrency)?,
            max_jobs_active: parse_positive(
                &get,
                "WORKER_MAX_JOBS_ACTIVE",
                subscription.max_jobs_active,
            )?,
            job_timeout: parse_millis(&get, "WORKER_JOB_TIMEOUT_MS", subscription.job_timeout)?,
            request_timeout: parse_millis(
                &get,
                "WORKER_REQUEST_TIMEOUT_MS",
                subscription.request_timeout,
            )?,
            poll_interval: parse_millis(
                &get,
                "WORKER_POLL_INTERVAL_MS",
                subscription.poll_interval,
            )?,
        };

        let mut engine = match (get("ZEEBE_ADDRESS"), get("ZEEBE_CLUSTER_ID")) {
            (Some(address), _) => EngineConfig::new(address),
            (None, Some(cluster_id)) => {
                let region = get("ZEEBE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
                EngineConfig::saas(&cluster_id, &region)
            }
            (None, None) => return Err(ConfigError::MissingAddress),
        };

        match (get("ZEEBE_CLIENT_ID"), get("ZEEBE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => {
                let mut credentials = OAuthCredentials::new(client_id, client_secret);
                if let Some(url) = get("ZEEBE_AUTHORIZATION_SERVER_URL") {
                    credentials = credentials.with_authorization_server(url);
                }
                if let Some(audience) = get("ZEEBE_TOKEN_AUDIENCE") {
                    credentials = credentials.with_audience(audience);
                }
                engine = engine.with_credentials(credentials);
            }
            (Some(_), None) => {
                return Err(ConfigError::IncompleteCredentials {
                    set: "ZEEBE_CLIENT_ID",
                    missing: "ZEEBE_CLIENT_SECRET",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteCredentials {
                    set: "ZEEBE_CLIENT_SECRET",
                    missing: "ZEEBE_CLIENT_ID",
                });
            }
            (None, None) => {}
        }

        // Activation requests are held open for up to `request_timeout`.
        engine = engine.with_request_timeout(subscription.request_timeout + Duration::from_secs(10));

        Ok(Self {
            engine,
            task_type: get("WORKER_TASK_TYPE").unwrap_or_else(|| DEFAULT_TASK_TYPE.to_string()),
            subscription,
            connect_attempts: parse_positive(&get, "WORKER_CONNECT_ATTEMPTS", 3)?,
            connect_backoff: Duration::from_secs(1),
            debug: parse_bool(&get, "WORKER_DEBUG", false)?,
        })
    }

    /// Settings for [`crate::WorkerProcess`].
    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            connect_attempts: self.connect_attempts,
            connect_backoff: self.connect_backoff,
            subscription: self.subscription.clone(),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_positive(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = parse(get, name, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        });
    }
    Ok(value)
}

fn parse_millis(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse(get, name, default.as_millis() as u64).map(Duration::from_millis)
}

fn parse_bool(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(name).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid { name, value }),
    }
}
