//! The engine client trait and its wire types.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use worker_core::{ActivatedJob, JobKey, Variables};

/// Engine client errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("job not found: {0}")]
    JobNotFound(JobKey),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations a job worker needs from the engine.
pub trait EngineClient: Send + Sync + 'static {
    /// Fetch the cluster topology. Doubles as a liveness check.
    fn topology(&self) -> impl Future<Output = Result<Topology, EngineError>> + Send;

    /// Activate up to `request.max_jobs_to_activate` jobs of one type.
    fn activate_jobs(
        &self,
        request: ActivateJobsRequest,
    ) -> impl Future<Output = Result<Vec<ActivatedJob>, EngineError>> + Send;

    /// Complete a job with the given output variables.
    fn complete_job(
        &self,
        job_key: &JobKey,
        variables: Variables,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Fail a job, leaving `retries` attempts for re-activation.
    fn fail_job(
        &self,
        job_key: &JobKey,
        retries: i32,
        error_message: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

impl<T: EngineClient> EngineClient for Arc<T> {
    fn topology(&self) -> impl Future<Output = Result<Topology, EngineError>> + Send {
        (**self).topology()
    }

    fn activate_jobs(
        &self,
        request: ActivateJobsRequest,
    ) -> impl Future<Output = Result<Vec<ActivatedJob>, EngineError>> + Send {
        (**self).activate_jobs(request)
    }

    fn complete_job(
        &self,
        job_key: &JobKey,
        variables: Variables,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        (**self).complete_job(job_key, variables)
    }

    fn fail_job(
        &self,
        job_key: &JobKey,
        retries: i32,
        error_message: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        (**self).fail_job(job_key, retries, error_message)
    }
}

/// Job activation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateJobsRequest {
    /// Task type to activate.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Worker name recorded on the activated jobs.
    pub worker: String,
    /// Lock duration of activated jobs, milliseconds.
    pub timeout: u64,
    pub max_jobs_to_activate: u32,
    /// How long the gateway may hold the request open, milliseconds.
    pub request_timeout: u64,
    /// Restrict the returned variables to these names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_variable: Option<Vec<String>>,
}

impl ActivateJobsRequest {
    pub fn new(job_type: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            worker: worker.into(),
            timeout: 300_000,
            max_jobs_to_activate: 32,
            request_timeout: 10_000,
            fetch_variable: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: u32) -> Self {
        self.max_jobs_to_activate = max_jobs;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout.as_millis() as u64;
        self
    }

    pub fn with_fetch_variables(mut self, names: Option<Vec<String>>) -> Self {
        self.fetch_variable = names;
        self
    }
}

/// Job activation response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ActivateJobsResponse {
    #[serde(default)]
    pub jobs: Vec<ActivatedJob>,
}

/// Cluster topology as reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Topology {
    pub brokers: Vec<BrokerInfo>,
    pub cluster_size: u32,
    pub partitions_count: u32,
    pub replication_factor: u32,
    pub gateway_version: String,
}

impl Topology {
    /// Number of partitions led by some broker.
    pub fn leader_count(&self) -> usize {
        self.brokers
            .iter()
            .flat_map(|b| &b.partitions)
            .filter(|p| p.role == "leader")
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerInfo {
    pub node_id: u32,
    pub host: String,
    pub port: u16,
    pub version: String,
    pub partitions: Vec<PartitionInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartitionInfo {
    pub partition_id: u32,
    pub role: String,
    pub health: String,
}
