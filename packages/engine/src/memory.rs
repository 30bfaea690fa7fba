//! In-process engine for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use worker_core::{ActivatedJob, JobKey, Variables};

use crate::client::{ActivateJobsRequest, EngineClient, EngineError, Topology};
use crate::{BrokerInfo, PartitionInfo};

/// A completion received by the in-memory engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub job_key: JobKey,
    pub variables: Variables,
}

/// A failure report received by the in-memory engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub job_key: JobKey,
    pub retries: i32,
    pub error_message: String,
}

#[derive(Default)]
struct MemoryState {
    pending: VecDeque<ActivatedJob>,
    active: HashMap<JobKey, ActivatedJob>,
    completed: Vec<CompletedJob>,
    failed: Vec<FailedJob>,
    topology_failures: u32,
    completion_failures: u32,
    fail_failures: u32,
    activation_requests: u64,
}

/// Engine that keeps jobs in memory.
///
/// Failed jobs with retries left go back to the pending queue, the way the
/// real engine re-activates them. Failures of the topology and completion
/// calls can be injected to exercise error paths.
#[derive(Default)]
pub struct InMemoryEngine {
    state: Mutex<MemoryState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a job available for activation.
    pub fn push_job(&self, job: ActivatedJob) {
        self.state().pending.push_back(job);
    }

    /// Fail the next `times` topology requests.
    pub fn fail_topology(&self, times: u32) {
        self.state().topology_failures = times;
    }

    /// Fail the next `times` completion requests.
    pub fn fail_completions(&self, times: u32) {
        self.state().completion_failures = times;
    }

    /// Reject the next `times` failure reports. The job stays active.
    pub fn fail_failures(&self, times: u32) {
        self.state().fail_failures = times;
    }

    /// Completions received so far, in order.
    pub fn completed(&self) -> Vec<CompletedJob> {
        self.state().completed.clone()
    }

    /// Failure reports received so far, in order.
    pub fn failed(&self) -> Vec<FailedJob> {
        self.state().failed.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.state().active.len()
    }

    pub fn activation_requests(&self) -> u64 {
        self.state().activation_requests
    }
}

impl EngineClient for InMemoryEngine {
    async fn topology(&self) -> Result<Topology, EngineError> {
        let mut state = self.state();
        if state.topology_failures > 0 {
            state.topology_failures -= 1;
            return Err(EngineError::Unavailable("topology request rejected".into()));
        }

        Ok(Topology {
            brokers: vec![BrokerInfo {
                node_id: 0,
                host: "in-memory".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
                partitions: vec![PartitionInfo {
                    partition_id: 1,
                    role: "leader".to_string(),
                    health: "healthy".to_string(),
                }],
            }],
            cluster_size: 1,
            partitions_count: 1,
            replication_factor: 1,
            gateway_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn activate_jobs(
        &self,
        request: ActivateJobsRequest,
    ) -> Result<Vec<ActivatedJob>, EngineError> {
        let mut state = self.state();
        state.activation_requests += 1;

        let mut activated = Vec::new();
        let mut remaining = VecDeque::new();

        while let Some(mut job) = state.pending.pop_front() {
            if job.job_type == request.job_type
                && activated.len() < request.max_jobs_to_activate as usize
            {
                job.worker = request.worker.clone();
                if let Some(names) = &request.fetch_variable {
                    job.variables.retain(|name, _| names.contains(name));
                }
                activated.push(job);
            } else {
                remaining.push_back(job);
            }
        }
        state.pending = remaining;

        for job in &activated {
            state.active.insert(job.job_key.clone(), job.clone());
        }

        Ok(activated)
    }

    async fn complete_job(&self, job_key: &JobKey, variables: Variables) -> Result<(), EngineError> {
        let mut state = self.state();
        if !state.active.contains_key(job_key) {
            return Err(EngineError::JobNotFound(job_key.clone()));
        }
        if state.completion_failures > 0 {
            state.completion_failures -= 1;
            return Err(EngineError::Unavailable("completion rejected".into()));
        }

        state.active.remove(job_key);
        state.completed.push(CompletedJob {
            job_key: job_key.clone(),
            variables,
        });
        Ok(())
    }

    async fn fail_job(
        &self,
        job_key: &JobKey,
        retries: i32,
        error_message: &str,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        if !state.active.contains_key(job_key) {
            return Err(EngineError::JobNotFound(job_key.clone()));
        }
        if state.fail_failures > 0 {
            state.fail_failures -= 1;
            return Err(EngineError::Unavailable("failure report rejected".into()));
        }
        let Some(mut job) = state.active.remove(job_key) else {
            return Err(EngineError::JobNotFound(job_key.clone()));
        };

        state.failed.push(FailedJob {
            job_key: job_key.clone(),
            retries,
            error_message: error_message.to_string(),
        });

        if retries > 0 {
            job.retries = retries;
            state.pending.push_back(job);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(key: &str, job_type: &str) -> ActivatedJob {
        let variables = match json!({"count": 1, "add": 2, "other": "x"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        ActivatedJob::new(key, job_type, variables)
    }

    #[tokio::test]
    async fn activates_only_matching_type_up_to_limit() {
        let engine = InMemoryEngine::new();
        engine.push_job(job("1", "DoMathTask"));
        engine.push_job(job("2", "Other"));
        engine.push_job(job("3", "DoMathTask"));
        engine.push_job(job("4", "DoMathTask"));

        let request = ActivateJobsRequest::new("DoMathTask", "w").with_max_jobs(2);
        let jobs = engine.activate_jobs(request).await.unwrap();

        let keys: Vec<_> = jobs.iter().map(|j| j.job_key.as_str()).collect();
        assert_eq!(keys, vec!["1", "3"]);
        assert!(jobs.iter().all(|j| j.worker == "w"));
        assert_eq!(engine.pending_count(), 2);
        assert_eq!(engine.active_count(), 2);
    }

    #[tokio::test]
    async fn fetch_variables_filters_job_variables() {
        let engine = InMemoryEngine::new();
        engine.push_job(job("1", "DoMathTask"));

        let request = ActivateJobsRequest::new("DoMathTask", "w")
            .with_fetch_variables(Some(vec!["count".into(), "add".into()]));
        let jobs = engine.activate_jobs(request).await.unwrap();

        assert_eq!(jobs[0].variables.len(), 2);
        assert!(!jobs[0].variables.contains_key("other"));
    }

    #[tokio::test]
    async fn completing_twice_is_rejected() {
        let engine = InMemoryEngine::new();
        engine.push_job(job("1", "DoMathTask"));
        engine
            .activate_jobs(ActivateJobsRequest::new("DoMathTask", "w"))
            .await
            .unwrap();

        let key = JobKey::new("1");
        engine.complete_job(&key, Variables::new()).await.unwrap();
        let second = engine.complete_job(&key, Variables::new()).await;

        assert!(matches!(second, Err(EngineError::JobNotFound(_))));
        assert_eq!(engine.completed().len(), 1);
    }

    #[tokio::test]
    async fn failed_job_with_retries_is_requeued() {
        let engine = InMemoryEngine::new();
        engine.push_job(job("1", "DoMathTask"));
        engine
            .activate_jobs(ActivateJobsRequest::new("DoMathTask", "w"))
            .await
            .unwrap();

        engine.fail_job(&JobKey::new("1"), 2, "boom").await.unwrap();

        assert_eq!(engine.pending_count(), 1);
        assert_eq!(engine.failed()[0].error_message, "boom");
    }

    #[tokio::test]
    async fn rejected_failure_report_keeps_job_active() {
        let engine = InMemoryEngine::new();
        engine.push_job(job("1", "DoMathTask"));
        engine
            .activate_jobs(ActivateJobsRequest::new("DoMathTask", "w"))
            .await
            .unwrap();
        engine.fail_failures(1);

        let key = JobKey::new("1");
        assert!(matches!(
            engine.fail_job(&key, 2, "boom").await,
            Err(EngineError::Unavailable(_))
        ));
        assert_eq!(engine.active_count(), 1);
        assert!(engine.failed().is_empty());

        engine.fail_job(&key, 2, "boom").await.unwrap();
        assert_eq!(engine.failed().len(), 1);
    }

    #[tokio::test]
    async fn injected_topology_failures_run_out() {
        let engine = InMemoryEngine::new();
        engine.fail_topology(1);

        assert!(engine.topology().await.is_err());
        let topology = engine.topology().await.unwrap();
        assert_eq!(topology.leader_count(), 1);
    }
}
