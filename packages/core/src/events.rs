//! Event types for observing worker progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobKey;

/// Events emitted by job workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    // Job events
    /// A job was activated for a worker.
    JobActivated {
        job_key: JobKey,
        task_type: String,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job was completed on the engine.
    JobCompleted {
        job_key: JobKey,
        worker_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job was failed back to the engine.
    JobFailed {
        job_key: JobKey,
        worker_id: String,
        error: String,
        retries: i32,
        timestamp: DateTime<Utc>,
    },
    /// Neither completion nor failure reached the engine.
    JobAbandoned {
        job_key: JobKey,
        worker_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    /// A worker subscribed to a task type.
    WorkerConnected {
        worker_id: String,
        task_type: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker stopped.
    WorkerDisconnected {
        worker_id: String,
        task_type: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker polled the engine.
    WorkerHeartbeat {
        worker_id: String,
        activated: usize,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobActivated { timestamp, .. } => *timestamp,
            JobEvent::JobCompleted { timestamp, .. } => *timestamp,
            JobEvent::JobFailed { timestamp, .. } => *timestamp,
            JobEvent::JobAbandoned { timestamp, .. } => *timestamp,
            JobEvent::WorkerConnected { timestamp, .. } => *timestamp,
            JobEvent::WorkerDisconnected { timestamp, .. } => *timestamp,
            JobEvent::WorkerHeartbeat { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job key associated with this event, if any.
    pub fn job_key(&self) -> Option<&JobKey> {
        match self {
            JobEvent::JobActivated { job_key, .. } => Some(job_key),
            JobEvent::JobCompleted { job_key, .. } => Some(job_key),
            JobEvent::JobFailed { job_key, .. } => Some(job_key),
            JobEvent::JobAbandoned { job_key, .. } => Some(job_key),
            _ => None,
        }
    }

    /// Whether this event ends the job's life on this worker.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. } | JobEvent::JobAbandoned { .. }
        )
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobActivated {
                job_key, worker_id, ..
            } => format!("Job {} activated by {}", job_key, worker_id),
            JobEvent::JobCompleted {
                job_key,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_key, duration_ms),
            JobEvent::JobFailed {
                job_key,
                error,
                retries,
                ..
            } => format!("Job {} failed ({} retries left): {}", job_key, retries, error),
            JobEvent::JobAbandoned { job_key, error, .. } => {
                format!("Job {} abandoned: {}", job_key, error)
            }
            JobEvent::WorkerConnected {
                worker_id,
                task_type,
                ..
            } => format!("Worker {} subscribed to {}", worker_id, task_type),
            JobEvent::WorkerDisconnected {
                worker_id,
                task_type,
                ..
            } => format!("Worker {} unsubscribed from {}", worker_id, task_type),
            JobEvent::WorkerHeartbeat {
                worker_id,
                activated,
                ..
            } => format!("Worker {} heartbeat ({} activated)", worker_id, activated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events_carry_job_keys() {
        let now = Utc::now();
        let failed = JobEvent::JobFailed {
            job_key: JobKey::new("7"),
            worker_id: "w-1".to_string(),
            error: "overflow".to_string(),
            retries: 2,
            timestamp: now,
        };

        assert!(failed.is_terminal());
        assert_eq!(failed.job_key(), Some(&JobKey::new("7")));
        assert_eq!(failed.timestamp(), now);
        assert_eq!(failed.description(), "Job 7 failed (2 retries left): overflow");
    }

    #[test]
    fn worker_events_have_no_job() {
        let heartbeat = JobEvent::WorkerHeartbeat {
            worker_id: "w-1".to_string(),
            activated: 0,
            timestamp: Utc::now(),
        };

        assert!(!heartbeat.is_terminal());
        assert!(heartbeat.job_key().is_none());
    }

    #[test]
    fn serializes_with_event_tag() {
        let event = JobEvent::WorkerConnected {
            worker_id: "w-1".to_string(),
            task_type: "DoMathTask".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "worker_connected");
        assert_eq!(json["task_type"], "DoMathTask");
    }
}
