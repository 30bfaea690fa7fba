//! Message types for actor communication.

use ractor::RpcReplyPort;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Poll the engine for jobs if the subscription is still open.
    Heartbeat,

    /// Get the worker's counters.
    GetStats { reply: RpcReplyPort<WorkerStats> },

    /// Shutdown the worker.
    Shutdown,
}

/// Per-worker job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub activated: u64,
    pub completed: u64,
    pub failed: u64,
    /// Jobs whose completion and failure reports both failed.
    pub abandoned: u64,
}

impl WorkerStats {
    pub fn merge(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            activated: self.activated + other.activated,
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            abandoned: self.abandoned + other.abandoned,
        }
    }

    /// Jobs activated but not yet reported back.
    pub fn in_flight(&self) -> u64 {
        self.activated
            .saturating_sub(self.completed + self.failed + self.abandoned)
    }
}

/// Error type for subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("task type must not be empty")]
    EmptyTaskType,

    #[error("concurrency must be at least 1")]
    NoWorkers,

    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}
