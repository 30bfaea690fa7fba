//! Handler for the `DoMathTask` job type.

use worker_core::{ActivatedJob, SimpleMath, Variables, read_integer};

use crate::handler::{HandlerFuture, HandlerResult, JobHandler};

/// Task type the math handler subscribes to unless configured otherwise.
pub const DEFAULT_TASK_TYPE: &str = "DoMathTask";

/// Adds `add` to `count` and hands both back to the process.
pub struct MathHandler {
    task_type: String,
}

impl MathHandler {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
        }
    }

    /// Compute the output variables for `job`.
    ///
    /// Missing or non-integer inputs count as zero.
    pub fn compute(job: &ActivatedJob) -> HandlerResult {
        let mut math = SimpleMath::new(
            integer_or_zero(&job.variables, "count"),
            integer_or_zero(&job.variables, "add"),
        );

        tracing::info!(
            "Starting job {} with count {} and add {}",
            job.job_key,
            math.count,
            math.add
        );

        math.apply()?;
        Ok(math.to_variables())
    }
}

impl Default for MathHandler {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TYPE)
    }
}

impl JobHandler for MathHandler {
    fn task_type(&self) -> &str {
        &self.task_type
    }

    fn fetch_variables(&self) -> Option<Vec<String>> {
        Some(vec!["count".to_string(), "add".to_string()])
    }

    fn handle(&self, job: &ActivatedJob) -> HandlerFuture {
        let result = Self::compute(job);
        Box::pin(async move { result })
    }
}

fn integer_or_zero(variables: &Variables, name: &str) -> i64 {
    read_integer(variables, name).unwrap_or_else(|e| {
        tracing::warn!("{}, initializing {} to 0", e, name);
        0
    })
}
