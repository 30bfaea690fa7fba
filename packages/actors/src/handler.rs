//! Job handler trait.

use std::future::Future;
use std::pin::Pin;

use worker_core::{ActivatedJob, MathError, Variables};

/// Result type for job handlers: the variables to complete the job with.
pub type HandlerResult = Result<Variables, HandlerError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Reasons a handler gives up on a job. The job is failed back to the engine.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Math(#[from] MathError),

    #[error("{0}")]
    Failed(String),
}

/// Trait for job handlers.
///
/// Implement this trait to define how jobs of one task type are processed.
/// The handler only produces the outcome; completing or failing the job on
/// the engine is done by the worker that invoked it.
pub trait JobHandler: Send + Sync + 'static {
    /// The task type this handler processes.
    fn task_type(&self) -> &str;

    /// Variables to fetch on activation. `None` fetches all of them.
    fn fetch_variables(&self) -> Option<Vec<String>> {
        None
    }

    /// Process a job and return its output variables.
    fn handle(&self, job: &ActivatedJob) -> HandlerFuture;
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&ActivatedJob) -> HandlerFuture + Send + Sync + 'static,
{
    task_type: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&ActivatedJob) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(task_type: impl Into<String>, handler: F) -> Self {
        Self {
            task_type: task_type.into(),
            handler,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&ActivatedJob) -> HandlerFuture + Send + Sync + 'static,
{
    fn task_type(&self) -> &str {
        &self.task_type
    }

    fn handle(&self, job: &ActivatedJob) -> HandlerFuture {
        (self.handler)(job)
    }
}

/// Helper macro for creating job handlers from async closures.
#[macro_export]
macro_rules! job_handler {
    ($task_type:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($task_type, |$job: &$crate::ActivatedJob| -> $crate::HandlerFuture {
            let $job = $job.clone();
            Box::pin(async move {
                let result: $crate::HandlerResult = $body;
                result
            })
        })
    };
}
