//! Worker actor that activates and executes jobs.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use engine::{ActivateJobsRequest, EngineClient, EngineError};
use futures_util::future::join_all;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde_json::Value;
use tokio::sync::broadcast;
use worker_core::{ActivatedJob, JobEvent, Variables};

use crate::handler::JobHandler;
use crate::messages::{WorkerMessage, WorkerStats};
use crate::subscription::SubscriptionConfig;

/// How a single job ended on this worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Failed,
    Abandoned,
}

/// State for the worker actor.
pub struct WorkerActorState<C> {
    /// Unique worker ID.
    pub worker_id: String,
    /// Engine client shared by all workers of a subscription.
    pub client: Arc<C>,
    /// Handler for the subscribed task type.
    pub handler: Arc<dyn JobHandler>,
    /// Polling and activation settings.
    pub config: Arc<SubscriptionConfig>,
    /// Set once the subscription starts closing.
    pub closing: Arc<AtomicBool>,
    /// Event broadcaster.
    pub event_tx: Option<broadcast::Sender<JobEvent>>,
    /// Job counters.
    pub stats: WorkerStats,
}

impl<C: EngineClient> WorkerActorState<C> {
    fn broadcast(&self, event: JobEvent) {
        if !matches!(event, JobEvent::WorkerHeartbeat { .. }) {
            tracing::debug!("{}", event.description());
        }
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn activation_request(&self) -> ActivateJobsRequest {
        ActivateJobsRequest::new(self.handler.task_type(), &self.config.worker_name)
            .with_max_jobs(self.config.max_jobs_active)
            .with_timeout(self.config.job_timeout)
            .with_request_timeout(self.config.request_timeout)
            .with_fetch_variables(self.handler.fetch_variables())
    }

    /// Activate a batch of jobs and process them concurrently.
    async fn poll(&mut self) -> Result<usize, EngineError> {
        let jobs = self.client.activate_jobs(self.activation_request()).await?;
        let activated = jobs.len();
        if activated == 0 {
            return Ok(0);
        }

        tracing::debug!("Worker {} activated {} jobs", self.worker_id, activated);
        self.stats.activated += activated as u64;

        let outcomes = join_all(jobs.into_iter().map(|job| self.process(job))).await;
        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed => self.stats.completed += 1,
                JobOutcome::Failed => self.stats.failed += 1,
                JobOutcome::Abandoned => self.stats.abandoned += 1,
            }
        }

        Ok(activated)
    }

    /// Run the handler for one job and report the outcome to the engine.
    async fn process(&self, job: ActivatedJob) -> JobOutcome {
        self.broadcast(JobEvent::JobActivated {
            job_key: job.job_key.clone(),
            task_type: job.job_type.clone(),
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
        });

        let started_at = Instant::now();
        let result = tokio::time::timeout(self.config.job_timeout, self.handler.handle(&job)).await;

        match result {
            Ok(Ok(variables)) => self.complete(&job, variables, started_at).await,
            Ok(Err(error)) => self.fail(&job, error.to_string()).await,
            Err(_) => self.fail(&job, "Job handler timed out".to_string()).await,
        }
    }

    async fn complete(&self, job: &ActivatedJob, variables: Variables, started_at: Instant) -> JobOutcome {
        let summary = Value::Object(variables.clone());

        match self.client.complete_job(&job.job_key, variables).await {
            Ok(()) => {
                tracing::info!("Completed job {} with {}", job.job_key, summary);
                self.broadcast(JobEvent::JobCompleted {
                    job_key: job.job_key.clone(),
                    worker_id: self.worker_id.clone(),
                    duration_ms: started_at.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                JobOutcome::Completed
            }
            Err(e) => {
                tracing::warn!("Failed to complete job {}: {}", job.job_key, e);
                self.fail(job, format!("Completion failed: {}", e)).await
            }
        }
    }

    async fn fail(&self, job: &ActivatedJob, error: String) -> JobOutcome {
        let retries = job.retries_after_failure();

        match self.client.fail_job(&job.job_key, retries, &error).await {
            Ok(()) => {
                tracing::warn!(
                    "Failed job {} ({} retries left): {}",
                    job.job_key,
                    retries,
                    error
                );
                self.broadcast(JobEvent::JobFailed {
                    job_key: job.job_key.clone(),
                    worker_id: self.worker_id.clone(),
                    error,
                    retries,
                    timestamp: Utc::now(),
                });
                JobOutcome::Failed
            }
            Err(e) => {
                tracing::error!(
                    "Could not report failure of job {} ({}); leaving it to time out: {}",
                    job.job_key,
                    error,
                    e
                );
                self.broadcast(JobEvent::JobAbandoned {
                    job_key: job.job_key.clone(),
                    worker_id: self.worker_id.clone(),
                    error: format!("{}; fail report: {}", error, e),
                    timestamp: Utc::now(),
                });
                JobOutcome::Abandoned
            }
        }
    }
}

/// Send the next `Heartbeat` after `delay`.
fn schedule_poll(myself: &ActorRef<WorkerMessage>, delay: Duration) {
    let myself = myself.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // The worker may have stopped in the meantime.
        let _ = myself.send_message(WorkerMessage::Heartbeat);
    });
}

/// Worker actor arguments.
pub struct WorkerArgs<C> {
    pub worker_id: String,
    pub client: Arc<C>,
    pub handler: Arc<dyn JobHandler>,
    pub config: Arc<SubscriptionConfig>,
    pub closing: Arc<AtomicBool>,
    pub event_tx: Option<broadcast::Sender<JobEvent>>,
}

/// Worker actor that polls the engine for one task type.
pub struct WorkerActor<C> {
    _client: PhantomData<fn() -> C>,
}

impl<C> WorkerActor<C> {
    pub fn new() -> Self {
        Self {
            _client: PhantomData,
        }
    }
}

impl<C> Default for WorkerActor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: EngineClient> Actor for WorkerActor<C> {
    type Msg = WorkerMessage;
    type State = WorkerActorState<C>;
    type Arguments = WorkerArgs<C>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting worker {} for {}",
            args.worker_id,
            args.handler.task_type()
        );

        let state = WorkerActorState {
            worker_id: args.worker_id,
            client: args.client,
            handler: args.handler,
            config: args.config,
            closing: args.closing,
            event_tx: args.event_tx,
            stats: WorkerStats::default(),
        };

        state.broadcast(JobEvent::WorkerConnected {
            worker_id: state.worker_id.clone(),
            task_type: state.handler.task_type().to_string(),
            timestamp: Utc::now(),
        });

        schedule_poll(&myself, state.config.poll_interval);

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Heartbeat => {
                if state.is_closing() {
                    myself.stop(None);
                    return Ok(());
                }

                let activated = match state.poll().await {
                    Ok(activated) => activated,
                    Err(e) => {
                        tracing::warn!(
                            "Worker {} failed to activate jobs: {}",
                            state.worker_id,
                            e
                        );
                        0
                    }
                };

                state.broadcast(JobEvent::WorkerHeartbeat {
                    worker_id: state.worker_id.clone(),
                    activated,
                    timestamp: Utc::now(),
                });

                // At most one heartbeat is pending, however long the poll took.
                schedule_poll(&myself, state.config.poll_interval);
            }

            WorkerMessage::GetStats { reply } => {
                let _ = reply.send(state.stats);
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.broadcast(JobEvent::WorkerDisconnected {
            worker_id: state.worker_id.clone(),
            task_type: state.handler.task_type().to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
