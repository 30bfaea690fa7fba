//! Job subscriptions: a set of worker actors bound to one task type.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use engine::EngineClient;
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorRef};
use tokio::sync::broadcast;
use worker_core::JobEvent;

use crate::handler::JobHandler;
use crate::messages::{SubscriptionError, WorkerMessage, WorkerStats};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Polling and activation settings for a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionConfig {
    /// Worker name reported to the engine on activation.
    pub worker_name: String,
    /// Number of worker actors polling in parallel.
    pub concurrency: u32,
    /// Maximum jobs activated per poll, per worker.
    pub max_jobs_active: u32,
    /// How long activated jobs stay locked to this worker.
    pub job_timeout: Duration,
    /// How long the gateway may hold an activation request open.
    pub request_timeout: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            worker_name: "do-math-worker".to_string(),
            concurrency: 1,
            max_jobs_active: 32,
            job_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl SubscriptionConfig {
    pub fn with_worker_name(mut self, worker_name: impl Into<String>) -> Self {
        self.worker_name = worker_name.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_jobs_active(mut self, max_jobs_active: u32) -> Self {
        self.max_jobs_active = max_jobs_active;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// An open subscription to one task type.
///
/// Call [`Subscription::close`] to stop polling and wait for the workers to
/// finish their in-flight jobs. Dropping an open subscription stops the
/// workers without waiting.
pub struct Subscription {
    task_type: String,
    workers: Vec<(ActorRef<WorkerMessage>, JoinHandle<()>)>,
    closing: Arc<AtomicBool>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl Subscription {
    /// Open a subscription for `handler`'s task type.
    pub async fn open<C, H>(
        client: Arc<C>,
        handler: H,
        config: SubscriptionConfig,
    ) -> Result<Self, SubscriptionError>
    where
        C: EngineClient,
        H: JobHandler,
    {
        let task_type = handler.task_type().to_string();
        if task_type.is_empty() {
            return Err(SubscriptionError::EmptyTaskType);
        }
        if config.concurrency == 0 {
            return Err(SubscriptionError::NoWorkers);
        }

        let (event_tx, _) = broadcast::channel(1024);
        let handler: Arc<dyn JobHandler> = Arc::new(handler);
        let config = Arc::new(config);

        // A failed spawn below drops `subscription`, stopping earlier workers.
        let mut subscription = Self {
            task_type,
            workers: Vec::with_capacity(config.concurrency as usize),
            closing: Arc::new(AtomicBool::new(false)),
            event_tx,
        };

        for n in 1..=config.concurrency {
            let args = WorkerArgs {
                worker_id: format!("{}-{}", config.worker_name, n),
                client: client.clone(),
                handler: handler.clone(),
                config: config.clone(),
                closing: subscription.closing.clone(),
                event_tx: Some(subscription.event_tx.clone()),
            };

            let worker = Actor::spawn(None, WorkerActor::<C>::new(), args)
                .await
                .map_err(|e| SubscriptionError::Spawn(e.to_string()))?;
            subscription.workers.push(worker);
        }

        tracing::info!(
            "Job worker opened and receiving jobs for {} ({} workers)",
            subscription.task_type,
            subscription.workers.len()
        );
        Ok(subscription)
    }

    /// Task type this subscription receives.
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Number of worker actors.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Subscribe to job and worker events.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Counters summed over all workers.
    pub async fn stats(&self) -> WorkerStats {
        let timeout = Duration::from_secs(5);
        let mut total = WorkerStats::default();

        for (worker, _) in &self.workers {
            let result = ractor::rpc::call(
                worker,
                |reply| WorkerMessage::GetStats { reply },
                Some(timeout),
            )
            .await;
            if let Ok(ractor::rpc::CallResult::Success(stats)) = result {
                total = total.merge(stats);
            }
        }

        total
    }

    /// Stop polling and wait for every worker to stop.
    ///
    /// Workers finish the batch they are processing before stopping.
    pub async fn close(mut self) {
        tracing::info!("Closing job worker for {}", self.task_type);
        self.closing.store(true, Ordering::Release);

        for (worker, handle) in std::mem::take(&mut self.workers) {
            let _ = worker.send_message(WorkerMessage::Shutdown);
            if let Err(e) = handle.await {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
        }

        tracing::info!("Job worker for {} closed", self.task_type);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        tracing::warn!(
            "Subscription for {} dropped without close, stopping workers",
            self.task_type
        );
        self.closing.store(true, Ordering::Release);
        for (worker, _) in &self.workers {
            worker.stop(None);
        }
    }
}
