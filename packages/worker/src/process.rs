//! Worker process lifecycle: connect, subscribe, run, shut down.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actors::{JobHandler, Subscription, SubscriptionConfig, SubscriptionError};
use engine::{EngineClient, EngineError, Topology};
use worker_core::{LifecycleError, LifecycleState};

use crate::shutdown::{Shutdown, ShutdownReason};

/// Longest delay between two topology checks.
const MAX_CONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Worker process errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to connect: {0}")]
    Connect(#[source] EngineError),

    #[error("engine unreachable after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: EngineError,
    },

    #[error("failed to open subscription: {0}")]
    Subscribe(#[from] SubscriptionError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl WorkerError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Lifecycle settings for [`WorkerProcess`].
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub subscription: SubscriptionConfig,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            connect_backoff: Duration::from_secs(1),
            subscription: SubscriptionConfig::default(),
        }
    }
}

/// Drives one worker through its lifecycle.
pub struct WorkerProcess {
    settings: ProcessSettings,
    state: LifecycleState,
    history: Vec<LifecycleState>,
}

impl WorkerProcess {
    pub fn new(settings: ProcessSettings) -> Self {
        Self {
            settings,
            state: LifecycleState::Disconnected,
            history: vec![LifecycleState::Disconnected],
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state this process has been in, in order.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    fn enter(&mut self, next: LifecycleState) -> Result<(), LifecycleError> {
        self.state.transition(next)?;
        self.history.push(next);
        tracing::debug!("Worker process is {}", next);
        Ok(())
    }

    /// Run the worker until `shutdown` fires.
    ///
    /// `connect` builds the engine client. The client and the subscription
    /// are released before this returns, on success and on error. A shutdown
    /// while still connecting ends the run without subscribing.
    pub async fn run<C, H, F, Fut>(
        &mut self,
        connect: F,
        handler: H,
        mut shutdown: Shutdown,
    ) -> Result<ShutdownReason, WorkerError>
    where
        C: EngineClient,
        H: JobHandler,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, EngineError>>,
    {
        self.enter(LifecycleState::Connecting)?;

        let connecting = async {
            let client = connect().await.map_err(WorkerError::Connect)?;
            self.check_topology(&client).await?;
            Ok::<_, WorkerError>(client)
        };

        // Shutdown is honoured while connect attempts are still running.
        let connected = tokio::select! {
            result = connecting => Ok(result),
            reason = shutdown.wait() => Err(reason),
        };

        let client = match connected {
            Ok(Ok(client)) => Arc::new(client),
            Ok(Err(e)) => {
                self.enter(LifecycleState::Terminated)?;
                return Err(e);
            }
            Err(reason) => {
                tracing::info!("Shutdown requested while connecting ({})", reason);
                self.enter(LifecycleState::Terminated)?;
                return Ok(reason);
            }
        };

        let subscription = match Subscription::open(
            client.clone(),
            handler,
            self.settings.subscription.clone(),
        )
        .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                self.enter(LifecycleState::Terminated)?;
                return Err(e.into());
            }
        };
        self.enter(LifecycleState::Subscribed)?;

        let reason = shutdown.wait().await;
        tracing::info!("Shutdown requested ({})", reason);

        self.enter(LifecycleState::Draining)?;
        subscription.close().await;
        drop(client);
        tracing::info!("Engine connection closed");

        self.enter(LifecycleState::Terminated)?;
        Ok(reason)
    }

    /// Check the topology, retrying with doubling backoff.
    async fn check_topology<C: EngineClient>(&self, client: &C) -> Result<Topology, WorkerError> {
        let attempts = self.settings.connect_attempts.max(1);
        let mut backoff = self.settings.connect_backoff;
        let mut attempt = 1;

        loop {
            match client.topology().await {
                Ok(topology) => {
                    tracing::info!(
                        "Client connected: {} brokers, {} partitions, gateway {}",
                        topology.brokers.len(),
                        topology.partitions_count,
                        topology.gateway_version
                    );
                    return Ok(topology);
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "Topology check {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_CONNECT_BACKOFF);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(WorkerError::Unreachable {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }
}
