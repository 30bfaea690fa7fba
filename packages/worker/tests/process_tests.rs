mod common;

use std::sync::Arc;
use std::time::Duration;

use actors::MathHandler;
use engine::{EngineError, InMemoryEngine};
use serde_json::json;
use worker::{ShutdownReason, WorkerError, WorkerProcess};
use worker_core::LifecycleState;

use common::{fast_settings, job, wait_until};

fn connected(
    engine: &Arc<InMemoryEngine>,
) -> impl FnOnce() -> std::future::Ready<Result<Arc<InMemoryEngine>, EngineError>> {
    let engine = engine.clone();
    move || std::future::ready(Ok(engine))
}

#[tokio::test]
async fn completes_jobs_until_console_exit() {
    let engine = Arc::new(InMemoryEngine::new());
    engine.push_job(job("1", json!({"count": 5, "add": 3})));
    engine.push_job(job("2", json!({"add": 10})));
    engine.push_job(job("3", json!({})));

    let (trigger, shutdown) = worker::channel();
    let watcher = engine.clone();
    tokio::spawn(async move {
        if wait_until(|| watcher.completed().len() == 3).await {
            trigger.trigger(ShutdownReason::Console);
        }
    });

    let mut process = WorkerProcess::new(fast_settings(3));
    let reason = process
        .run(connected(&engine), MathHandler::default(), shutdown)
        .await
        .unwrap();

    assert_eq!(reason, ShutdownReason::Console);
    assert_eq!(
        process.history(),
        &[
            LifecycleState::Disconnected,
            LifecycleState::Connecting,
            LifecycleState::Subscribed,
            LifecycleState::Draining,
            LifecycleState::Terminated,
        ]
    );

    let mut completed = engine.completed();
    completed.sort_by(|a, b| a.job_key.as_str().cmp(b.job_key.as_str()));
    let outputs: Vec<_> = completed
        .iter()
        .map(|c| serde_json::Value::Object(c.variables.clone()))
        .collect();
    assert_eq!(
        outputs,
        vec![
            json!({"count": 8, "add": 3}),
            json!({"count": 10, "add": 10}),
            json!({"count": 0, "add": 0}),
        ]
    );
    assert!(engine.failed().is_empty());
}

#[tokio::test]
async fn unreachable_engine_terminates_without_draining() {
    let engine = Arc::new(InMemoryEngine::new());
    engine.fail_topology(10);

    let (_trigger, shutdown) = worker::channel();
    let mut process = WorkerProcess::new(fast_settings(2));
    let err = process
        .run(connected(&engine), MathHandler::default(), shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Unreachable { attempts: 2, .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(process.state(), LifecycleState::Terminated);
    assert_eq!(
        process.history(),
        &[
            LifecycleState::Disconnected,
            LifecycleState::Connecting,
            LifecycleState::Terminated,
        ]
    );
    assert_eq!(engine.activation_requests(), 0);
}

#[tokio::test]
async fn transient_topology_failures_are_retried() {
    let engine = Arc::new(InMemoryEngine::new());
    engine.fail_topology(2);

    let (trigger, shutdown) = worker::channel();
    let watcher = engine.clone();
    tokio::spawn(async move {
        if wait_until(|| watcher.activation_requests() > 0).await {
            trigger.trigger(ShutdownReason::Interrupt);
        }
    });

    let mut process = WorkerProcess::new(fast_settings(3));
    let reason = process
        .run(connected(&engine), MathHandler::default(), shutdown)
        .await
        .unwrap();

    assert_eq!(reason, ShutdownReason::Interrupt);
    assert!(process.history().contains(&LifecycleState::Subscribed));
    assert_eq!(process.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn connect_error_terminates() {
    let (_trigger, shutdown) = worker::channel();
    let mut process = WorkerProcess::new(fast_settings(3));

    let err = process
        .run(
            || async {
                Err::<InMemoryEngine, _>(EngineError::InvalidConfig("no address".to_string()))
            },
            MathHandler::default(),
            shutdown,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Connect(EngineError::InvalidConfig(_))));
    assert!(!process.history().contains(&LifecycleState::Draining));
    assert_eq!(process.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn subscription_error_terminates() {
    let engine = Arc::new(InMemoryEngine::new());
    let (_trigger, shutdown) = worker::channel();
    let mut process = WorkerProcess::new(fast_settings(1));

    let err = process
        .run(connected(&engine), MathHandler::new(""), shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Subscribe(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        process.history(),
        &[
            LifecycleState::Disconnected,
            LifecycleState::Connecting,
            LifecycleState::Terminated,
        ]
    );
}

#[tokio::test]
async fn first_shutdown_source_wins() {
    let engine = Arc::new(InMemoryEngine::new());
    let (trigger, shutdown) = worker::channel();
    trigger.trigger(ShutdownReason::Terminate);
    trigger.trigger(ShutdownReason::Console);

    let mut process = WorkerProcess::new(fast_settings(1));
    let reason = process
        .run(connected(&engine), MathHandler::default(), shutdown)
        .await
        .unwrap();

    assert_eq!(reason, ShutdownReason::Terminate);
    assert_eq!(process.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn shutdown_during_hanging_connect_terminates() {
    let (trigger, shutdown) = worker::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger(ShutdownReason::Interrupt);
    });

    let mut process = WorkerProcess::new(fast_settings(3));
    let run = process.run(
        std::future::pending::<Result<InMemoryEngine, EngineError>>,
        MathHandler::default(),
        shutdown,
    );
    let reason = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown should interrupt connecting")
        .unwrap();

    assert_eq!(reason, ShutdownReason::Interrupt);
    assert_eq!(
        process.history(),
        &[
            LifecycleState::Disconnected,
            LifecycleState::Connecting,
            LifecycleState::Terminated,
        ]
    );
}

#[tokio::test]
async fn shutdown_during_topology_retries_terminates() {
    let engine = Arc::new(InMemoryEngine::new());
    engine.fail_topology(10);

    let (trigger, shutdown) = worker::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger(ShutdownReason::Terminate);
    });

    let mut settings = fast_settings(5);
    settings.connect_backoff = Duration::from_secs(10);
    let mut process = WorkerProcess::new(settings);
    let run = process.run(connected(&engine), MathHandler::default(), shutdown);
    let reason = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown should interrupt the backoff")
        .unwrap();

    assert_eq!(reason, ShutdownReason::Terminate);
    assert!(!process.history().contains(&LifecycleState::Subscribed));
    assert_eq!(process.state(), LifecycleState::Terminated);
    assert_eq!(engine.activation_requests(), 0);
}
