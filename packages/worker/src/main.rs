use std::process::ExitCode;
use std::time::Duration;

use actors::MathHandler;
use tracing::Level;
use worker::{WorkerConfig, WorkerProcess};

/// Exit code for configuration errors.
const CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_max_level(Level::INFO).init();
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::from(CONFIG_ERROR);
        }
    };

    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting DoMath job worker");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(config));

    // The console listener may still be blocked reading stdin.
    runtime.shutdown_timeout(Duration::from_secs(1));
    code
}

async fn run(config: WorkerConfig) -> ExitCode {
    let (trigger, shutdown) = worker::channel();
    worker::spawn_console_listener(trigger.clone());
    worker::spawn_signal_listener(trigger);

    tracing::info!("Type \"{}\" to stop the worker", worker::EXIT_SENTINEL);

    let handler = MathHandler::new(&config.task_type);
    let mut process = WorkerProcess::new(config.process_settings());

    match process
        .run(|| engine::connect(config.engine.clone()), handler, shutdown)
        .await
    {
        Ok(reason) => {
            tracing::info!("Worker stopped ({})", reason);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Worker failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
