//! `do-math` job worker process.
//!
//! Loads [`WorkerConfig`] from the environment, connects to the engine and
//! keeps a [`MathHandler`](actors::MathHandler) subscription open until a
//! [`Shutdown`] source fires.

mod config;
mod process;
mod shutdown;

pub use config::{ConfigError, DEFAULT_REGION, WorkerConfig};
pub use process::{ProcessSettings, WorkerError, WorkerProcess};
pub use shutdown::{
    EXIT_SENTINEL, Shutdown, ShutdownReason, ShutdownTrigger, channel, is_exit_command,
    listen_console, spawn_console_listener, spawn_signal_listener, wait_for_sentinel,
};
