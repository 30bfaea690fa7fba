//! Shutdown signalling.
//!
//! Several sources (console, Ctrl-C, SIGTERM) share one trigger; the first
//! one to fire decides the [`ShutdownReason`].

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Console input containing this token stops the worker.
pub const EXIT_SENTINEL: &str = "exit";

/// Why the worker is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `exit` typed on the console.
    Console,
    /// Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Console => write!(f, "console exit command"),
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate signal"),
        }
    }
}

/// Fires the shutdown. Cheap to clone, one per signal source.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownTrigger {
    /// Request shutdown. Only the first request is recorded.
    pub fn trigger(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

/// Waits for the shutdown trigger.
pub struct Shutdown {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl Shutdown {
    /// Wait until shutdown is triggered.
    ///
    /// Waits forever if every trigger is dropped without firing.
    pub async fn wait(&mut self) -> ShutdownReason {
        loop {
            if let Some(reason) = *self.rx.borrow_and_update() {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Whether shutdown has already been triggered.
    pub fn is_triggered(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

/// Create a connected trigger and waiter.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx: Arc::new(tx) }, Shutdown { rx })
}

/// Whether a console line asks the worker to exit.
///
/// Matches the sentinel anywhere in the line, so `please exit now` counts.
pub fn is_exit_command(line: &str) -> bool {
    line.contains(EXIT_SENTINEL)
}

/// Read lines until one contains the exit sentinel.
///
/// Lines that are not valid UTF-8 are read lossily. Returns `Ok(false)` if
/// the input ends first.
pub async fn wait_for_sentinel<R>(mut reader: R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(false);
        }

        let line = String::from_utf8_lossy(&buf);
        if is_exit_command(&line) {
            return Ok(true);
        }
        tracing::debug!("Ignoring console input: {}", line.trim_end());
    }
}

/// Trigger shutdown when `reader` yields the exit sentinel.
pub async fn listen_console<R>(reader: R, trigger: ShutdownTrigger)
where
    R: AsyncBufRead + Unpin,
{
    match wait_for_sentinel(reader).await {
        Ok(true) => trigger.trigger(ShutdownReason::Console),
        Ok(false) => tracing::debug!("Console input closed; use a signal to stop the worker"),
        Err(e) => tracing::warn!("Failed to read console input: {}", e),
    }
}

/// Watch stdin for the exit sentinel.
pub fn spawn_console_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(listen_console(BufReader::new(tokio::io::stdin()), trigger))
}

/// Watch for Ctrl-C and, on Unix, SIGTERM.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = wait_for_signal().await;
        trigger.trigger(reason);
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownReason {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Failed to listen for SIGTERM: {}", e);
            return wait_for_interrupt().await;
        }
    };

    tokio::select! {
        reason = wait_for_interrupt() => reason,
        _ = terminate.recv() => ShutdownReason::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownReason {
    wait_for_interrupt().await
}

async fn wait_for_interrupt() -> ShutdownReason {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    ShutdownReason::Interrupt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sentinel_matches_as_substring_not_equality() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("please exit now"));
        assert!(is_exit_command("exiting"));
        assert!(!is_exit_command("quit"));
        assert!(!is_exit_command("EXIT"));
        assert!(!is_exit_command(""));
    }

    #[tokio::test]
    async fn sentinel_inside_a_line_ends_the_wait() {
        let input: &[u8] = b"hello\nstatus\nplease exit now\nnever read\n";
        assert!(wait_for_sentinel(input).await.unwrap());
    }

    #[tokio::test]
    async fn input_without_sentinel_runs_to_eof() {
        let input: &[u8] = b"quit\nstop\n";
        assert!(!wait_for_sentinel(input).await.unwrap());
    }

    #[tokio::test]
    async fn console_listener_fires_trigger() {
        let (trigger, mut shutdown) = channel();
        listen_console(&b"exit\n"[..], trigger).await;

        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.wait().await, ShutdownReason::Console);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_stop_the_listener() {
        let (trigger, shutdown) = channel();
        listen_console(&b"\xff\xfe garbage\nexit\n"[..], trigger).await;

        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn console_eof_does_not_fire_trigger() {
        let (trigger, shutdown) = channel();
        listen_console(&b"nothing to see\n"[..], trigger.clone()).await;
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn first_trigger_wins() {
        let (trigger, mut shutdown) = channel();
        trigger.trigger(ShutdownReason::Terminate);
        trigger.trigger(ShutdownReason::Console);

        assert_eq!(shutdown.wait().await, ShutdownReason::Terminate);
    }

    #[tokio::test]
    async fn wait_blocks_until_triggered() {
        let (trigger, mut shutdown) = channel();

        let pending = tokio::time::timeout(Duration::from_millis(50), shutdown.wait()).await;
        assert!(pending.is_err());

        tokio::spawn(async move { trigger.trigger(ShutdownReason::Interrupt) });
        let reason = tokio::time::timeout(Duration::from_secs(5), shutdown.wait()).await;
        assert_eq!(reason.ok(), Some(ShutdownReason::Interrupt));
    }
}
