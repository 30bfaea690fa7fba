//! Worker process lifecycle.

use serde::{Deserialize, Serialize};

/// State of the worker process.
///
/// `Disconnected -> Connecting -> Subscribed -> Draining -> Terminated`.
/// A failure while connecting goes straight to `Terminated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Disconnected,
    Connecting,
    /// Connected, topology checked and the subscription is open.
    Subscribed,
    /// Shutdown requested, releasing the subscription and connection.
    Draining,
    Terminated,
}

impl LifecycleState {
    /// Check whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Subscribed)
                | (Connecting, Terminated)
                | (Subscribed, Draining)
                | (Draining, Terminated)
        )
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: LifecycleState) -> Result<(), LifecycleError> {
        if !self.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Terminated
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Disconnected => write!(f, "disconnected"),
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Subscribed => write!(f, "subscribed"),
            LifecycleState::Draining => write!(f, "draining"),
            LifecycleState::Terminated => write!(f, "terminated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}
