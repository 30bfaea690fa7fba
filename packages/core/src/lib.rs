//! Core domain types for the job worker.
//!
//! This crate contains shared types used across all packages:
//! - ActivatedJob and JobKey for work handed out by the engine
//! - SimpleMath, the computation record behind the `DoMathTask` handler
//! - Events for observing worker progress
//! - LifecycleState for the worker process state machine

mod events;
mod job;
mod lifecycle;
mod math;

pub use events::JobEvent;
pub use job::{ActivatedJob, JobKey, Variables};
pub use lifecycle::{LifecycleError, LifecycleState};
pub use math::{MathError, SimpleMath, VariableError, read_integer};
