//! Actor system for the job worker.
//!
//! This crate provides the Ractor-based workers that poll the engine for
//! jobs of one task type, run a [`JobHandler`] on each job and report the
//! outcome back to the engine.
//!
//! # Architecture
//!
//! - `Subscription` - Owns the worker actors for one task type
//! - `WorkerActor` - Activates jobs, runs the handler, completes or fails
//! - `MathHandler` - The `DoMathTask` handler
//!
//! # Usage
//!
//! ```ignore
//! use actors::{MathHandler, Subscription, SubscriptionConfig};
//!
//! let subscription =
//!     Subscription::open(client, MathHandler::default(), SubscriptionConfig::default()).await?;
//! // ... until shutdown
//! subscription.close().await;
//! ```

mod handler;
mod math_handler;
mod messages;
mod subscription;
mod worker_actor;

pub use handler::{FnHandler, HandlerError, HandlerFuture, HandlerResult, JobHandler};
pub use math_handler::{DEFAULT_TASK_TYPE, MathHandler};
pub use messages::{SubscriptionError, WorkerMessage, WorkerStats};
pub use subscription::{Subscription, SubscriptionConfig};
pub use worker_actor::{WorkerActor, WorkerActorState, WorkerArgs};

/// Re-export the job type handlers receive.
pub use worker_core::ActivatedJob;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
