//! Engine client for the workflow engine's job API.
//!
//! The worker only talks to the engine through the [`EngineClient`] trait.
//! Two implementations ship with this crate:
//!
//! - [`RestEngineClient`] - the gateway's REST job API, with an OAuth
//!   client-credentials token cache for SaaS clusters
//! - [`InMemoryEngine`] - an in-process engine for tests and local runs
//!
//! # Usage
//!
//! ```ignore
//! use engine::{EngineConfig, connect, EngineClient};
//!
//! let client = connect(EngineConfig::new("http://localhost:8080")).await?;
//! let topology = client.topology().await?;
//! ```

mod auth;
mod client;
mod config;
mod memory;
mod rest;

pub use auth::TokenProvider;
pub use client::{
    ActivateJobsRequest, BrokerInfo, EngineClient, EngineError, PartitionInfo, Topology,
};
pub use config::{EngineConfig, OAuthCredentials};
pub use memory::{CompletedJob, FailedJob, InMemoryEngine};
pub use rest::RestEngineClient;

/// Connect to the engine gateway described by `config`.
///
/// Only builds the client; call [`EngineClient::topology`] to check that the
/// gateway is actually reachable.
pub async fn connect(config: EngineConfig) -> Result<RestEngineClient, EngineError> {
    tracing::info!("Connecting to engine gateway: {}", config.address);
    RestEngineClient::new(config)
}
