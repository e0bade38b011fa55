//! # Conduit
//!
//! Typed service lifecycle management for plugin hosts.
//!
//! ## Overview
//!
//! A *service* is a long-lived client to some external system (a lighting
//! hub, a database, a message bus) that several plugins want to use. Conduit
//! lets one integration author describe how to validate, create and stop the
//! client, and lets any number of consumers subscribe to it becoming
//! available or unavailable, without either side knowing about the other.
//!
//! ```text
//! ┌────────────────┐  apply_config  ┌─────────────────┐  validate/create/stop  ┌───────────────────┐
//! │ ConduitRuntime │───────────────▶│ ServiceRegistry │───────────────────────▶│ ServiceDefinition │
//! │ (conduit.toml) │                └────────┬────────┘                        └───────────────────┘
//! └────────────────┘                         │ available(client) / unavailable()
//!                                            ▼
//!                              ┌──────────────────────────┐
//!                              │ SubscriptionBroadcaster  │──▶ ServiceHandle (consumer)
//!                              └──────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration and drives the registry at start-up and shutdown
//! - **Registry**: sequences teardown → validate → create, one client per service at a time
//! - **Broadcaster**: ordered, panic-isolated fan-out of availability changes
//! - **Handles**: the only surface consumers see
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ConduitRuntime::new();
//!     runtime.register_service(LightsService)?;
//!
//!     let lights = runtime.request_handle::<LightsClient>("lights").unwrap();
//!     lights.subscribe(
//!         |client| client.blink(),
//!         || tracing::info!("lights gone"),
//!     );
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `conduit.toml`
//! - `yaml-config`: read `conduit.yaml`
//! - `json-log`: JSON log output

pub use conduit_core as core;
pub use conduit_framework as framework;
pub use conduit_runtime as runtime;

pub use conduit_core::{
    ConfigSchema, Failure, FieldKind, FieldSchema, RegistryResult, ServiceDefinition,
    ServiceError, ServiceLogger, ServiceResult, ServiceState, empty_success, failure, success,
};
pub use conduit_framework::{
    RegistryStats, ServiceHandle, ServiceRegistry, SubscriptionBroadcaster,
};
pub use conduit_runtime::{ConduitConfig, ConduitRuntime, RuntimeError, RuntimeResult};

/// Everything needed to write a service or consume one.
///
/// ```rust,ignore
/// use conduit::prelude::*;
/// ```
pub mod prelude {
    // Host entry point
    pub use conduit_runtime::ConduitRuntime;

    // Integration contract
    pub use conduit_core::prelude::*;
    pub use conduit_core::ServiceState;

    // Consumer side
    pub use conduit_framework::{ServiceHandle, ServiceRegistry};
}
