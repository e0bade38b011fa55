//! Conduit Runtime - the host side of the Conduit service framework.
//!
//! This crate provides:
//! - Layered configuration loading (`conduit.toml`, `CONDUIT_*` variables)
//! - Logging setup driven by the `[logging]` section
//! - [`ConduitRuntime`], which owns a [`ServiceRegistry`], applies each
//!   `[services.<name>]` section at start-up and tears every service down
//!   on shutdown
//!
//! ```ignore
//! use conduit_runtime::ConduitRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ConduitRuntime::new();
//!     runtime.register_service(LightsService::default())?;
//!
//!     let lights = runtime.request_handle::<LightsClient>("lights").unwrap();
//!     lights.on_available(|client| client.blink());
//!
//!     // Applies configuration, then waits for Ctrl+C.
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! [`ServiceRegistry`]: conduit_framework::ServiceRegistry

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConduitConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ConduitRuntime, RuntimeBuilder, StartReport};

pub use tracing;

/// Logging macros for host code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
