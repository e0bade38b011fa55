//! Scoped logger handed to service callbacks.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

/// Target used for every event emitted through a [`ServiceLogger`].
///
/// Filter adapter output with e.g. `conduit::service=debug`.
pub const SERVICE_LOG_TARGET: &str = "conduit::service";

/// A named logging sink bound to one service.
///
/// Every message is emitted as a `tracing` event under
/// [`SERVICE_LOG_TARGET`] with a `service` field, so adapter output can be
/// filtered per service without the adapter knowing about the subscriber setup.
///
/// ```rust,ignore
/// logger.info(format_args!("connected to {}", config.host));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceLogger {
    name: Arc<str>,
}

impl ServiceLogger {
    /// Creates a logger scoped to `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// The service name this logger is scoped to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trace(&self, message: impl fmt::Display) {
        trace!(target: SERVICE_LOG_TARGET, service = %self.name, "{message}");
    }

    pub fn debug(&self, message: impl fmt::Display) {
        debug!(target: SERVICE_LOG_TARGET, service = %self.name, "{message}");
    }

    pub fn info(&self, message: impl fmt::Display) {
        info!(target: SERVICE_LOG_TARGET, service = %self.name, "{message}");
    }

    pub fn warn(&self, message: impl fmt::Display) {
        warn!(target: SERVICE_LOG_TARGET, service = %self.name, "{message}");
    }

    pub fn error(&self, message: impl fmt::Display) {
        error!(target: SERVICE_LOG_TARGET, service = %self.name, "{message}");
    }
}
