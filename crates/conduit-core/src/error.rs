//! Error taxonomy for the service lifecycle.
//!
//! Only [`ServiceError::ConfigValidation`], [`ServiceError::ClientCreation`]
//! and [`ServiceError::UnknownService`] are ever returned to whoever applied a
//! configuration. [`ServiceError::Teardown`] and
//! [`ServiceError::SubscriberCallback`] are constructed for logging and are
//! contained by the framework.

use thiserror::Error;

/// Errors produced by the service registry and broadcaster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Schema or semantic validation of a configuration failed.
    #[error("invalid configuration for service '{service}': {message}")]
    ConfigValidation {
        /// The service whose configuration was rejected.
        service: String,
        /// Reason reported by the schema check or the adapter.
        message: String,
    },

    /// The adapter failed to construct a client.
    #[error("failed to create client for service '{service}': {message}")]
    ClientCreation {
        /// The service whose client could not be created.
        service: String,
        /// Reason reported by the adapter.
        message: String,
    },

    /// The adapter failed to stop a client.
    #[error("failed to stop client of service '{service}': {message}")]
    Teardown {
        /// The service being torn down.
        service: String,
        /// Reason reported by the adapter.
        message: String,
    },

    /// A subscriber callback panicked during a broadcast.
    #[error("subscriber #{subscriber} of service '{service}' panicked: {message}")]
    SubscriberCallback {
        /// The service being broadcast.
        service: String,
        /// Position of the subscriber in subscription order.
        subscriber: usize,
        /// The panic message.
        message: String,
    },

    /// A service with this name is already registered.
    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    /// No service with this name is registered.
    #[error("service '{0}' is not registered")]
    UnknownService(String),
}

impl ServiceError {
    /// Creates a configuration validation error.
    pub fn validation(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a client creation error.
    pub fn creation(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientCreation {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a teardown error.
    pub fn teardown(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Teardown {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns the name of the service this error concerns.
    pub fn service(&self) -> &str {
        match self {
            Self::ConfigValidation { service, .. }
            | Self::ClientCreation { service, .. }
            | Self::Teardown { service, .. }
            | Self::SubscriberCallback { service, .. } => service,
            Self::DuplicateService(service) | Self::UnknownService(service) => service,
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_service_and_message() {
        let err = ServiceError::validation("lights", "bad host");
        assert_eq!(
            err.to_string(),
            "invalid configuration for service 'lights': bad host"
        );
        assert_eq!(err.service(), "lights");
    }

    #[test]
    fn test_service_accessor() {
        assert_eq!(ServiceError::UnknownService("irc".into()).service(), "irc");
        let err = ServiceError::SubscriberCallback {
            service: "mqtt".into(),
            subscriber: 2,
            message: "boom".into(),
        };
        assert_eq!(err.service(), "mqtt");
        assert!(err.to_string().contains("#2"));
    }
}
