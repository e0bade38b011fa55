//! # Conduit Core
//!
//! Foundation types shared by every part of the Conduit service framework:
//!
//! - [`ServiceResult`] / [`Failure`]: the envelope returned by adapter callbacks
//! - [`ServiceDefinition`]: the integration contract (validate, create, stop)
//! - [`ServiceState`]: the per-service lifecycle state machine
//! - [`ServiceError`]: the error taxonomy of the registry and broadcaster
//! - [`ServiceLogger`]: the scoped logger injected into callbacks
//! - [`ConfigSchema`]: declarative configuration shapes and their checker
//!
//! The registry, broadcaster and consumer handles live in `conduit-framework`.

pub mod definition;
pub mod error;
pub mod logger;
pub mod result;
pub mod schema;
pub mod state;

pub use definition::ServiceDefinition;
pub use error::{RegistryResult, ServiceError};
pub use logger::{SERVICE_LOG_TARGET, ServiceLogger};
pub use result::{Failure, ServiceResult, empty_success, failure, success};
pub use schema::{ConfigSchema, FieldKind, FieldSchema, SchemaViolation};
pub use state::ServiceState;

/// Prelude for adapter authors.
pub mod prelude {
    pub use super::{
        ConfigSchema, Failure, FieldKind, FieldSchema, ServiceDefinition, ServiceLogger,
        ServiceResult, empty_success, failure, success,
    };
}
