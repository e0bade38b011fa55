//! The success/failure envelope returned by adapter callbacks.
//!
//! Every fallible callback a service definition supplies (`validate`,
//! `create`, `stop`) returns a [`ServiceResult`]. A declared failure is a
//! [`Failure`] carrying a human-readable message; there is no second channel.
//! Panics raised inside a callback are caught by the registry and converted
//! with [`Failure::from_panic`] before they can cross the framework boundary.

use std::any::Any;

use thiserror::Error;

/// A declared failure reported by an adapter callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    message: String,
}

impl Failure {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the failure and returns its message.
    pub fn into_message(self) -> String {
        self.message
    }

    /// Converts a panic payload into a failure.
    ///
    /// `panic!` payloads are either `&'static str` or `String`; anything else
    /// is reported with a generic message.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "callback panicked with a non-string payload".to_string()
        };
        Self::new(format!("panicked: {message}"))
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type returned by service definition callbacks.
///
/// The unit default covers the void-success case used by `validate` and `stop`.
pub type ServiceResult<T = ()> = Result<T, Failure>;

/// Wraps `value` in a successful result.
#[inline]
pub fn success<T>(value: T) -> ServiceResult<T> {
    Ok(value)
}

/// A successful result carrying no value.
#[inline]
pub fn empty_success() -> ServiceResult {
    Ok(())
}

/// A failed result with the given message.
#[inline]
pub fn failure<T>(message: impl Into<String>) -> ServiceResult<T> {
    Err(Failure::new(message))
}
