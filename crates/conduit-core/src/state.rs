//! Lifecycle state of a registered service.

use std::fmt;

use serde::Serialize;

/// Tracks where a service instance is in its lifecycle.
///
/// The state machine is:
///
/// ```text
/// register()      ──► Unconfigured
/// apply_config()  ──► Validating ──► Creating ──► Ready
///                          │              │
///                          └──────────────┴──► Errored(message)
/// apply_config()  (Ready) ──► Stopping ──► Validating ...
/// clear_config()  (Ready) ──► Stopping ──► Unconfigured
/// apply_config()  (Errored) ──► Validating ...
/// ```
///
/// A client exists if and only if the state is [`ServiceState::Ready`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ServiceState {
    /// Registered, no configuration applied yet (or configuration removed).
    Unconfigured,
    /// A configuration is being checked.
    Validating,
    /// The configuration was accepted; the client is being constructed.
    Creating,
    /// A live client exists and has been announced to subscribers.
    Ready,
    /// The live client is being torn down.
    Stopping,
    /// The last configuration attempt failed with this message.
    Errored(String),
}

impl ServiceState {
    /// Returns `true` while a live client exists.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` for states in which no lifecycle step is in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Unconfigured | Self::Ready | Self::Errored(_))
    }

    /// Returns the failure message retained by [`ServiceState::Errored`].
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Errored(message) => Some(message),
            _ => None,
        }
    }

    /// Short lowercase label, used in logs and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Validating => "validating",
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
            Self::Errored(_) => "errored",
        }
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (Unconfigured | Errored(_), Validating)
                | (Validating, Creating | Errored(_))
                | (Creating, Ready | Errored(_))
                | (Ready, Stopping)
                | (Stopping, Validating | Unconfigured | Errored(_))
                | (Errored(_), Unconfigured)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Errored(message) => write!(f, "errored: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            ServiceState::Unconfigured,
            ServiceState::Validating,
            ServiceState::Creating,
            ServiceState::Ready,
            ServiceState::Stopping,
            ServiceState::Validating,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_errored_is_reenterable() {
        let errored = ServiceState::Errored("bad host".into());
        assert!(errored.can_transition_to(&ServiceState::Validating));
        assert_eq!(errored.error_message(), Some("bad host"));
        assert!(errored.is_settled());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!ServiceState::Unconfigured.can_transition_to(&ServiceState::Ready));
        assert!(!ServiceState::Ready.can_transition_to(&ServiceState::Validating));
        assert!(!ServiceState::Validating.can_transition_to(&ServiceState::Ready));
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(ServiceState::Errored("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "errored", "message": "x" }));
        let json = serde_json::to_value(ServiceState::Ready).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "ready" }));
    }
}
