//! # Conduit Framework
//!
//! Service lifecycle management and availability broadcasting.
//!
//! - [`ServiceRegistry`]: owns every registered service, sequences
//!   teardown → validate → create on each configuration change, and
//!   guarantees at most one live client per service.
//! - [`SubscriptionBroadcaster`]: ordered, panic-isolated fan-out of
//!   availability changes to consumers.
//! - [`ServiceHandle`]: what a consumer gets back from
//!   [`ServiceRegistry::request_handle`]; it can subscribe, nothing more.
//!
//! ```text
//!  consumer ──request_handle──► ServiceRegistry ──apply_config──► ServiceDefinition
//!     ▲                               │                          (validate/create/stop)
//!     │ on_available / on_unavailable │
//!     └────── SubscriptionBroadcaster ◄┘
//! ```

pub mod broadcaster;
pub mod handle;
mod instance;
pub mod registry;

pub use broadcaster::{AvailableFn, SubscriptionBroadcaster, UnavailableFn};
pub use handle::ServiceHandle;
pub use registry::{RegistryStats, ServiceRegistry};

pub use conduit_core::{ServiceError, ServiceState};
