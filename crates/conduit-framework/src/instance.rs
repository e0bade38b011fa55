//! Per-service lifecycle driver.
//!
//! A [`ServiceInstance`] wraps one [`ServiceDefinition`] together with its
//! current client, configuration and [`ServiceState`]. The registry stores
//! instances type-erased behind [`ErasedService`], since every definition has
//! its own `Config` and `Client` types.
//!
//! Every operation that may create or destroy a client holds the instance's
//! `gate` for its whole duration. The gate is a fair (FIFO) async mutex, so
//! concurrent configuration attempts for the same service run one after
//! another, in arrival order, and the previous client's `stop` has always
//! returned before the next `create` begins.
//!
//! The sequence runs inside the caller's future. If that future is dropped
//! part-way (a timeout, a losing `select!` branch), a [`CancelGuard`] settles
//! the instance to `Errored` and retracts any client that was already
//! announced, so the next attempt starts from a settled state.

use std::any::{Any, TypeId, type_name};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use conduit_core::{
    ConfigSchema, Failure, RegistryResult, ServiceDefinition, ServiceError, ServiceLogger,
    ServiceResult, ServiceState,
};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::broadcaster::SubscriptionBroadcaster;

/// Awaits an adapter callback, converting a panic into a [`Failure`].
async fn guarded<T>(fut: impl Future<Output = ServiceResult<T>>) -> ServiceResult<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Failure::from_panic(payload.as_ref())),
    }
}

// =============================================================================
// ErasedService
// =============================================================================

/// Object-safe view of a [`ServiceInstance`], used by the registry.
#[async_trait]
pub(crate) trait ErasedService: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    fn current_config(&self) -> Option<Value>;

    fn schema(&self) -> ConfigSchema;

    fn requires_config(&self) -> bool;

    fn client_type(&self) -> (TypeId, &'static str);

    /// The instance's `Arc<SubscriptionBroadcaster<Client>>`, for downcasting.
    fn broadcaster(&self) -> Arc<dyn Any + Send + Sync>;

    async fn apply_config(&self, config: Value) -> RegistryResult<()>;

    async fn clear_config(&self) -> RegistryResult<()>;

    /// Tears down any live client and refuses all further configuration.
    async fn retire(&self);
}

/// Message stored in [`ServiceState::Errored`] after an interrupted attempt.
const CANCELLED: &str = "configuration attempt cancelled";

// =============================================================================
// ServiceInstance
// =============================================================================

struct Slot<C> {
    state: ServiceState,
    client: Option<Arc<C>>,
    config: Option<Value>,
}

/// The live state of one registered service.
pub(crate) struct ServiceInstance<S: ServiceDefinition> {
    definition: Arc<S>,
    name: Arc<str>,
    logger: ServiceLogger,
    /// Serializes apply/clear/retire; held across every await of a sequence.
    gate: AsyncMutex<()>,
    /// Set once the instance has been unregistered.
    retired: AtomicBool,
    slot: RwLock<Slot<S::Client>>,
    broadcaster: Arc<SubscriptionBroadcaster<S::Client>>,
}

impl<S: ServiceDefinition> ServiceInstance<S> {
    pub(crate) fn new(definition: Arc<S>) -> Self {
        let name: Arc<str> = Arc::from(definition.name());
        Self {
            logger: ServiceLogger::new(Arc::clone(&name)),
            broadcaster: Arc::new(SubscriptionBroadcaster::new(Arc::clone(&name))),
            gate: AsyncMutex::new(()),
            retired: AtomicBool::new(false),
            slot: RwLock::new(Slot {
                state: ServiceState::Unconfigured,
                client: None,
                config: None,
            }),
            definition,
            name,
        }
    }

    fn transition(&self, next: ServiceState) {
        let mut slot = self.slot.write();
        debug_assert!(
            slot.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            slot.state,
            next
        );
        debug!(service = %self.name, from = %slot.state, to = %next, "State transition");
        slot.state = next;
    }

    /// Records a failed attempt and hands the error back to the caller.
    fn fail(&self, err: ServiceError, message: String) -> RegistryResult<()> {
        warn!(service = %self.name, error = %err, "Configuration attempt failed");
        self.transition(ServiceState::Errored(message));
        Err(err)
    }

    /// Stops the live client, if any, and announces it as unavailable.
    ///
    /// Leaves the state at `Stopping` when a client was torn down, so the
    /// caller decides where the instance goes next. Must be called with the
    /// gate held.
    async fn teardown(&self) -> bool {
        let client = {
            let mut slot = self.slot.write();
            if !slot.state.is_ready() {
                return false;
            }
            debug!(service = %self.name, from = %slot.state, to = "stopping", "State transition");
            slot.state = ServiceState::Stopping;
            slot.config = None;
            slot.client.take()
        };
        let Some(client) = client else {
            return false;
        };

        // Detach handlers first so the old client cannot call back into
        // consumers once teardown has started.
        if let Err(payload) =
            catch_unwind(AssertUnwindSafe(|| self.definition.remove_handlers(&client)))
        {
            let err = ServiceError::teardown(
                &*self.name,
                Failure::from_panic(payload.as_ref()).into_message(),
            );
            error!(service = %self.name, error = %err, "remove_handlers failed");
        }

        if let Err(failure) = guarded(self.definition.stop(&client, &self.logger)).await {
            let err = ServiceError::teardown(&*self.name, failure.into_message());
            error!(
                service = %self.name,
                error   = %err,
                "Client stop failed, continuing teardown"
            );
        }

        self.broadcaster.broadcast_unavailable();
        drop(client);

        info!(service = %self.name, "Client stopped");
        true
    }

    async fn run_attempt(&self, config: Value) -> RegistryResult<()> {
        self.transition(ServiceState::Validating);

        let checked = match self.definition.schema().check(&config) {
            Ok(checked) => checked,
            Err(violation) => {
                let message = violation.to_string();
                return self.fail(ServiceError::validation(&*self.name, &message), message);
            }
        };

        let typed: S::Config = match serde_json::from_value(checked.clone()) {
            Ok(typed) => typed,
            Err(e) => {
                let message = format!("configuration does not match the expected shape: {e}");
                return self.fail(ServiceError::validation(&*self.name, &message), message);
            }
        };

        if let Err(failure) = guarded(self.definition.validate(&typed, &self.logger)).await {
            let message = failure.into_message();
            return self.fail(ServiceError::validation(&*self.name, &message), message);
        }

        self.transition(ServiceState::Creating);

        let client = match guarded(self.definition.create(&typed, &self.logger)).await {
            Ok(client) => Arc::new(client),
            Err(failure) => {
                let message = failure.into_message();
                return self.fail(ServiceError::creation(&*self.name, &message), message);
            }
        };

        {
            let mut slot = self.slot.write();
            debug_assert!(slot.client.is_none(), "a live client already exists");
            debug!(service = %self.name, from = %slot.state, to = "ready", "State transition");
            slot.state = ServiceState::Ready;
            slot.client = Some(Arc::clone(&client));
            slot.config = Some(checked);
        }

        info!(service = %self.name, "Client created and available");
        self.broadcaster.broadcast_available(client);
        Ok(())
    }

    /// Recovers from a sequence whose future was dropped before it finished.
    ///
    /// Called with the gate still held, from [`CancelGuard::drop`].
    fn settle_cancelled(&self) {
        {
            let mut slot = self.slot.write();
            if slot.state.is_settled() {
                return;
            }
            warn!(service = %self.name, from = %slot.state, "Configuration attempt cancelled");
            slot.state = ServiceState::Errored(CANCELLED.to_string());
            slot.client = None;
            slot.config = None;
        }

        // A client torn down mid-`stop` was never announced as gone.
        self.broadcaster.broadcast_unavailable();
    }

    /// Moves a settled instance back to `Unconfigured`.
    fn settle_unconfigured(&self) {
        let state = self.slot.read().state.clone();
        if matches!(state, ServiceState::Stopping | ServiceState::Errored(_)) {
            self.transition(ServiceState::Unconfigured);
        }
    }
}

/// Settles the instance if a gated sequence is dropped before completing.
///
/// Must be created after the gate is acquired, so that it drops first.
struct CancelGuard<'a, S: ServiceDefinition> {
    instance: &'a ServiceInstance<S>,
    armed: bool,
}

impl<'a, S: ServiceDefinition> CancelGuard<'a, S> {
    fn new(instance: &'a ServiceInstance<S>) -> Self {
        Self {
            instance,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: ServiceDefinition> Drop for CancelGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.instance.settle_cancelled();
        }
    }
}

#[async_trait]
impl<S: ServiceDefinition> ErasedService for ServiceInstance<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ServiceState {
        self.slot.read().state.clone()
    }

    fn current_config(&self) -> Option<Value> {
        self.slot.read().config.clone()
    }

    fn schema(&self) -> ConfigSchema {
        self.definition.schema()
    }

    fn requires_config(&self) -> bool {
        self.definition.requires_config()
    }

    fn client_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<S::Client>(), type_name::<S::Client>())
    }

    fn broadcaster(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.broadcaster) as Arc<dyn Any + Send + Sync>
    }

    async fn apply_config(&self, config: Value) -> RegistryResult<()> {
        let _gate = self.gate.lock().await;
        if self.retired.load(Ordering::Acquire) {
            return Err(ServiceError::UnknownService(self.name.to_string()));
        }

        debug!(service = %self.name, "Applying configuration");
        let guard = CancelGuard::new(self);
        self.teardown().await;
        let result = self.run_attempt(config).await;
        guard.disarm();
        result
    }

    async fn clear_config(&self) -> RegistryResult<()> {
        let _gate = self.gate.lock().await;
        if self.retired.load(Ordering::Acquire) {
            return Err(ServiceError::UnknownService(self.name.to_string()));
        }

        let guard = CancelGuard::new(self);
        self.teardown().await;
        guard.disarm();
        self.settle_unconfigured();
        info!(service = %self.name, "Configuration cleared");
        Ok(())
    }

    async fn retire(&self) {
        let _gate = self.gate.lock().await;
        if self.retired.swap(true, Ordering::AcqRel) {
            return;
        }
        let guard = CancelGuard::new(self);
        self.teardown().await;
        guard.disarm();
        self.settle_unconfigured();
    }
}
