//! The service registry.
//!
//! [`ServiceRegistry`] is the single owner of every registered service. It:
//!
//! - Accepts [`ServiceDefinition`]s and stores each as a service instance in
//!   state [`ServiceState::Unconfigured`].
//! - Drives the lifecycle on [`apply_config`](ServiceRegistry::apply_config):
//!   tear down the previous client, validate, create, announce.
//! - Hands out [`ServiceHandle`]s to consumers; handles can subscribe but can
//!   never reach the mutation surface.
//! - Tears everything down, in reverse registration order, on
//!   [`shutdown`](ServiceRegistry::shutdown).
//!
//! There is no process-wide instance: the host creates one registry, shares
//! it as `Arc<ServiceRegistry>`, and owns its shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Arc::new(ServiceRegistry::new());
//! registry.register(LightsService)?;
//!
//! let lights = registry.request_handle::<LightsClient>("lights").unwrap();
//! lights.on_available(|client| client.blink());
//!
//! registry.apply_config("lights", json!({ "host": "10.0.0.2" })).await?;
//! // …later…
//! registry.shutdown().await;
//! ```

use std::any::TypeId;
use std::sync::Arc;

use conduit_core::{
    ConfigSchema, RegistryResult, ServiceDefinition, ServiceError, ServiceState,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::broadcaster::SubscriptionBroadcaster;
use crate::handle::ServiceHandle;
use crate::instance::{ErasedService, ServiceInstance};

/// Counts of registered services by lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Registered services.
    pub total: usize,
    /// Services with a live client.
    pub ready: usize,
    /// Services whose last configuration attempt failed.
    pub errored: usize,
    /// Services with no configuration applied.
    pub unconfigured: usize,
    /// Services currently validating, creating or stopping.
    pub transitioning: usize,
}

/// Table of registered services, keyed by name.
#[derive(Default)]
pub struct ServiceRegistry {
    /// Registration order is preserved; shutdown walks it in reverse.
    services: RwLock<Vec<Arc<dyn ErasedService>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn ErasedService>> {
        self.services
            .read()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers a service definition in state [`ServiceState::Unconfigured`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::DuplicateService`] if a service with the same name is
    /// already registered.
    pub fn register<S: ServiceDefinition>(&self, definition: S) -> RegistryResult<()> {
        self.register_arc(Arc::new(definition))
    }

    /// Registers a shared service definition.
    pub fn register_arc<S: ServiceDefinition>(&self, definition: Arc<S>) -> RegistryResult<()> {
        let mut services = self.services.write();
        let name = definition.name().to_string();
        if services.iter().any(|s| s.name() == name) {
            error!(service = %name, "Service registered twice");
            return Err(ServiceError::DuplicateService(name));
        }
        services.push(Arc::new(ServiceInstance::new(definition)));
        info!(service = %name, "Service registered");
        Ok(())
    }

    /// Tears down the named service and removes it together with all of its
    /// subscriptions.
    pub async fn unregister(&self, name: &str) -> RegistryResult<()> {
        let instance = self
            .lookup(name)
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;

        // Removed before teardown so an interrupted unregister still forgets it.
        self.services
            .write()
            .retain(|s| !Arc::ptr_eq(s, &instance));
        instance.retire().await;
        info!(service = %name, "Service unregistered");
        Ok(())
    }

    /// Unregisters every service, most recently registered first.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self
            .services
            .read()
            .iter()
            .rev()
            .map(|s| s.name().to_string())
            .collect();

        debug!("Shutting down {} service(s)", names.len());

        for name in names {
            // A concurrent unregister may have removed it already.
            if let Err(e) = self.unregister(&name).await {
                debug!(service = %name, error = %e, "Skipped during shutdown");
            }
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Applies a configuration to the named service.
    ///
    /// Tears down the current client (if any), then validates `config` and
    /// creates a new client, announcing it to every subscriber. Calls for the
    /// same service are processed one at a time, in arrival order.
    ///
    /// Applying an identical configuration again still runs a full
    /// stop/validate/create cycle.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::ConfigValidation`]: schema check or `validate` failed;
    ///   no client was created and the service is now `Errored`.
    /// - [`ServiceError::ClientCreation`]: `create` failed; the service is now
    ///   `Errored`.
    /// - [`ServiceError::UnknownService`]: no such service.
    ///
    /// Failures to stop the previous client and panics in subscriber callbacks
    /// are logged and never returned.
    pub async fn apply_config(&self, name: &str, config: Value) -> RegistryResult<()> {
        let instance = self
            .lookup(name)
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;
        instance.apply_config(config).await
    }

    /// Removes the configuration of the named service, tearing down its
    /// client. The service stays registered, in state `Unconfigured`, and
    /// keeps its subscribers.
    pub async fn clear_config(&self, name: &str) -> RegistryResult<()> {
        let instance = self
            .lookup(name)
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;
        instance.clear_config().await
    }

    // ─── Consumers ───────────────────────────────────────────────────────────

    /// Returns a handle to the named service, or `None` if no such service is
    /// registered.
    ///
    /// `C` must be the service's client type; a mismatch is logged and also
    /// yields `None`.
    pub fn request_handle<C: Send + Sync + 'static>(&self, name: &str) -> Option<ServiceHandle<C>> {
        let Some(instance) = self.lookup(name) else {
            debug!(service = %name, "Handle requested for unregistered service");
            return None;
        };

        let (type_id, type_name) = instance.client_type();
        if type_id != TypeId::of::<C>() {
            warn!(
                service   = %name,
                expected  = type_name,
                requested = std::any::type_name::<C>(),
                "Handle requested with the wrong client type"
            );
            return None;
        }

        instance
            .broadcaster()
            .downcast::<SubscriptionBroadcaster<C>>()
            .ok()
            .map(ServiceHandle::new)
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Returns `true` if a service with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Current lifecycle state of the named service.
    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.lookup(name).map(|s| s.state())
    }

    /// The schema-checked configuration of the named service, while `Ready`.
    pub fn current_config(&self, name: &str) -> Option<Value> {
        self.lookup(name).and_then(|s| s.current_config())
    }

    /// Declared configuration schema of the named service.
    pub fn schema(&self, name: &str) -> Option<ConfigSchema> {
        self.lookup(name).map(|s| s.schema())
    }

    /// Whether the named service needs operator-supplied configuration.
    pub fn requires_config(&self, name: &str) -> Option<bool> {
        self.lookup(name).map(|s| s.requires_config())
    }

    /// Registered service names, in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services
            .read()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Counts services by state.
    pub fn stats(&self) -> RegistryStats {
        let services = self.services.read();
        let mut stats = RegistryStats {
            total: services.len(),
            ..Default::default()
        };
        for service in services.iter() {
            match service.state() {
                ServiceState::Ready => stats.ready += 1,
                ServiceState::Errored(_) => stats.errored += 1,
                ServiceState::Unconfigured => stats.unconfigured += 1,
                ServiceState::Validating | ServiceState::Creating | ServiceState::Stopping => {
                    stats.transitioning += 1
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::{ServiceLogger, ServiceResult, empty_success, failure, success};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ServiceDefinition for Echo {
        type Config = Value;
        type Client = String;

        fn name(&self) -> &str {
            "echo"
        }

        async fn validate(&self, config: &Value, _logger: &ServiceLogger) -> ServiceResult {
            if config.get("reject").is_some() {
                return failure("rejected");
            }
            empty_success()
        }

        async fn create(&self, config: &Value, _logger: &ServiceLogger) -> ServiceResult<String> {
            success(config.to_string())
        }

        async fn stop(&self, _client: &String, _logger: &ServiceLogger) -> ServiceResult {
            empty_success()
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = ServiceRegistry::new();
        registry.register(Echo).unwrap();
        let err = registry.register(Echo).unwrap_err();
        assert_eq!(err, ServiceError::DuplicateService("echo".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_request_handle() {
        let registry = ServiceRegistry::new();
        registry.register(Echo).unwrap();

        assert!(registry.request_handle::<String>("missing").is_none());
        assert!(registry.request_handle::<u64>("echo").is_none());

        let handle = registry.request_handle::<String>("echo").unwrap();
        assert_eq!(handle.name(), "echo");
        assert!(!handle.is_available());
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        let err = registry.apply_config("nope", json!({})).await.unwrap_err();
        assert_eq!(err, ServiceError::UnknownService("nope".into()));
        assert!(registry.unregister("nope").await.is_err());
        assert!(registry.clear_config("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_stats_and_queries() {
        let registry = ServiceRegistry::new();
        registry.register(Echo).unwrap();
        assert_eq!(registry.stats().unconfigured, 1);

        registry.apply_config("echo", json!({ "a": 1 })).await.unwrap();
        assert_eq!(registry.state("echo"), Some(ServiceState::Ready));
        assert_eq!(registry.current_config("echo"), Some(json!({ "a": 1 })));
        assert_eq!(registry.stats().ready, 1);

        registry
            .apply_config("echo", json!({ "reject": true }))
            .await
            .unwrap_err();
        assert_eq!(
            registry.state("echo"),
            Some(ServiceState::Errored("rejected".into()))
        );
        assert_eq!(registry.current_config("echo"), None);
        assert_eq!(registry.stats().errored, 1);
    }

    #[tokio::test]
    async fn test_clear_config_keeps_subscribers() {
        let registry = ServiceRegistry::new();
        registry.register(Echo).unwrap();
        let handle = registry.request_handle::<String>("echo").unwrap();
        handle.on_available(|_| {});

        registry.apply_config("echo", json!({})).await.unwrap();
        registry.clear_config("echo").await.unwrap();

        assert_eq!(registry.state("echo"), Some(ServiceState::Unconfigured));
        assert!(!handle.is_available());

        registry.apply_config("echo", json!({})).await.unwrap();
        assert!(handle.is_available());
    }

    #[tokio::test]
    async fn test_shutdown_removes_everything() {
        let registry = ServiceRegistry::new();
        registry.register(Echo).unwrap();
        registry.apply_config("echo", json!({})).await.unwrap();
        let handle = registry.request_handle::<String>("echo").unwrap();

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert!(!handle.is_available());
        assert!(registry.request_handle::<String>("echo").is_none());
    }
}
