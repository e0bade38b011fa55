//! Host runtime.
//!
//! [`ConduitRuntime`] ties configuration to the registry: at start-up every
//! registered service receives its `[services.<name>]` section, and on
//! shutdown every service is torn down in reverse registration order.
//!
//! ```rust,ignore
//! use conduit_runtime::ConduitRuntime;
//!
//! // Auto-loads conduit.toml from the current directory
//! let runtime = ConduitRuntime::new();
//!
//! // Custom configuration path
//! let runtime = ConduitRuntime::builder()
//!     .config_file("config/conduit.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use conduit_core::{ServiceDefinition, ServiceError};
use conduit_framework::{RegistryStats, ServiceHandle, ServiceRegistry};
use serde_json::{Map, Value};
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{ConduitConfig, ConfigLoader, ConfigResult};
use crate::error::RuntimeResult;
use crate::logging;

/// Outcome of applying configuration at start-up.
#[derive(Debug, Default)]
pub struct StartReport {
    /// Services that reached `Ready`.
    pub ready: Vec<String>,
    /// Services whose configuration was rejected or whose client could not
    /// be created.
    pub failed: Vec<ServiceError>,
    /// Services left unconfigured because no section was provided.
    pub skipped: Vec<String>,
}

impl StartReport {
    /// Returns `true` if no service failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the service registry and drives it from configuration.
pub struct ConduitRuntime {
    config: ConduitConfig,
    registry: Arc<ServiceRegistry>,
    running: RwLock<bool>,
}

impl ConduitRuntime {
    /// Creates a runtime from the default configuration sources.
    ///
    /// Falls back to built-in defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new().load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            ConduitConfig::default()
        });

        Self::from_config(config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration and installs
    /// the global logger it describes.
    pub fn from_config(config: ConduitConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            services = config.services.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config,
            registry: Arc::new(ServiceRegistry::new()),
            running: RwLock::new(false),
        }
    }

    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// The registry owned by this runtime.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Registers a service. Services registered after [`start`](Self::start)
    /// stay unconfigured until [`apply_config`](Self::apply_config) is called.
    pub fn register_service<S: ServiceDefinition>(&self, definition: S) -> RuntimeResult<()> {
        self.registry.register(definition)?;
        Ok(())
    }

    /// Returns a consumer handle, see [`ServiceRegistry::request_handle`].
    pub fn request_handle<C: Send + Sync + 'static>(&self, name: &str) -> Option<ServiceHandle<C>> {
        self.registry.request_handle(name)
    }

    /// Applies a new configuration to one service.
    pub async fn apply_config(&self, name: &str, config: Value) -> RuntimeResult<()> {
        self.registry.apply_config(name, config).await?;
        Ok(())
    }

    /// Tears down one service's client and returns it to `Unconfigured`.
    pub async fn clear_config(&self, name: &str) -> RuntimeResult<()> {
        self.registry.clear_config(name).await?;
        Ok(())
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Applies each service's configuration section, in registration order.
    ///
    /// A service without a section is configured with `{}` when it does not
    /// require configuration, and left unconfigured otherwise. Failures are
    /// logged and collected; they do not stop other services from starting.
    pub async fn start(&self) -> RuntimeResult<StartReport> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Runtime is already running");
                return Ok(StartReport::default());
            }
            *running = true;
        }

        info!("Starting Conduit runtime");

        let names = self.registry.service_names();
        for section in self.config.services.keys() {
            if !names.contains(section) {
                warn!(service = %section, "Configuration section for unregistered service");
            }
        }

        let mut report = StartReport::default();
        for name in names {
            let section = match self.config.services.get(&name) {
                Some(section) => section.clone(),
                None if self.registry.requires_config(&name) == Some(false) => {
                    Value::Object(Map::new())
                }
                None => {
                    debug!(service = %name, "No configuration section, leaving unconfigured");
                    report.skipped.push(name);
                    continue;
                }
            };

            match self.registry.apply_config(&name, section).await {
                Ok(()) => report.ready.push(name),
                Err(e) => {
                    error!(service = %name, error = %e, "Failed to start service");
                    report.failed.push(e);
                }
            }
        }

        info!(
            ready = report.ready.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Runtime started"
        );

        Ok(report)
    }

    /// Tears down every service, most recently registered first.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Runtime is not running");
                return;
            }
            *running = false;
        }

        info!("Stopping Conduit runtime");
        self.registry.shutdown().await;
        info!("Runtime stopped");
    }

    /// Starts, waits for Ctrl+C or SIGTERM, then stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("Conduit runtime is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;

        self.stop().await;
        Ok(())
    }

    /// Starts, waits for `shutdown` to resolve, then stops.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

impl Default for ConduitRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

/// Builder for a [`ConduitRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (`development`, `production`, ...).
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides one service's configuration section.
    pub fn service_config(mut self, name: impl Into<String>, config: Value) -> Self {
        self.config_loader = self.config_loader.service(name, config);
        self
    }

    pub fn build(self) -> ConfigResult<ConduitRuntime> {
        let config = self.config_loader.load()?;
        Ok(ConduitRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use conduit_core::{
        ConfigSchema, FieldKind, FieldSchema, ServiceLogger, ServiceResult, ServiceState,
        empty_success, failure, success,
    };
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct LampConfig {
        host: String,
    }

    struct Lamp;

    #[async_trait]
    impl ServiceDefinition for Lamp {
        type Config = LampConfig;
        type Client = String;

        fn name(&self) -> &str {
            "lamp"
        }

        fn schema(&self) -> ConfigSchema {
            ConfigSchema::object().field(FieldSchema::required("host", FieldKind::String))
        }

        async fn validate(&self, config: &LampConfig, _logger: &ServiceLogger) -> ServiceResult {
            if config.host.is_empty() {
                return failure("empty host");
            }
            empty_success()
        }

        async fn create(&self, config: &LampConfig, _logger: &ServiceLogger) -> ServiceResult<String> {
            success(format!("lamp@{}", config.host))
        }

        async fn stop(&self, _client: &String, _logger: &ServiceLogger) -> ServiceResult {
            empty_success()
        }
    }

    #[derive(Deserialize)]
    struct ClockConfig {
        #[serde(default = "default_tick")]
        tick_ms: u64,
    }

    fn default_tick() -> u64 {
        1000
    }

    /// Works without any configuration section.
    struct Clock;

    #[async_trait]
    impl ServiceDefinition for Clock {
        type Config = ClockConfig;
        type Client = u64;

        fn name(&self) -> &str {
            "clock"
        }

        fn requires_config(&self) -> bool {
            false
        }

        async fn validate(&self, _config: &ClockConfig, _logger: &ServiceLogger) -> ServiceResult {
            empty_success()
        }

        async fn create(&self, config: &ClockConfig, _logger: &ServiceLogger) -> ServiceResult<u64> {
            success(config.tick_ms)
        }

        async fn stop(&self, _client: &u64, _logger: &ServiceLogger) -> ServiceResult {
            empty_success()
        }
    }

    fn runtime_with(services: Value) -> ConduitRuntime {
        let config = ConduitConfig {
            services: serde_json::from_value(services).unwrap(),
            ..Default::default()
        };
        let runtime = ConduitRuntime::from_config(config);
        runtime.register_service(Lamp).unwrap();
        runtime.register_service(Clock).unwrap();
        runtime
    }

    #[tokio::test]
    async fn test_start_applies_sections() {
        let runtime = runtime_with(json!({ "lamp": { "host": "10.0.0.2" } }));
        let lamp = runtime.request_handle::<String>("lamp").unwrap();

        let report = runtime.start().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.ready, vec!["lamp".to_string(), "clock".to_string()]);
        assert_eq!(lamp.current_client().as_deref(), Some(&"lamp@10.0.0.2".to_string()));

        let clock = runtime.request_handle::<u64>("clock").unwrap();
        assert_eq!(clock.current_client().as_deref(), Some(&1000));
    }

    #[tokio::test]
    async fn test_start_skips_services_requiring_config() {
        let runtime = runtime_with(json!({}));

        let report = runtime.start().await.unwrap();

        assert_eq!(report.skipped, vec!["lamp".to_string()]);
        assert_eq!(report.ready, vec!["clock".to_string()]);
        assert_eq!(
            runtime.registry().state("lamp"),
            Some(ServiceState::Unconfigured)
        );
    }

    #[tokio::test]
    async fn test_start_collects_failures() {
        let runtime = runtime_with(json!({ "lamp": { "host": "" } }));

        let report = runtime.start().await.unwrap();

        assert!(!report.is_clean());
        assert!(matches!(
            &report.failed[..],
            [ServiceError::ConfigValidation { service, .. }] if service == "lamp"
        ));
        assert_eq!(report.ready, vec!["clock".to_string()]);
        assert_eq!(runtime.stats().errored, 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let runtime = runtime_with(json!({ "lamp": { "host": "a" } }));

        runtime.start().await.unwrap();
        let second = runtime.start().await.unwrap();

        assert!(second.ready.is_empty());
        assert!(runtime.is_running().await);
    }

    #[tokio::test]
    async fn test_run_until_tears_down() {
        let runtime = runtime_with(json!({ "lamp": { "host": "a" } }));
        let lamp = runtime.request_handle::<String>("lamp").unwrap();

        let available = Arc::new(AtomicUsize::new(0));
        let unavailable = Arc::new(AtomicUsize::new(0));
        {
            let available = Arc::clone(&available);
            let unavailable = Arc::clone(&unavailable);
            lamp.subscribe(
                move |_| {
                    available.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    unavailable.fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        runtime.run_until(async {}).await.unwrap();

        assert_eq!(available.load(Ordering::SeqCst), 1);
        assert_eq!(unavailable.load(Ordering::SeqCst), 1);
        assert!(!runtime.is_running().await);
        assert!(runtime.registry().is_empty());
    }

    #[tokio::test]
    async fn test_apply_config_after_start() {
        let runtime = runtime_with(json!({}));
        runtime.start().await.unwrap();

        runtime
            .apply_config("lamp", json!({ "host": "late" }))
            .await
            .unwrap();
        assert_eq!(runtime.registry().state("lamp"), Some(ServiceState::Ready));

        runtime.clear_config("lamp").await.unwrap();
        assert_eq!(
            runtime.registry().state("lamp"),
            Some(ServiceState::Unconfigured)
        );

        let err = runtime.apply_config("ghost", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            crate::RuntimeError::Registry(ServiceError::UnknownService(_))
        ));
    }
}
