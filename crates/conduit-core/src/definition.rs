//! The integration contract implemented by every service adapter.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::logger::ServiceLogger;
use crate::result::ServiceResult;
use crate::schema::ConfigSchema;

/// Static description of one integration: its name, configuration shape and
/// the callbacks that validate configuration and create/stop its client.
///
/// A definition is registered once at startup and never mutated. The registry
/// owns the client it produces; consumers only ever see it through
/// subscription callbacks as an `Arc<Self::Client>`.
///
/// # Example
///
/// ```rust,ignore
/// use conduit::prelude::*;
///
/// #[derive(serde::Deserialize)]
/// struct LightsConfig { host: String }
///
/// struct Lights;
///
/// #[async_trait::async_trait]
/// impl ServiceDefinition for Lights {
///     type Config = LightsConfig;
///     type Client = LightsClient;
///
///     fn name(&self) -> &str { "lights" }
///
///     async fn validate(&self, config: &LightsConfig, _log: &ServiceLogger) -> ServiceResult {
///         if config.host.is_empty() { return failure("host must not be empty"); }
///         empty_success()
///     }
///
///     async fn create(&self, config: &LightsConfig, log: &ServiceLogger) -> ServiceResult<LightsClient> {
///         log.info(format_args!("connecting to {}", config.host));
///         success(LightsClient::connect(&config.host).await?)
///     }
///
///     async fn stop(&self, client: &LightsClient, _log: &ServiceLogger) -> ServiceResult {
///         client.close().await;
///         empty_success()
///     }
/// }
/// ```
#[async_trait]
pub trait ServiceDefinition: Send + Sync + 'static {
    /// Typed configuration, deserialized from the schema-checked JSON value.
    type Config: DeserializeOwned + Send + Sync + 'static;

    /// The client handed to consumers. Never inspected by the framework.
    type Client: Send + Sync + 'static;

    /// Globally unique service name.
    fn name(&self) -> &str;

    /// Declarative shape of the configuration. Defaults to accepting anything.
    fn schema(&self) -> ConfigSchema {
        ConfigSchema::any()
    }

    /// Whether the service needs operator-supplied configuration.
    ///
    /// When `false`, the host applies an empty configuration at startup even
    /// if none was supplied.
    fn requires_config(&self) -> bool {
        true
    }

    /// Semantic validation of a schema-conforming configuration.
    async fn validate(&self, config: &Self::Config, logger: &ServiceLogger) -> ServiceResult;

    /// Constructs a client from a validated configuration.
    async fn create(
        &self,
        config: &Self::Config,
        logger: &ServiceLogger,
    ) -> ServiceResult<Self::Client>;

    /// Releases the resources held by `client`.
    ///
    /// Failures are logged by the registry and never block reconfiguration.
    async fn stop(&self, client: &Self::Client, logger: &ServiceLogger) -> ServiceResult;

    /// Detaches any event handlers the client has registered, so that no
    /// in-flight callback fires once teardown has begun. Called before
    /// [`stop`](Self::stop).
    fn remove_handlers(&self, _client: &Self::Client) {}
}
