//! Lights Demo
//!
//! A simulated lighting hub integrated as a Conduit service, plus a
//! consumer that reacts to the hub coming and going.
//!
//! The service declares a schema with defaults, so it starts even without
//! a `[services.lights]` section:
//!
//! ```toml
//! [services.lights]
//! host = "10.0.0.2"
//! port = 4100
//! lights = 6
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package lights-demo
//! cargo run --package lights-demo -- --rehost 10.0.0.3 --after 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use conduit::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Deserialize)]
struct LightsConfig {
    host: String,
    port: u16,
    lights: usize,
}

/// Connection to a (simulated) lighting hub.
struct LightsClient {
    endpoint: String,
    lights: Vec<AtomicBool>,
    listeners: AtomicUsize,
}

impl LightsClient {
    fn set_all(&self, on: bool) {
        for light in &self.lights {
            light.store(on, Ordering::SeqCst);
        }
    }

    fn lit(&self) -> usize {
        self.lights
            .iter()
            .filter(|l| l.load(Ordering::SeqCst))
            .count()
    }
}

struct LightsService;

#[async_trait]
impl ServiceDefinition for LightsService {
    type Config = LightsConfig;
    type Client = LightsClient;

    fn name(&self) -> &str {
        "lights"
    }

    fn schema(&self) -> ConfigSchema {
        ConfigSchema::object()
            .field(
                FieldSchema::optional("host", FieldKind::String)
                    .with_default("127.0.0.1")
                    .describe("Hub address"),
            )
            .field(FieldSchema::optional("port", FieldKind::Integer).with_default(4100))
            .field(
                FieldSchema::optional("lights", FieldKind::Integer)
                    .with_default(4)
                    .describe("Number of lights on the hub"),
            )
            .deny_unknown()
    }

    fn requires_config(&self) -> bool {
        false
    }

    async fn validate(&self, config: &LightsConfig, _logger: &ServiceLogger) -> ServiceResult {
        if config.host.trim().is_empty() {
            return failure("host must not be empty");
        }
        if config.port == 0 {
            return failure("port must not be 0");
        }
        if !(1..=64).contains(&config.lights) {
            return failure(format!("lights must be 1..=64, got {}", config.lights));
        }
        empty_success()
    }

    async fn create(&self, config: &LightsConfig, logger: &ServiceLogger) -> ServiceResult<LightsClient> {
        let endpoint = format!("{}:{}", config.host, config.port);
        logger.info(format_args!("Connecting to hub at {endpoint}"));

        // Simulated handshake
        tokio::time::sleep(Duration::from_millis(100)).await;
        if config.host == "unreachable" {
            return failure(format!("hub at {endpoint} did not answer"));
        }

        success(LightsClient {
            endpoint,
            lights: (0..config.lights).map(|_| AtomicBool::new(false)).collect(),
            listeners: AtomicUsize::new(1),
        })
    }

    async fn stop(&self, client: &LightsClient, logger: &ServiceLogger) -> ServiceResult {
        client.set_all(false);
        logger.info(format_args!("Disconnected from {}", client.endpoint));
        empty_success()
    }

    fn remove_handlers(&self, client: &LightsClient) {
        client.listeners.store(0, Ordering::SeqCst);
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// Turns every light on whenever a hub becomes available.
fn install_welcome_scene(handle: &ServiceHandle<LightsClient>) {
    handle.subscribe(
        |client| {
            client.set_all(true);
            info!(
                endpoint = %client.endpoint,
                lit = client.lit(),
                "Welcome scene applied"
            );
        },
        || warn!("Lights unavailable, welcome scene suspended"),
    );
}

// ============================================================================
// Main
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "lights-demo", about = "Simulated lighting hub on Conduit")]
struct Args {
    /// Configuration file; searches for conduit.toml when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Move to another hub while running.
    #[arg(long)]
    rehost: Option<String>,

    /// Seconds to wait before `--rehost`.
    #[arg(long, default_value_t = 5)]
    after: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ConduitRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = Arc::new(builder.build()?);

    runtime.register_service(LightsService)?;

    let lights = runtime
        .request_handle::<LightsClient>("lights")
        .ok_or_else(|| anyhow::anyhow!("lights service is not registered"))?;
    install_welcome_scene(&lights);

    if let Some(host) = args.rehost {
        let runtime = Arc::clone(&runtime);
        let after = Duration::from_secs(args.after);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            info!(host = %host, "Moving to another hub");
            if let Err(e) = runtime.apply_config("lights", json!({ "host": host })).await {
                error!(error = %e, "Failed to move to another hub");
            }
        });
    }

    runtime.run().await?;
    Ok(())
}
