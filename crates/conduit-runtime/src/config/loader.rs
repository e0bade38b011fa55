//! Configuration loader using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`conduit.{profile}.toml` / `conduit.{profile}.yaml`)
//! 3. Main file (`conduit.toml` / `conduit.yaml`)
//! 4. Environment variables (`CONDUIT_*`)
//! 5. Programmatic overrides added with [`ConfigLoader::service`]
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: searches `conduit.toml`
//! - `yaml-config`: searches `conduit.yaml` and `conduit.yml`
//!
//! # Environment Variable Mapping
//!
//! Keys use the `CONDUIT_` prefix with `__` as the nesting separator:
//!
//! - `CONDUIT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `CONDUIT_SERVICES__LIGHTS__HOST=10.0.0.2` → `services.lights.host = "10.0.0.2"`
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ConduitConfig;
use super::validation::validate_config;

/// Environment variable prefix for configuration keys.
pub const ENV_PREFIX: &str = "CONDUIT_";

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "CONDUIT_PROFILE";

/// File stem searched in every search path.
const FILE_STEM: &str = "conduit";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as used in file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev`/`prod` abbreviations.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads the profile from `CONDUIT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-source configuration loader.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Vec<(String, Value)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the default locations and reads
    /// `CONDUIT_*` environment variables.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Vec::new(),
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for `conduit.*` files.
    ///
    /// When no search path is added, the current directory and the user
    /// config directory (`~/.config/conduit`) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment variable overrides.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Overrides the configuration section of one service.
    ///
    /// Overrides take precedence over files and the environment.
    pub fn service(mut self, name: impl Into<String>, config: Value) -> Self {
        self.overrides.push((name.into(), config));
        self
    }

    /// Loads, merges and validates the configuration.
    pub fn load(self) -> ConfigResult<ConduitConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: ConduitConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            services = config.services.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ConduitConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        for (name, config) in self.overrides {
            figment = figment.merge(Serialized::default(&format!("services.{name}"), config));
        }

        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(FILE_STEM));
        }
        paths
    }

    /// Merges the first `conduit.<ext>` found along the search paths,
    /// preceded by its profile-specific sibling if one exists.
    fn search_config_files(&self, mut figment: Figment) -> Figment {
        let extensions: &[&str] = &[
            #[cfg(feature = "toml-config")]
            "toml",
            #[cfg(feature = "yaml-config")]
            "yaml",
            #[cfg(feature = "yaml-config")]
            "yml",
        ];

        for dir in self.resolve_search_paths() {
            for ext in extensions {
                let base = dir.join(format!("{FILE_STEM}.{ext}"));
                if !base.exists() {
                    continue;
                }

                let profiled = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
                if profiled.exists() {
                    debug!(path = %profiled.display(), "Loading profile-specific config");
                    figment = merge_known_format(figment, &profiled, ext);
                }

                info!(path = %base.display(), "Loading configuration file");
                return merge_known_format(figment, &base, ext);
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// Merges a file whose extension was already checked against the enabled formats.
fn merge_known_format(figment: Figment, path: &Path, ext: &str) -> Figment {
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => figment.merge(Toml::file(path)),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        _ => figment,
    }
}

/// Merges a user-named file, rejecting formats that are not compiled in.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<ConduitConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, plus environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ConduitConfig> {
    ConfigLoader::new().file(path).load()
}
