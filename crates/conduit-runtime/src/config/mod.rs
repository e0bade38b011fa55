//! Host configuration: `[logging]` plus one `[services.<name>]` section per service.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ConduitConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
