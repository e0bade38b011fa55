//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ConduitConfig, LogFormat, LogOutput, LoggingConfig};

/// Validates the entire configuration.
///
/// Service sections are only checked for well-formed names here; their
/// contents are checked against each service's schema when applied.
pub fn validate_config(config: &ConduitConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_service_names(config.services.keys())?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.file_path is not set",
        ));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "logging.format 'json' requires the json-log feature",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: '{module}'"
        )));
    }

    Ok(())
}

/// Validates service section names.
fn validate_service_names<'a>(names: impl Iterator<Item = &'a String>) -> ConfigResult<()> {
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::validation("Service name cannot be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Service name cannot contain whitespace: '{name}'"
            )));
        }
    }
    Ok(())
}
