//! Configuration validation.
//!
//! Checks value ranges and cross-field invariants of a deserialized
//! [`HostConfig`](crate::HostConfig).

use crate::error::{ConfigError, ConfigResult};
use crate::types::{HostConfig, ScriptLimits};

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &HostConfig) -> ConfigResult<()> {
    validate_plugins(config)?;
    validate_api(config)?;
    validate_limits("limits.trusted", &config.limits.trusted)?;
    validate_limits("limits.sandboxed", &config.limits.sandboxed)?;
    validate_host(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validation_error(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_plugins(config: &HostConfig) -> ConfigResult<()> {
    let p = &config.plugins;
    if p.entry_file.trim().is_empty() {
        return Err(validation_error(
            "plugins.entry_file",
            "entry file name must not be empty",
        ));
    }
    if p.disabled_dir.trim().is_empty() {
        return Err(validation_error(
            "plugins.disabled_dir",
            "disabled directory name must not be empty",
        ));
    }
    Ok(())
}

fn validate_api(config: &HostConfig) -> ConfigResult<()> {
    if config.api.min_version > config.api.version {
        return Err(validation_error(
            "api.min_version",
            format!(
                "min_version {} is newer than version {}",
                config.api.min_version, config.api.version
            ),
        ));
    }
    Ok(())
}

fn validate_limits(prefix: &str, limits: &ScriptLimits) -> ConfigResult<()> {
    let fields = [
        ("max_call_levels", limits.max_call_levels),
        ("max_expr_depth", limits.max_expr_depth),
        ("max_string_size", limits.max_string_size),
        ("max_array_size", limits.max_array_size),
        ("max_map_size", limits.max_map_size),
    ];
    if limits.max_operations == 0 {
        return Err(validation_error(
            &format!("{prefix}.max_operations"),
            "must be greater than 0",
        ));
    }
    for (name, value) in fields {
        if value == 0 {
            return Err(validation_error(
                &format!("{prefix}.{name}"),
                "must be greater than 0",
            ));
        }
    }
    Ok(())
}

fn validate_host(config: &HostConfig) -> ConfigResult<()> {
    if config.host.max_participants == 0 {
        return Err(validation_error(
            "host.max_participants",
            "must be greater than 0",
        ));
    }
    if config.host.tick_interval_ms == 0 {
        return Err(validation_error(
            "host.tick_interval_ms",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(config: &HostConfig) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(validation_error(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(validation_error(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
