//! Config file loading.
//!
//! 1. Read the TOML file if it exists (defaults otherwise)
//! 2. Apply `EMBER_*` environment overrides
//! 3. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::HostConfig;
use crate::validate;

/// Maximum config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Environment variables consulted by [`apply_env_overrides`].
const ENV_VARS: &[&str] = &["EMBER_PLUGIN_ROOT", "EMBER_LOG_LEVEL", "EMBER_API_VERSION"];

/// Load, override and validate the host configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is malformed or validation fails.
pub fn load(path: Option<&Path>) -> ConfigResult<HostConfig> {
    let mut config = match path {
        Some(p) => match try_load_file(p)? {
            Some(c) => {
                info!(path = %p.display(), "loaded host config");
                c
            },
            None => HostConfig::default(),
        },
        None => HostConfig::default(),
    };

    apply_env_overrides(&mut config, &collect_env_vars());
    validate::validate(&config)?;
    Ok(config)
}

/// Parse a configuration from a TOML string, without env overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the text is malformed or validation fails.
pub fn from_toml_str(text: &str) -> ConfigResult<HostConfig> {
    let config: HostConfig = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn try_load_file(path: &Path) -> ConfigResult<Option<HostConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let config: HostConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(config))
}

fn collect_env_vars() -> HashMap<String, String> {
    ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| ((*name).to_owned(), v)))
        .collect()
}

/// Apply `EMBER_*` overrides from `vars` on top of `config`.
///
/// Unparseable numeric values are logged and ignored.
pub fn apply_env_overrides(config: &mut HostConfig, vars: &HashMap<String, String>) {
    if let Some(root) = vars.get("EMBER_PLUGIN_ROOT").filter(|v| !v.is_empty()) {
        config.plugins.root = PathBuf::from(root);
    }
    if let Some(level) = vars.get("EMBER_LOG_LEVEL").filter(|v| !v.is_empty()) {
        config.logging.level = level.to_ascii_lowercase();
    }
    if let Some(raw) = vars.get("EMBER_API_VERSION") {
        match raw.trim().parse::<u32>() {
            Ok(v) => config.api.version = v,
            Err(_) => warn!(value = %raw, "ignoring non-numeric EMBER_API_VERSION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = try_load_file(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = from_toml_str("[api]\nversion = 3\n").unwrap();
        assert_eq!(config.api.version, 3);
        assert_eq!(config.api.min_version, 1);
        assert_eq!(config.plugins.entry_file, "Main.rhai");
        assert_eq!(config.host.max_participants, 25);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        std::fs::write(&path, "[plugins\nroot = ").unwrap();
        let err = try_load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        let padding = "#".repeat(usize::try_from(MAX_CONFIG_FILE_SIZE).unwrap() + 1);
        std::fs::write(&path, padding).unwrap();
        let err = try_load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HostConfig::default();
        let mut vars = HashMap::new();
        vars.insert("EMBER_PLUGIN_ROOT".to_owned(), "/srv/plugins".to_owned());
        vars.insert("EMBER_LOG_LEVEL".to_owned(), "DEBUG".to_owned());
        vars.insert("EMBER_API_VERSION".to_owned(), "2".to_owned());
        apply_env_overrides(&mut config, &vars);
        assert_eq!(config.plugins.root, PathBuf::from("/srv/plugins"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.api.version, 2);
    }

    #[test]
    fn test_bad_api_version_env_ignored() {
        let mut config = HostConfig::default();
        let mut vars = HashMap::new();
        vars.insert("EMBER_API_VERSION".to_owned(), "two".to_owned());
        apply_env_overrides(&mut config, &vars);
        assert_eq!(config.api.version, 1);
    }
}
