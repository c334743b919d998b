//! Optional plugin manifest (`plugin.toml`).
//!
//! A plugin directory may carry a small TOML manifest describing the plugin
//! and the API version it targets. It is read before modules attach, so a
//! plugin built for an unsupported API is rejected without running any of
//! its code.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// Maximum manifest file size (64 KiB).
const MAX_MANIFEST_SIZE: usize = 64 * 1024;

/// A plugin manifest loaded from `plugin.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginManifest {
    /// Human-readable display name.
    pub name: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Plugin version string.
    pub version: Option<String>,
    /// Host API version the plugin targets.
    pub api_version: Option<u32>,
    /// Entry script, relative to the plugin directory.
    pub entry: Option<String>,
}

/// Load the manifest at `dir/file_name`, or `Ok(None)` when absent.
///
/// # Errors
///
/// Returns [`PluginError::Manifest`] for malformed or oversized files and
/// [`PluginError::Io`] for read failures.
pub fn load_manifest(dir: &Path, file_name: &str) -> PluginResult<Option<PluginManifest>> {
    let path = dir.join(file_name);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no plugin manifest");
            return Ok(None);
        },
        Err(e) => return Err(PluginError::Io { path, source: e }),
    };

    if text.len() > MAX_MANIFEST_SIZE {
        return Err(PluginError::Manifest {
            path,
            message: format!("manifest exceeds {MAX_MANIFEST_SIZE} bytes"),
        });
    }

    let manifest: PluginManifest = toml::from_str(&text).map_err(|e| PluginError::Manifest {
        path: path.clone(),
        message: e.to_string(),
    })?;

    if let Some(entry) = &manifest.entry
        && (entry.is_empty() || Path::new(entry).is_absolute() || entry.contains(".."))
    {
        return Err(PluginError::Manifest {
            path,
            message: format!("entry {entry:?} must be a relative path inside the plugin"),
        });
    }

    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(dir.path(), "plugin.toml").unwrap().is_none());
    }

    #[test]
    fn test_parse_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("plugin.toml"),
            "name = \"Greeter\"\napi_version = 2\nentry = \"src/init.rhai\"\n",
        )
        .unwrap();
        let manifest = load_manifest(dir.path(), "plugin.toml").unwrap().unwrap();
        assert_eq!(manifest.name.as_deref(), Some("Greeter"));
        assert_eq!(manifest.api_version, Some(2));
        assert_eq!(manifest.entry.as_deref(), Some("src/init.rhai"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plugin.toml"), "apiversion = 2\n").unwrap();
        let err = load_manifest(dir.path(), "plugin.toml").unwrap_err();
        assert!(matches!(err, PluginError::Manifest { .. }));
    }

    #[test]
    fn test_escaping_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plugin.toml"), "entry = \"../other/Main.rhai\"\n")
            .unwrap();
        assert!(load_manifest(dir.path(), "plugin.toml").is_err());
    }
}
