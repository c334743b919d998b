//! Plugin discovery under the plugin root.

use std::path::Path;

use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// List plugin directories under `root`, sorted by name.
///
/// Hidden entries, plain files and the reserved `disabled_dir` are skipped.
///
/// # Errors
///
/// Returns [`PluginError::Io`] if `root` cannot be listed.
pub fn discover_plugins(root: &Path, disabled_dir: &str) -> PluginResult<Vec<String>> {
    let entries = std::fs::read_dir(root).map_err(|e| PluginError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PluginError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let Ok(name) = entry.file_name().into_string() else {
            debug!(path = %entry.path().display(), "Skipping non-UTF-8 plugin directory");
            continue;
        };
        if name.starts_with('.') || name == disabled_dir {
            continue;
        }
        if entry.path().is_dir() {
            found.push(name);
        }
    }
    found.sort();
    Ok(found)
}

/// Check that `directory` names a direct child of the plugin root.
///
/// # Errors
///
/// Returns [`PluginError::InvalidDirectory`] for empty names, `.`/`..`,
/// hidden names and anything containing a path separator.
pub fn validate_directory_name(directory: &str) -> PluginResult<()> {
    let reason = if directory.is_empty() {
        Some("name is empty")
    } else if directory == "." || directory == ".." {
        Some("name refers to the plugin root or its parent")
    } else if directory.starts_with('.') {
        Some("hidden directories are not plugins")
    } else if directory.contains(['/', '\\']) || directory.contains('\0') {
        Some("name must not contain path separators")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PluginError::InvalidDirectory {
            directory: directory.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}
