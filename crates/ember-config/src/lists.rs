//! Trust list and autoload list files.
//!
//! Both are newline-delimited plugin directory names. Blank lines and lines
//! starting with `#` are skipped.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Read a name list. Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] when the file exists but cannot be read.
pub fn read_name_list(path: &Path) -> ConfigResult<Option<Vec<String>>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(parse_name_list(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "name list not found");
            Ok(None)
        },
        Err(e) => Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Split list text into names, preserving file order.
#[must_use]
pub fn parse_name_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
