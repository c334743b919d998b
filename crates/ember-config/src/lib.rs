#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the Ember plugin host.
//!
//! This crate provides a single [`HostConfig`] type covering the plugin root,
//! the host API version, per-trust-level script execution limits, socket
//! limits, the participant table size and logging.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ember_config::HostConfig;
//!
//! // Missing file falls back to defaults; env overrides are applied last.
//! let config = HostConfig::load(Some(std::path::Path::new("ember.toml"))).unwrap();
//! println!("plugin root: {}", config.plugins.root.display());
//! ```
//!
//! # Name lists
//!
//! The trust list and the autoload list are plain newline-delimited files of
//! plugin directory names. [`read_name_list`] reads them; a missing file is
//! reported as `Ok(None)` so callers can degrade to an empty list.
//!
//! # Design
//!
//! This crate has **no dependencies on other internal ember crates**.

/// Configuration error types.
pub mod error;
/// Configuration file loading and environment overrides.
pub mod loader;
/// Newline-delimited plugin name lists.
pub mod lists;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use lists::{parse_name_list, read_name_list};
pub use types::*;

impl HostConfig {
    /// Load configuration from `path` (defaults when absent), then apply
    /// `EMBER_*` environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is unreadable, malformed, or the
    /// resulting configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(path)
    }

    /// Absolute-or-relative path of the trust list file.
    #[must_use]
    pub fn trusted_list_path(&self) -> std::path::PathBuf {
        self.plugins.root.join(&self.plugins.trusted_list)
    }

    /// Absolute-or-relative path of the autoload list file.
    #[must_use]
    pub fn autoload_list_path(&self) -> std::path::PathBuf {
        self.plugins.root.join(&self.plugins.autoload_list)
    }
}
