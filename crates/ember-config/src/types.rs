//! Configuration struct definitions.
//!
//! Every section is `#[serde(default)]`, so a partial file (or no file at
//! all) yields a fully populated [`HostConfig`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Plugin root layout and well-known file names.
    pub plugins: PluginsSection,
    /// Host API version window.
    pub api: ApiSection,
    /// Script execution limits per trust level.
    pub limits: LimitsSection,
    /// Socket module limits.
    pub sockets: SocketsSection,
    /// Host session model.
    pub host: HostSection,
    /// Logging and tracing.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PluginsSection
// ---------------------------------------------------------------------------

/// Where plugins live and which files inside the root matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Plugin root directory. Each subdirectory is one plugin.
    pub root: PathBuf,
    /// Script executed as global scope when a plugin loads.
    pub entry_file: String,
    /// Optional per-plugin manifest file name.
    pub manifest_file: String,
    /// Trust list file, relative to `root`.
    pub trusted_list: String,
    /// Autoload list file, relative to `root`.
    pub autoload_list: String,
    /// Reserved subdirectory name that discovery never loads.
    pub disabled_dir: String,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("plugins.rhai"),
            entry_file: "Main.rhai".to_owned(),
            manifest_file: "plugin.toml".to_owned(),
            trusted_list: "trusted.txt".to_owned(),
            autoload_list: "autoload.txt".to_owned(),
            disabled_dir: "disabled".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiSection
// ---------------------------------------------------------------------------

/// Plugin API versions the host accepts: `min_version..=version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Current host API version.
    pub version: u32,
    /// Oldest API version still supported.
    pub min_version: u32,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            version: 1,
            min_version: 1,
        }
    }
}

impl ApiSection {
    /// Whether a plugin declaring `declared` may load.
    #[must_use]
    pub fn accepts(&self, declared: u32) -> bool {
        (self.min_version..=self.version).contains(&declared)
    }
}

// ---------------------------------------------------------------------------
// LimitsSection
// ---------------------------------------------------------------------------

/// Execution limits for trusted and sandboxed plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Limits applied to plugins on the trust list.
    pub trusted: ScriptLimits,
    /// Limits applied to every other plugin.
    pub sandboxed: ScriptLimits,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            trusted: ScriptLimits::trusted(),
            sandboxed: ScriptLimits::sandboxed(),
        }
    }
}

/// Bounds on a single script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Operations per call into the engine.
    pub max_operations: u64,
    /// Function call nesting depth.
    pub max_call_levels: usize,
    /// Expression nesting depth.
    pub max_expr_depth: usize,
    /// Longest string a script may build, in bytes.
    pub max_string_size: usize,
    /// Largest array a script may build.
    pub max_array_size: usize,
    /// Largest object map a script may build.
    pub max_map_size: usize,
}

impl ScriptLimits {
    /// Generous defaults for trusted plugins.
    #[must_use]
    pub const fn trusted() -> Self {
        Self {
            max_operations: 10_000_000,
            max_call_levels: 128,
            max_expr_depth: 128,
            max_string_size: 4 * 1024 * 1024,
            max_array_size: 1_000_000,
            max_map_size: 1_000_000,
        }
    }

    /// Tighter defaults for sandboxed plugins.
    #[must_use]
    pub const fn sandboxed() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 48,
            max_expr_depth: 64,
            max_string_size: 256 * 1024,
            max_array_size: 65_536,
            max_map_size: 65_536,
        }
    }
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self::sandboxed()
    }
}

// ---------------------------------------------------------------------------
// SocketsSection
// ---------------------------------------------------------------------------

/// Socket module limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketsSection {
    /// How long a connect may stay pending, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Open sockets allowed per plugin.
    pub max_per_plugin: usize,
}

impl Default for SocketsSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            max_per_plugin: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// HostSection
// ---------------------------------------------------------------------------

/// Host session model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// Number of participant slots.
    pub max_participants: usize,
    /// Tick period of the host loop, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            max_participants: 25,
            tick_interval_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["ember_plugins=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
