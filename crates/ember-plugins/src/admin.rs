//! Administrative commands (`js_load`, `js_unload`, `js_reload`, `js_list`).
//!
//! Parsing is separate from execution so that frontends can reject bad input
//! before touching the manager.

use std::fmt::Write as _;

use thiserror::Error;

use crate::error::PluginError;
use crate::manager::PluginManager;

/// A parsed administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Load a plugin directory.
    Load(String),
    /// Unload a plugin directory.
    Unload(String),
    /// Unload then load a plugin directory.
    Reload(String),
    /// List loaded plugins.
    List,
}

/// Rejected command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminParseError {
    /// The first word is not an admin command.
    #[error("unknown command: {0}")]
    Unknown(String),
    /// Right command, wrong number of arguments.
    #[error("Usage: {0}")]
    Usage(&'static str),
    /// Blank line.
    #[error("empty command")]
    Empty,
}

impl AdminCommand {
    /// Parse one command line. Both `js_`-prefixed names and the short
    /// aliases are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AdminParseError`] for blank, unknown or malformed lines.
    pub fn parse(line: &str) -> Result<Self, AdminParseError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(AdminParseError::Empty);
        };
        let args: Vec<&str> = words.collect();
        let name = command.strip_prefix("js_").unwrap_or(command);

        let single = |usage: &'static str| match args.as_slice() {
            [dir] => Ok((*dir).to_owned()),
            _ => Err(AdminParseError::Usage(usage)),
        };
        match name {
            "load" => single("js_load [plugin_dir]").map(Self::Load),
            "unload" => single("js_unload [plugin_dir]").map(Self::Unload),
            "reload" => single("js_reload [plugin_dir]").map(Self::Reload),
            "list" if args.is_empty() => Ok(Self::List),
            "list" => Err(AdminParseError::Usage("js_list")),
            _ => Err(AdminParseError::Unknown(command.to_owned())),
        }
    }

    /// Whether `line` starts with an admin command word.
    #[must_use]
    pub fn is_admin_line(line: &str) -> bool {
        line.split_whitespace().next().is_some_and(|word| {
            matches!(
                word.strip_prefix("js_").unwrap_or(word),
                "load" | "unload" | "reload" | "list"
            )
        })
    }

    /// Run the command against `manager` and describe the outcome.
    pub fn execute(&self, manager: &mut PluginManager) -> String {
        match self {
            Self::Load(dir) => load(manager, dir),
            Self::Unload(dir) => unload(manager, dir),
            Self::Reload(dir) => {
                let unloaded = unload(manager, dir);
                let loaded = load(manager, dir);
                format!("{unloaded}\n{loaded}")
            },
            Self::List => list(manager),
        }
    }
}

fn load(manager: &mut PluginManager, dir: &str) -> String {
    if manager.find_by_directory(dir).is_some() {
        return format!("Plugin \"{dir}\" is already loaded!");
    }
    match manager.load_plugin(dir) {
        Ok(_) => format!("Plugin \"{dir}\" loaded successfully!"),
        Err(e) => format!("Plugin \"{dir}\" failed to load! ({e})"),
    }
}

fn unload(manager: &mut PluginManager, dir: &str) -> String {
    match manager.unload_plugin(dir) {
        Ok(()) => format!("Plugin \"{dir}\" unloaded successfully!"),
        Err(PluginError::NotLoaded(_)) => format!("Plugin \"{dir}\" is not loaded!"),
        Err(e) => format!("Plugin \"{dir}\" failed to unload! ({e})"),
    }
}

fn list(manager: &PluginManager) -> String {
    if manager.is_empty() {
        return "No plugins loaded.".to_owned();
    }
    let mut out = format!("Loaded plugins ({}):", manager.len());
    for plugin in manager.plugins() {
        let trust = if plugin.is_sandboxed() { "sandboxed" } else { "trusted" };
        let _ = write!(out, "\n  [{}] {} ({trust})", plugin.id(), plugin.directory());
    }
    out
}
