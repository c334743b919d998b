//! Plugin error types.

use std::fmt;
use std::path::PathBuf;

/// Errors from plugin operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No plugin with this directory is loaded.
    #[error("plugin not loaded: {0}")]
    NotLoaded(String),

    /// The directory name is not a plain subdirectory name.
    #[error("invalid plugin directory {directory:?}: {reason}")]
    InvalidDirectory {
        /// The rejected directory name.
        directory: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The directory does not exist under the plugin root.
    #[error("plugin directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The plugin targets an API version outside the host's window.
    #[error("plugin {directory} requires API version {declared}, host supports {min}..={max}")]
    ApiVersionMismatch {
        /// Plugin directory.
        directory: String,
        /// Version the plugin declared.
        declared: u32,
        /// Oldest supported version.
        min: u32,
        /// Current host version.
        max: u32,
    },

    /// A capability module could not be attached.
    #[error("failed to attach module {module}: {message}")]
    ModuleAttach {
        /// Module namespace.
        module: String,
        /// Failure reason.
        message: String,
    },

    /// The entry script failed to parse or threw.
    #[error("script error: {0}")]
    Script(#[from] ScriptException),

    /// The plugin manifest is unreadable or malformed.
    #[error("manifest error in {}: {message}", path.display())]
    Manifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// I/O error while reading plugin files.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Uniform report of a failure raised inside a script context.
///
/// Built from parse errors and runtime errors alike, so every failure at the
/// script/native boundary is logged and surfaced the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    /// Directory of the plugin the script belongs to.
    pub plugin: String,
    /// Script source name (file name or `run_string` name).
    pub source: String,
    /// 1-based line, when known.
    pub line: Option<usize>,
    /// 1-based column, when known.
    pub column: Option<usize>,
    /// Error message without position information.
    pub message: String,
    /// Script call frames, outermost first.
    pub stack: Vec<String>,
}

impl ScriptException {
    /// Build a report for an error that has no script position.
    #[must_use]
    pub fn new(
        plugin: impl Into<String>,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            source: source.into(),
            line: None,
            column: None,
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Build a report from a Rhai parse error.
    #[must_use]
    pub fn from_parse(plugin: &str, source: &str, err: &rhai::ParseError) -> Self {
        Self {
            plugin: plugin.to_owned(),
            source: source.to_owned(),
            line: err.1.line(),
            column: err.1.position(),
            message: err.0.to_string(),
            stack: Vec::new(),
        }
    }

    /// Build a report from a Rhai evaluation error, unwinding nested
    /// function-call errors into [`stack`](Self::stack).
    #[must_use]
    pub fn from_eval(plugin: &str, source: &str, err: rhai::EvalAltResult) -> Self {
        let mut stack = Vec::new();
        let mut source = source.to_owned();
        let mut current = err;

        loop {
            match current {
                rhai::EvalAltResult::ErrorInFunctionCall(name, fn_source, inner, pos) => {
                    stack.push(format_frame(&name, &source, pos));
                    if !fn_source.is_empty() {
                        source = fn_source;
                    }
                    current = *inner;
                },
                rhai::EvalAltResult::ErrorInModule(path, inner, pos) => {
                    stack.push(format_frame(&format!("import {path}"), &source, pos));
                    source = path;
                    current = *inner;
                },
                _ => break,
            }
        }

        let position = current.take_position();
        let message = match current {
            rhai::EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
            other => other.to_string(),
        };

        Self {
            plugin: plugin.to_owned(),
            source,
            line: position.line(),
            column: position.position(),
            message,
            stack,
        }
    }
}

fn format_frame(name: &str, source: &str, pos: rhai::Position) -> String {
    match (pos.line(), pos.position()) {
        (Some(line), Some(column)) => format!("{name} ({source}:{line}:{column})"),
        (Some(line), None) => format!("{name} ({source}:{line})"),
        _ => format!("{name} ({source})"),
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, ": {}", self.message)?;
        for frame in &self.stack {
            write!(f, "\n    at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptException {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position_and_stack() {
        let ex = ScriptException {
            plugin: "demo".into(),
            source: "Main.rhai".into(),
            line: Some(3),
            column: Some(7),
            message: "boom".into(),
            stack: vec!["on_tick (Main.rhai:10:5)".into()],
        };
        assert_eq!(
            ex.to_string(),
            "Main.rhai:3:7: boom\n    at on_tick (Main.rhai:10:5)"
        );
    }

    #[test]
    fn test_display_without_position() {
        let ex = ScriptException::new("demo", "Main.rhai", "file missing");
        assert_eq!(ex.to_string(), "Main.rhai: file missing");
    }

    #[test]
    fn test_from_parse_error() {
        let engine = rhai::Engine::new();
        let err = engine.compile("let x = ;").unwrap_err();
        let ex = ScriptException::from_parse("demo", "Main.rhai", &err);
        assert_eq!(ex.line, Some(1));
        assert!(ex.column.is_some());
        assert!(!ex.message.is_empty());
    }

    #[test]
    fn test_from_eval_unwinds_function_frames() {
        let engine = rhai::Engine::new();
        let err = engine
            .run("fn inner() { throw \"bad thing\"; }\nfn outer() { inner() }\nouter();")
            .unwrap_err();
        let ex = ScriptException::from_eval("demo", "Main.rhai", *err);
        assert_eq!(ex.message, "bad thing");
        assert_eq!(ex.stack.len(), 2);
        assert!(ex.stack[0].starts_with("outer"));
        assert!(ex.stack[1].starts_with("inner"));
    }
}
