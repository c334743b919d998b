//! The plugin entity: one execution context plus everything tied to it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rhai::Dynamic;
use tracing::{debug, error, info, warn};

use ember_config::ScriptLimits;

use crate::binding::Binding;
use crate::context::{self, ContextId, PendingOp};
use crate::destroy::{DestroyCallbacks, PluginDestroyedHandler};
use crate::engine::ScriptContext;
use crate::error::{PluginError, PluginResult, ScriptException};
use crate::hooks::{DispatchReport, HookCallback, HookKind, HookTable};
use crate::manifest::PluginManifest;
use crate::module::CapabilityModule;

static NEXT_PLUGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique plugin identifier.
///
/// A reloaded plugin gets a fresh id even though its directory is the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(u64);

impl PluginId {
    /// Allocate the next identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_PLUGIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value, as exposed to scripts.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Modules attaching and entry script running.
    Constructing,
    /// Registered with the manager and receiving events.
    Loaded,
    /// Torn down; its context has been released.
    Destroyed,
}

/// Identity snapshot handed to natives and destroy callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Process-unique id.
    pub id: PluginId,
    /// Directory name under the plugin root; the lookup key.
    pub directory: String,
    /// Full path of the plugin directory.
    pub path: PathBuf,
    /// Whether the plugin runs without trust.
    pub sandboxed: bool,
}

/// A loaded (or loading) script plugin.
pub struct Plugin {
    info: PluginInfo,
    state: PluginState,
    api_version: Option<u32>,
    manifest: Option<PluginManifest>,
    context_id: ContextId,
    context: Option<ScriptContext>,
    modules: Vec<CapabilityModule>,
    hooks: HookTable,
    destroy_callbacks: DestroyCallbacks,
}

impl Plugin {
    /// Create a plugin and its execution context. No modules are attached
    /// and no script has run yet.
    #[must_use]
    pub fn new(
        directory: impl Into<String>,
        path: impl Into<PathBuf>,
        sandboxed: bool,
        limits: &ScriptLimits,
    ) -> Self {
        let info = PluginInfo {
            id: PluginId::next(),
            directory: directory.into(),
            path: path.into(),
            sandboxed,
        };
        let context_id = ContextId::next();
        let context = ScriptContext::new(context_id, &info.directory, &info.path, limits, sandboxed);
        context::register(context_id, info.clone());
        debug!(plugin = %info.directory, plugin_id = %info.id, sandboxed, "Created plugin context");

        Self {
            info,
            state: PluginState::Constructing,
            api_version: None,
            manifest: None,
            context_id,
            context: Some(context),
            modules: Vec::new(),
            hooks: HookTable::new(),
            destroy_callbacks: DestroyCallbacks::new(),
        }
    }

    /// Process-unique id.
    #[must_use]
    pub fn id(&self) -> PluginId {
        self.info.id
    }

    /// Directory name under the plugin root.
    #[must_use]
    pub fn directory(&self) -> &str {
        &self.info.directory
    }

    /// Full path of the plugin directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.info.path
    }

    /// Whether the plugin is sandboxed (not on the trust list).
    #[must_use]
    pub fn is_sandboxed(&self) -> bool {
        self.info.sandboxed
    }

    /// Identity snapshot.
    #[must_use]
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Declared API version, `None` while unspecified.
    #[must_use]
    pub fn api_version(&self) -> Option<u32> {
        self.api_version
    }

    /// Record the API version the plugin targets.
    pub fn set_api_version(&mut self, version: u32) {
        self.api_version = Some(version);
        context::set_api_version(self.context_id, version);
    }

    /// Manifest read at load time, if the plugin has one.
    #[must_use]
    pub fn manifest(&self) -> Option<&PluginManifest> {
        self.manifest.as_ref()
    }

    pub(crate) fn set_manifest(&mut self, manifest: PluginManifest) {
        if let Some(version) = manifest.api_version {
            self.set_api_version(version);
        }
        self.manifest = Some(manifest);
    }

    /// Identity of the plugin's execution context.
    #[must_use]
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Namespaces of the attached capability modules.
    #[must_use]
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(CapabilityModule::name).collect()
    }

    pub(crate) fn mark_loaded(&mut self) {
        if self.state == PluginState::Constructing {
            self.state = PluginState::Loaded;
        }
    }

    // -----------------------------------------------------------------
    // Module attachment
    // -----------------------------------------------------------------

    /// Attach every module in order. Each module fills a fresh binding that
    /// is then installed into this plugin's context.
    ///
    /// # Errors
    ///
    /// Stops at the first module that fails. Modules attached before the
    /// failure stay recorded so that destroying the plugin notifies them.
    pub fn attach_modules(&mut self, modules: &[CapabilityModule]) -> PluginResult<()> {
        for module in modules {
            let mut binding = Binding::new(module.name(), module.class_name());
            module.attach(self, &mut binding)?;
            self.modules.push(module.clone());
            self.context_mut()?.install(binding)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Destroy callbacks
    // -----------------------------------------------------------------

    /// Run `f` when this plugin is destroyed.
    pub fn register_destroy_fn(&mut self, f: impl FnOnce(&PluginInfo) + 'static) {
        self.destroy_callbacks.add_fn(f);
    }

    /// Notify `listener` when this plugin is destroyed.
    pub fn register_destroy_listener(&mut self, listener: Box<dyn PluginDestroyedHandler>) {
        self.destroy_callbacks.add_listener(listener);
    }

    /// Number of pending destroy callbacks.
    #[must_use]
    pub fn destroy_callback_count(&self) -> usize {
        self.destroy_callbacks.len()
    }

    // -----------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------

    /// Pre-dispatch callbacks for `event`.
    pub fn hooks(&mut self, event: &str) -> &[HookCallback] {
        self.hooks.get_or_create(HookKind::Pre, event)
    }

    /// Event callbacks for `event`.
    pub fn event_hooks(&mut self, event: &str) -> &[HookCallback] {
        self.hooks.get_or_create(HookKind::Event, event)
    }

    /// Post-event callbacks for `event`.
    pub fn event_post_hooks(&mut self, event: &str) -> &[HookCallback] {
        self.hooks.get_or_create(HookKind::Post, event)
    }

    /// Number of callbacks for `event` in one mapping.
    #[must_use]
    pub fn hook_count(&self, kind: HookKind, event: &str) -> usize {
        self.hooks.count(kind, event)
    }

    /// Invoke every callback registered for `event` in order.
    ///
    /// A failing callback is reported and the rest still run. Hooks
    /// registered by the callbacks themselves take effect afterwards.
    pub fn call_hooks(&mut self, kind: HookKind, event: &str, args: &[Dynamic]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.state == PluginState::Destroyed {
            return report;
        }

        let callbacks = self.hooks.get_or_create(kind, event).clone();
        for callback in &callbacks {
            report.invoked = report.invoked.saturating_add(1);
            if let Err(ex) = self.call(callback, args) {
                report.failed = report.failed.saturating_add(1);
                warn!(plugin = %self.info.directory, event, kind = %kind, "Hook callback failed");
                self.report(&ex);
            }
        }
        self.apply_pending();
        report
    }

    /// Call a single callback in this plugin's context.
    ///
    /// # Errors
    ///
    /// Returns the script failure; the caller decides how to report it.
    pub fn call(&self, callback: &HookCallback, args: &[Dynamic]) -> Result<Dynamic, ScriptException> {
        match &self.context {
            Some(ctx) => ctx.call(callback.func(), args),
            None => Err(ScriptException::new(
                &self.info.directory,
                callback.name(),
                "plugin context has been released",
            )),
        }
    }

    // -----------------------------------------------------------------
    // Script execution
    // -----------------------------------------------------------------

    /// Compile and run script text in this plugin's context.
    ///
    /// Failures are logged through the exception report path and returned.
    ///
    /// # Errors
    ///
    /// Returns the [`ScriptException`] describing the failure.
    pub fn run_string(&mut self, name: &str, source: &str, as_global: bool) -> Result<(), ScriptException> {
        let result = match self.context.as_mut() {
            Some(ctx) => ctx.run(name, source, as_global),
            None => Err(ScriptException::new(
                &self.info.directory,
                name,
                "plugin context has been released",
            )),
        };
        self.apply_pending();
        if let Err(ex) = &result {
            self.report(ex);
        }
        result
    }

    /// Read and run a script file. The file name is used as the source name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the file cannot be read and
    /// [`PluginError::Script`] if it fails.
    pub fn load_file(&mut self, path: &Path, as_global: bool) -> PluginResult<()> {
        let source = std::fs::read_to_string(path).map_err(|e| PluginError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .strip_prefix(&self.info.path)
            .unwrap_or(path)
            .display()
            .to_string();
        self.run_string(&name, &source, as_global)?;
        Ok(())
    }

    /// Value of a global variable defined by the entry script.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Dynamic> {
        self.context.as_ref().and_then(|ctx| ctx.global(name))
    }

    fn context_mut(&mut self) -> PluginResult<&mut ScriptContext> {
        self.context.as_mut().ok_or_else(|| PluginError::NotLoaded(self.info.directory.clone()))
    }

    fn apply_pending(&mut self) {
        for op in context::take_pending(self.context_id) {
            match op {
                PendingOp::RegisterHook { kind, event, callback } => {
                    debug!(plugin = %self.info.directory, event = %event, kind = %kind, "Registered hook");
                    self.hooks.push(kind, &event, callback);
                },
                PendingOp::DeclareApi(version) => self.api_version = Some(version),
            }
        }
    }

    fn report(&self, ex: &ScriptException) {
        error!(
            plugin = %self.info.directory,
            plugin_id = %self.info.id,
            source = %ex.source,
            line = ?ex.line,
            "{ex}"
        );
    }

    // -----------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------

    /// Tear the plugin down: destroy functions, then destroy listeners, then
    /// each attached module's notification, then release the context.
    ///
    /// Safe to call more than once; only the first call does anything.
    pub fn destroy(&mut self) {
        if self.state == PluginState::Destroyed {
            return;
        }
        self.state = PluginState::Destroyed;

        self.destroy_callbacks.run(&self.info);
        for module in std::mem::take(&mut self.modules) {
            module.on_plugin_destroyed(&self.info);
        }
        self.hooks.clear();

        drop(context::take_pending(self.context_id));
        context::unregister(self.context_id);
        self.context = None;
        info!(plugin = %self.info.directory, plugin_id = %self.info.id, "Plugin destroyed");
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.info.id)
            .field("directory", &self.info.directory)
            .field("sandboxed", &self.info.sandboxed)
            .field("state", &self.state)
            .field("api_version", &self.api_version)
            .field("hooks", &self.hooks.total())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::modules::ConsoleBuffer;

    fn plugin(dir: &tempfile::TempDir) -> Plugin {
        Plugin::new("demo", dir.path(), true, &ScriptLimits::sandboxed())
    }

    fn with_modules(dir: &tempfile::TempDir) -> (Plugin, ConsoleBuffer) {
        let queue = crate::requests::RequestQueue::default();
        let (console, buffer) = CapabilityModule::console_capture();
        let mut p = plugin(dir);
        p.attach_modules(&[CapabilityModule::plugin(queue), console])
            .unwrap();
        (p, buffer)
    }

    #[test]
    fn test_new_plugin_is_constructing() {
        let dir = tempfile::tempdir().unwrap();
        let p = plugin(&dir);
        assert_eq!(p.state(), PluginState::Constructing);
        assert_eq!(p.api_version(), None);
        assert!(p.is_sandboxed());
        assert_eq!(context::owner(p.context_id()).unwrap().id, p.id());
    }

    #[test]
    fn test_hook_accessors_create_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plugin(&dir);
        assert!(p.hooks("session_start").is_empty());
        assert!(p.event_hooks("round_end").is_empty());
        assert!(p.event_post_hooks("round_end").is_empty());
    }

    #[test]
    fn test_script_registers_hooks_into_separate_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _) = with_modules(&dir);
        p.run_string(
            "Main.rhai",
            r#"
                plugin::hook("tick", || {});
                plugin::hook_event("round_end", |winner| {});
                plugin::hook_event("round_end", |winner| {});
                plugin::hook_event_post("round_end", |winner| {});
            "#,
            true,
        )
        .unwrap();
        assert_eq!(p.hooks("tick").len(), 1);
        assert_eq!(p.event_hooks("round_end").len(), 2);
        assert_eq!(p.event_post_hooks("round_end").len(), 1);
    }

    #[test]
    fn test_call_hooks_in_registration_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, buffer) = with_modules(&dir);
        p.run_string(
            "Main.rhai",
            r#"
                plugin::hook_event("e", |x| console::log("first " + x));
                plugin::hook_event("e", |x| { throw "broken"; });
                plugin::hook_event("e", |x| console::log("third " + x));
            "#,
            true,
        )
        .unwrap();

        let report = p.call_hooks(HookKind::Event, "e", &[Dynamic::from("go")]);
        assert_eq!(report, DispatchReport { invoked: 3, failed: 1 });
        assert_eq!(buffer.lines(), vec!["first go", "third go"]);
    }

    #[test]
    fn test_hook_registered_during_dispatch_applies_after() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, buffer) = with_modules(&dir);
        p.run_string(
            "Main.rhai",
            r#"
                plugin::hook_event("e", || {
                    console::log("outer");
                    plugin::hook_event("e", || console::log("late"));
                });
            "#,
            true,
        )
        .unwrap();

        assert_eq!(p.call_hooks(HookKind::Event, "e", &[]).invoked, 1);
        assert_eq!(buffer.lines(), vec!["outer"]);
        assert_eq!(p.call_hooks(HookKind::Event, "e", &[]).invoked, 2);
    }

    #[test]
    fn test_api_version_declared_by_script() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _) = with_modules(&dir);
        p.run_string("Main.rhai", "plugin::api_version(3);", true).unwrap();
        assert_eq!(p.api_version(), Some(3));
    }

    #[test]
    fn test_run_string_failure_is_reported_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plugin(&dir);
        let ex = p.run_string("Main.rhai", "throw \"nope\";", true).unwrap_err();
        assert_eq!(ex.message, "nope");
        assert_eq!(ex.plugin, "demo");
    }

    #[test]
    fn test_load_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plugin(&dir);
        let err = p.load_file(&dir.path().join("Main.rhai"), true).unwrap_err();
        assert!(matches!(err, PluginError::Io { .. }));
    }

    #[test]
    fn test_destroy_runs_callbacks_once_and_releases_context() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _) = with_modules(&dir);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        p.register_destroy_fn(move |info| l.borrow_mut().push(info.directory.clone()));
        let ctx = p.context_id();

        p.destroy();
        p.destroy();
        drop(p);

        assert_eq!(*log.borrow(), vec!["demo"]);
        assert!(context::owner(ctx).is_none());
    }

    #[test]
    fn test_destroyed_plugin_ignores_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let (mut p, _) = with_modules(&dir);
        p.run_string("Main.rhai", "plugin::hook(\"tick\", || {});", true)
            .unwrap();
        p.destroy();
        assert_eq!(p.state(), PluginState::Destroyed);
        assert_eq!(p.call_hooks(HookKind::Pre, "tick", &[]).invoked, 0);
        assert!(p.global("anything").is_none());
    }
}
