//! Plugin manager.
//!
//! Owns the loaded plugins in load order, decides trust, runs the load
//! protocol with rollback, fans host events out to every plugin's hooks and
//! applies deferred admin requests once a dispatch has finished.

use std::fmt;

use rhai::Dynamic;
use tracing::{debug, info, warn};

use ember_config::HostConfig;

use crate::discovery::{discover_plugins, validate_directory_name};
use crate::error::{PluginError, PluginResult};
use crate::events;
use crate::hooks::{DispatchReport, HookKind};
use crate::host::{HostSession, Participant, SharedHost};
use crate::manifest::load_manifest;
use crate::module::{CapabilityModule, ModuleRegistry};
use crate::plugin::Plugin;
use crate::requests::{AdminRequest, RequestKind, RequestQueue};
use crate::trust::TrustList;

/// Outcome of a batch load (autoload list or discovery).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Directories that loaded (or were already loaded).
    pub loaded: Vec<String>,
    /// Directories that failed.
    pub failed: Vec<String>,
}

/// Registry of loaded plugins and orchestrator of their lifecycle.
pub struct PluginManager {
    config: HostConfig,
    trust: TrustList,
    modules: ModuleRegistry,
    host: SharedHost,
    requests: RequestQueue,
    plugins: Vec<Plugin>,
}

impl PluginManager {
    /// Create a manager with no modules registered and an empty trust list.
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        let host = HostSession::shared(config.host.max_participants);
        Self {
            config,
            trust: TrustList::empty(),
            modules: ModuleRegistry::new(),
            host,
            requests: RequestQueue::default(),
            plugins: Vec::new(),
        }
    }

    /// Create a manager with the full module set registered.
    #[must_use]
    pub fn with_default_modules(config: HostConfig) -> Self {
        let mut manager = Self::new(config);
        manager.register_default_modules();
        manager
    }

    /// Register `plugin`, `console`, `clients`, `keyvalue` and `socket`.
    pub fn register_default_modules(&mut self) {
        self.register_module(CapabilityModule::plugin(self.requests.clone()));
        self.register_module(CapabilityModule::console());
        self.register_module(CapabilityModule::clients(self.host.clone()));
        self.register_module(CapabilityModule::keyvalue());
        self.register_module(CapabilityModule::socket(self.config.sockets));
    }

    /// Register a capability module for plugins loaded from now on.
    pub fn register_module(&mut self, module: CapabilityModule) {
        self.modules.register(module);
    }

    /// Registered capability modules.
    #[must_use]
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Host configuration.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Shared host session.
    #[must_use]
    pub fn host(&self) -> SharedHost {
        self.host.clone()
    }

    /// Queue of deferred admin requests.
    #[must_use]
    pub fn requests(&self) -> RequestQueue {
        self.requests.clone()
    }

    /// Current trust list.
    #[must_use]
    pub fn trust_list(&self) -> &TrustList {
        &self.trust
    }

    /// Replace the trust list. Already-loaded plugins keep their flag.
    pub fn set_trust_list(&mut self, trust: TrustList) {
        self.trust = trust;
    }

    /// Read the trust list file named in the config. Returns the number of
    /// trusted names.
    pub fn reload_trust_list(&mut self) -> usize {
        self.trust = TrustList::load(&self.config.trusted_list_path());
        self.trust.len()
    }

    // -----------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------

    /// Load the plugin in `directory` under the plugin root.
    ///
    /// Loading an already-loaded directory returns the existing plugin. A
    /// plugin that fails anywhere during construction is destroyed before
    /// this returns and is never registered. When a session is already
    /// running, the new plugin alone receives the session-start and
    /// participant events it missed.
    ///
    /// # Errors
    ///
    /// Returns the [`PluginError`] that aborted the load.
    pub fn load_plugin(&mut self, directory: &str) -> PluginResult<&Plugin> {
        if let Some(index) = self.position(directory) {
            debug!(plugin = directory, "Plugin already loaded");
            return Ok(&self.plugins[index]);
        }

        let path = self.plugin_path(directory)?;
        let sandboxed = !self.trust.contains(directory);
        let limits = if sandboxed {
            &self.config.limits.sandboxed
        } else {
            &self.config.limits.trusted
        };
        let mut plugin = Plugin::new(directory, path, sandboxed, limits);

        if let Err(e) = self.construct(&mut plugin) {
            warn!(plugin = directory, error = %e, "Plugin failed to load");
            plugin.destroy();
            return Err(e);
        }
        plugin.mark_loaded();

        let session_active = self.host.borrow().is_active();
        if session_active {
            self.catch_up(&mut plugin);
        }

        info!(
            plugin = directory,
            plugin_id = %plugin.id(),
            sandboxed,
            api_version = ?plugin.api_version(),
            "Loaded plugin"
        );
        let index = self.plugins.len();
        self.plugins.push(plugin);
        Ok(&self.plugins[index])
    }

    /// Remove and destroy the plugin in `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotLoaded`] if no such plugin is loaded.
    pub fn unload_plugin(&mut self, directory: &str) -> PluginResult<()> {
        let index = self
            .position(directory)
            .ok_or_else(|| PluginError::NotLoaded(directory.to_owned()))?;
        let mut plugin = self.plugins.remove(index);
        plugin.destroy();
        info!(plugin = directory, "Unloaded plugin");
        Ok(())
    }

    /// Unload (if loaded) then load `directory`.
    ///
    /// # Errors
    ///
    /// Returns the load error, if any.
    pub fn reload_plugin(&mut self, directory: &str) -> PluginResult<&Plugin> {
        match self.unload_plugin(directory) {
            Ok(()) | Err(PluginError::NotLoaded(_)) => {},
            Err(e) => return Err(e),
        }
        self.load_plugin(directory)
    }

    /// Look up a loaded plugin by directory.
    #[must_use]
    pub fn find_by_directory(&self, directory: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.directory() == directory)
    }

    /// Mutable lookup by directory.
    #[must_use]
    pub fn find_by_directory_mut(&mut self, directory: &str) -> Option<&mut Plugin> {
        self.plugins.iter_mut().find(|p| p.directory() == directory)
    }

    /// Loaded plugins in load order.
    #[must_use]
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Directories of loaded plugins in load order.
    #[must_use]
    pub fn directories(&self) -> Vec<&str> {
        self.plugins.iter().map(Plugin::directory).collect()
    }

    /// Number of loaded plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Destroy every plugin, most recently loaded first.
    pub fn unload_all(&mut self) {
        while let Some(mut plugin) = self.plugins.pop() {
            plugin.destroy();
        }
        self.requests.borrow_mut().clear();
    }

    /// Load each directory named in the autoload list, continuing past
    /// failures. A missing list loads nothing.
    pub fn load_autoload_list(&mut self) -> LoadSummary {
        let path = self.config.autoload_list_path();
        let names = match ember_config::read_name_list(&path) {
            Ok(Some(names)) => names,
            Ok(None) => {
                info!(path = %path.display(), "No autoload list");
                return LoadSummary::default();
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Autoload list unreadable");
                return LoadSummary::default();
            },
        };
        self.load_each(names)
    }

    /// Load every plugin directory found under the root.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the root cannot be listed.
    pub fn load_all_discovered(&mut self) -> PluginResult<LoadSummary> {
        let names = discover_plugins(&self.config.plugins.root, &self.config.plugins.disabled_dir)?;
        Ok(self.load_each(names))
    }

    fn load_each(&mut self, names: Vec<String>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for name in names {
            match self.load_plugin(&name) {
                Ok(_) => summary.loaded.push(name),
                Err(_) => summary.failed.push(name),
            }
        }
        info!(
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "Batch load finished"
        );
        summary
    }

    fn position(&self, directory: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.directory() == directory)
    }

    fn plugin_path(&self, directory: &str) -> PluginResult<std::path::PathBuf> {
        validate_directory_name(directory)?;
        let path = self.config.plugins.root.join(directory);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(PluginError::DirectoryNotFound(path))
        }
    }

    /// Manifest, API pre-check, module attachment, entry script, API check.
    fn construct(&self, plugin: &mut Plugin) -> PluginResult<()> {
        let manifest = load_manifest(plugin.path(), &self.config.plugins.manifest_file)?;
        let entry = manifest
            .as_ref()
            .and_then(|m| m.entry.clone())
            .unwrap_or_else(|| self.config.plugins.entry_file.clone());
        if let Some(manifest) = manifest {
            plugin.set_manifest(manifest);
        }
        self.check_api(plugin)?;

        plugin.attach_modules(self.modules.as_slice())?;

        let entry_path = plugin.path().join(entry);
        plugin.load_file(&entry_path, true)?;
        self.check_api(plugin)
    }

    fn check_api(&self, plugin: &Plugin) -> PluginResult<()> {
        match plugin.api_version() {
            Some(declared) if !self.config.api.accepts(declared) => {
                Err(PluginError::ApiVersionMismatch {
                    directory: plugin.directory().to_owned(),
                    declared,
                    min: self.config.api.min_version,
                    max: self.config.api.version,
                })
            },
            _ => Ok(()),
        }
    }

    /// Replay the running session to a freshly loaded plugin.
    fn catch_up(&self, plugin: &mut Plugin) {
        let participants: Vec<Participant> = self.host.borrow().participants();
        debug!(
            plugin = plugin.directory(),
            participants = participants.len(),
            "Replaying session to late-loaded plugin"
        );
        plugin.call_hooks(HookKind::Pre, events::SESSION_START, &[]);
        for participant in participants {
            let arg = [participant.to_dynamic()];
            plugin.call_hooks(HookKind::Pre, events::PARTICIPANT_CONNECTED, &arg);
            if participant.in_session {
                plugin.call_hooks(HookKind::Pre, events::PARTICIPANT_IN_SESSION, &arg);
            }
        }
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    /// Invoke every loaded plugin's callbacks for `event` in `kind`'s
    /// mapping: plugins in load order, callbacks in registration order.
    ///
    /// A failing callback is reported and skipped. Admin requests queued by
    /// callbacks are applied after every plugin has been visited.
    pub fn dispatch(&mut self, kind: HookKind, event: &str, args: &[Dynamic]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for plugin in &mut self.plugins {
            report.absorb(plugin.call_hooks(kind, event, args));
        }
        if report.failed > 0 {
            debug!(event, kind = %kind, failed = report.failed, "Dispatch finished with failures");
        }
        self.process_requests();
        report
    }

    /// Dispatch through the pre-dispatch mapping.
    pub fn dispatch_hook(&mut self, event: &str, args: &[Dynamic]) -> DispatchReport {
        self.dispatch(HookKind::Pre, event, args)
    }

    /// Dispatch through the event mapping.
    pub fn dispatch_event(&mut self, event: &str, args: &[Dynamic]) -> DispatchReport {
        self.dispatch(HookKind::Event, event, args)
    }

    /// Dispatch through the post-event mapping.
    pub fn dispatch_event_post(&mut self, event: &str, args: &[Dynamic]) -> DispatchReport {
        self.dispatch(HookKind::Post, event, args)
    }

    /// Apply queued admin requests. Requests queued while applying wait for
    /// the next call. Returns how many were applied.
    pub fn process_requests(&mut self) -> usize {
        let batch: Vec<AdminRequest> = self.requests.borrow_mut().drain(..).collect();
        let count = batch.len();
        for request in batch {
            let result = match request.kind {
                RequestKind::Load => self.load_plugin(&request.directory).map(|_| ()),
                RequestKind::Unload => self.unload_plugin(&request.directory),
                RequestKind::Reload => self.reload_plugin(&request.directory).map(|_| ()),
            };
            match result {
                Ok(()) => info!(
                    plugin = %request.directory,
                    requested_by = %request.requested_by,
                    request = %request.kind,
                    "Applied admin request"
                ),
                Err(e) => warn!(
                    plugin = %request.directory,
                    requested_by = %request.requested_by,
                    request = %request.kind,
                    error = %e,
                    "Admin request failed"
                ),
            }
        }
        count
    }

    // -----------------------------------------------------------------
    // Host event feed
    // -----------------------------------------------------------------

    /// Start a session and announce it.
    pub fn start_session(&mut self) -> DispatchReport {
        self.host.borrow_mut().start_session();
        self.dispatch_hook(events::SESSION_START, &[])
    }

    /// Announce the end of the session, then mark it over. Seated
    /// participants stay connected for the next session.
    pub fn end_session(&mut self) -> DispatchReport {
        let report = self.dispatch_hook(events::SESSION_END, &[]);
        self.host.borrow_mut().end_session();
        report
    }

    /// Seat a participant and announce it. Returns the slot, or `None`
    /// when every slot is taken.
    pub fn connect_participant(&mut self, name: &str) -> Option<usize> {
        let participant = self.host.borrow_mut().connect(name)?;
        self.dispatch_hook(events::PARTICIPANT_CONNECTED, &[participant.to_dynamic()]);
        Some(participant.slot)
    }

    /// Mark the participant in `slot` as fully joined and announce it.
    pub fn participant_in_session(&mut self, slot: usize) -> bool {
        let Some(participant) = self.host.borrow_mut().mark_in_session(slot) else {
            return false;
        };
        self.dispatch_hook(events::PARTICIPANT_IN_SESSION, &[participant.to_dynamic()]);
        true
    }

    /// Announce that the participant in `slot` left, then free the slot.
    pub fn disconnect_participant(&mut self, slot: usize) -> bool {
        let Some(participant) = self.host.borrow().get(slot).cloned() else {
            return false;
        };
        self.dispatch_hook(events::PARTICIPANT_DISCONNECTED, &[participant.to_dynamic()]);
        self.host.borrow_mut().disconnect(slot);
        true
    }

    /// One host tick.
    pub fn tick(&mut self) -> DispatchReport {
        self.dispatch_hook(events::TICK, &[])
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.directories())
            .field("modules", &self.modules.len())
            .field("trusted", &self.trust.len())
            .field("pending_requests", &self.requests.borrow().len())
            .finish_non_exhaustive()
    }
}
