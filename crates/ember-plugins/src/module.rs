//! Capability module descriptors.
//!
//! A module is registered once with the manager and outlives every plugin.
//! For each plugin it is attached to, it fills a [`Binding`] with the
//! native functions scripts may call, and it is told when that plugin is
//! destroyed. The set of modules is closed: every variant is listed in
//! [`CapabilityModule`].

use std::cell::RefCell;
use std::rc::Rc;

use ember_config::SocketsSection;

use crate::binding::Binding;
use crate::error::PluginResult;
use crate::host::SharedHost;
use crate::modules::{
    ClientsModule, ConsoleBuffer, ConsoleModule, KeyValueModule, PluginModule, SocketModule,
};
use crate::plugin::{Plugin, PluginId, PluginInfo};
use crate::requests::RequestQueue;

/// Plugins a module is currently attached to.
#[derive(Debug, Default)]
pub(crate) struct Attachments {
    plugins: RefCell<Vec<PluginId>>,
}

impl Attachments {
    pub(crate) fn add(&self, id: PluginId) {
        self.plugins.borrow_mut().push(id);
    }

    pub(crate) fn remove(&self, id: PluginId) {
        self.plugins.borrow_mut().retain(|p| *p != id);
    }

    pub(crate) fn snapshot(&self) -> Vec<PluginId> {
        self.plugins.borrow().clone()
    }
}

/// A registered capability module.
///
/// Cloning is cheap and yields a handle to the same module.
#[derive(Debug, Clone)]
pub enum CapabilityModule {
    /// `plugin::` hook registration, identity and admin requests.
    Plugin(Rc<PluginModule>),
    /// `console::` host console output.
    Console(Rc<ConsoleModule>),
    /// `clients::` participant slots of the host session.
    Clients(Rc<ClientsModule>),
    /// `keyvalue::` KeyValues text parsing.
    KeyValue(Rc<KeyValueModule>),
    /// `socket::` outbound TCP for trusted plugins.
    Socket(Rc<SocketModule>),
}

impl CapabilityModule {
    /// The `plugin` module, enqueueing admin requests on `requests`.
    #[must_use]
    pub fn plugin(requests: RequestQueue) -> Self {
        Self::Plugin(Rc::new(PluginModule::new(requests)))
    }

    /// The `console` module writing to the host log.
    #[must_use]
    pub fn console() -> Self {
        Self::Console(Rc::new(ConsoleModule::new(None)))
    }

    /// The `console` module that also records every line it writes.
    #[must_use]
    pub fn console_capture() -> (Self, ConsoleBuffer) {
        let buffer = ConsoleBuffer::default();
        let module = Self::Console(Rc::new(ConsoleModule::new(Some(buffer.clone()))));
        (module, buffer)
    }

    /// The `clients` module over `host`.
    #[must_use]
    pub fn clients(host: SharedHost) -> Self {
        Self::Clients(Rc::new(ClientsModule::new(host)))
    }

    /// The `keyvalue` module.
    #[must_use]
    pub fn keyvalue() -> Self {
        Self::KeyValue(Rc::new(KeyValueModule::new()))
    }

    /// The `socket` module.
    #[must_use]
    pub fn socket(config: SocketsSection) -> Self {
        Self::Socket(Rc::new(SocketModule::new(config)))
    }

    /// Namespace scripts use, e.g. `console`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plugin(_) => "plugin",
            Self::Console(_) => "console",
            Self::Clients(_) => "clients",
            Self::KeyValue(_) => "keyvalue",
            Self::Socket(_) => "socket",
        }
    }

    /// Descriptive class name.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Plugin(_) => "PluginModule",
            Self::Console(_) => "ConsoleModule",
            Self::Clients(_) => "ClientModule",
            Self::KeyValue(_) => "KeyValueModule",
            Self::Socket(_) => "SocketModule",
        }
    }

    /// Fill `binding` for `plugin` and set up per-plugin state.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot serve this plugin.
    pub fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        match self {
            Self::Plugin(m) => m.attach(plugin, binding),
            Self::Console(m) => m.attach(plugin, binding),
            Self::Clients(m) => m.attach(plugin, binding),
            Self::KeyValue(m) => m.attach(plugin, binding),
            Self::Socket(m) => m.attach(plugin, binding),
        }
    }

    /// Release whatever the module holds for `plugin`.
    pub fn on_plugin_destroyed(&self, plugin: &PluginInfo) {
        match self {
            Self::Plugin(m) => m.on_plugin_destroyed(plugin),
            Self::Console(m) => m.on_plugin_destroyed(plugin),
            Self::Clients(m) => m.on_plugin_destroyed(plugin),
            Self::KeyValue(m) => m.on_plugin_destroyed(plugin),
            Self::Socket(m) => m.on_plugin_destroyed(plugin),
        }
    }

    /// Plugins this module is attached to right now.
    #[must_use]
    pub fn attached_plugins(&self) -> Vec<PluginId> {
        match self {
            Self::Plugin(m) => m.attachments().snapshot(),
            Self::Console(m) => m.attachments().snapshot(),
            Self::Clients(m) => m.attachments().snapshot(),
            Self::KeyValue(m) => m.attachments().snapshot(),
            Self::Socket(m) => m.attachments().snapshot(),
        }
    }
}

/// Process-wide list of capability modules, in registration order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<CapabilityModule>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module. Plugins loaded earlier do not receive it.
    pub fn register(&mut self, module: CapabilityModule) {
        tracing::debug!(module = module.name(), "Registered capability module");
        self.modules.push(module);
    }

    /// Look up a module by namespace.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CapabilityModule> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// All modules in registration order.
    #[must_use]
    pub fn as_slice(&self) -> &[CapabilityModule] {
        &self.modules
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
