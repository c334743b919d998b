//! Destroy callbacks: native cleanup tied to one plugin's lifetime.

use std::fmt;

use crate::plugin::PluginInfo;

/// A native object that wants to hear when a plugin is destroyed.
pub trait PluginDestroyedHandler {
    /// Called once, during the plugin's teardown.
    fn on_plugin_destroyed(&mut self, plugin: &PluginInfo);
}

type DestroyFn = Box<dyn FnOnce(&PluginInfo)>;

/// Cleanup actions registered on a plugin.
///
/// Functions run first, then listeners, each in registration order. No
/// deduplication happens; registering the same action twice runs it twice.
#[derive(Default)]
pub struct DestroyCallbacks {
    functions: Vec<DestroyFn>,
    listeners: Vec<Box<dyn PluginDestroyedHandler>>,
}

impl DestroyCallbacks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup function.
    pub fn add_fn(&mut self, f: impl FnOnce(&PluginInfo) + 'static) {
        self.functions.push(Box::new(f));
    }

    /// Register a listener object.
    pub fn add_listener(&mut self, listener: Box<dyn PluginDestroyedHandler>) {
        self.listeners.push(listener);
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len().saturating_add(self.listeners.len())
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.listeners.is_empty()
    }

    /// Run and remove every entry. A second call is a no-op.
    pub(crate) fn run(&mut self, plugin: &PluginInfo) {
        for f in std::mem::take(&mut self.functions) {
            f(plugin);
        }
        for mut listener in std::mem::take(&mut self.listeners) {
            listener.on_plugin_destroyed(plugin);
        }
    }
}

impl fmt::Debug for DestroyCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyCallbacks")
            .field("functions", &self.functions.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
