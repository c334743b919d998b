//! Recorders for destroy callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use ember_plugins::{PluginDestroyedHandler, PluginInfo};

/// Shared, ordered log of labels.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    /// Entries so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A destroy function that records `label:<directory>`.
    pub fn recorder(&self, label: &str) -> impl FnOnce(&PluginInfo) + use<> {
        let log = self.clone();
        let label = label.to_string();
        move |info| log.record(format!("{label}:{}", info.directory))
    }

    /// A destroy listener that records `label:<directory>`.
    #[must_use]
    pub fn listener(&self, label: &str) -> Box<dyn PluginDestroyedHandler> {
        Box::new(RecordingListener {
            label: label.to_string(),
            log: self.clone(),
        })
    }
}

/// Destroy listener writing into a [`CallLog`].
#[derive(Debug)]
pub struct RecordingListener {
    label: String,
    log: CallLog,
}

impl RecordingListener {
    /// Listener recording `label:<directory>` into `log`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: CallLog) -> Self {
        Self {
            label: label.into(),
            log,
        }
    }
}

impl PluginDestroyedHandler for RecordingListener {
    fn on_plugin_destroyed(&mut self, plugin: &PluginInfo) {
        self.log.record(format!("{}:{}", self.label, plugin.directory));
    }
}
