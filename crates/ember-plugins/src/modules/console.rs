//! `console::` - host console output tagged with the running plugin.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::Dynamic;
use tracing::{error, info, warn};

use crate::binding::{Binding, NativeResult};
use crate::context;
use crate::error::PluginResult;
use crate::module::Attachments;
use crate::plugin::{Plugin, PluginInfo};

/// Lines written through a capturing console module.
#[derive(Debug, Clone, Default)]
pub struct ConsoleBuffer(Rc<RefCell<Vec<String>>>);

impl ConsoleBuffer {
    /// Everything written so far, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Forget captured lines.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, line: String) {
        self.0.borrow_mut().push(line);
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

/// Console output for scripts.
#[derive(Debug)]
pub struct ConsoleModule {
    capture: Option<ConsoleBuffer>,
    attachments: Attachments,
}

impl ConsoleModule {
    pub(crate) fn new(capture: Option<ConsoleBuffer>) -> Self {
        Self {
            capture,
            attachments: Attachments::default(),
        }
    }

    pub(crate) fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub(crate) fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        for (name, level) in [
            ("log", Level::Info),
            ("info", Level::Info),
            ("warn", Level::Warn),
            ("error", Level::Error),
        ] {
            let capture = self.capture.clone();
            binding
                .functions()
                .set_native_fn(name, move |value: Dynamic| -> NativeResult<()> {
                    emit(level, capture.as_ref(), &value.to_string());
                    Ok(())
                });
        }
        self.attachments.add(plugin.id());
        Ok(())
    }

    pub(crate) fn on_plugin_destroyed(&self, plugin: &PluginInfo) {
        self.attachments.remove(plugin.id);
    }
}

fn emit(level: Level, capture: Option<&ConsoleBuffer>, text: &str) {
    let plugin = context::current_plugin().map_or_else(|| "?".to_owned(), |p| p.directory);
    match level {
        Level::Info => info!(plugin = %plugin, "{text}"),
        Level::Warn => warn!(plugin = %plugin, "{text}"),
        Level::Error => error!(plugin = %plugin, "{text}"),
    }
    if let Some(buffer) = capture {
        buffer.push(text.to_owned());
    }
}
