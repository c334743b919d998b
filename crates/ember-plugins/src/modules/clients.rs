//! `clients::` - read-only view of the host's participant slots.

use rhai::{Array, Dynamic, INT};

use crate::binding::{Binding, NativeResult};
use crate::error::PluginResult;
use crate::host::{HostSession, SharedHost};
use crate::module::Attachments;
use crate::plugin::{Plugin, PluginInfo};

/// Participant access for scripts.
#[derive(Debug)]
pub struct ClientsModule {
    host: SharedHost,
    attachments: Attachments,
}

impl ClientsModule {
    pub(crate) fn new(host: SharedHost) -> Self {
        Self {
            host,
            attachments: Attachments::default(),
        }
    }

    pub(crate) fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub(crate) fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        let fns = binding.functions();

        let host = self.host.clone();
        fns.set_native_fn("count", move || -> NativeResult<INT> {
            with_host(&host, |h| to_int(h.count()))
        });
        let host = self.host.clone();
        fns.set_native_fn("max", move || -> NativeResult<INT> {
            with_host(&host, |h| to_int(h.max_participants()))
        });
        let host = self.host.clone();
        fns.set_native_fn("get", move |slot: INT| -> NativeResult<Dynamic> {
            let Ok(slot) = usize::try_from(slot) else {
                return Ok(Dynamic::UNIT);
            };
            with_host(&host, |h| {
                h.get(slot).map_or(Dynamic::UNIT, |p| p.to_dynamic())
            })
        });
        let host = self.host.clone();
        fns.set_native_fn("list", move || -> NativeResult<Array> {
            with_host(&host, |h| {
                h.participants().iter().map(|p| p.to_dynamic()).collect()
            })
        });

        self.attachments.add(plugin.id());
        Ok(())
    }

    pub(crate) fn on_plugin_destroyed(&self, plugin: &PluginInfo) {
        self.attachments.remove(plugin.id);
    }
}

fn with_host<T>(host: &SharedHost, f: impl FnOnce(&HostSession) -> T) -> NativeResult<T> {
    let guard = host
        .try_borrow()
        .map_err(|_| "host session is busy")?;
    Ok(f(&guard))
}

fn to_int(n: usize) -> INT {
    INT::try_from(n).unwrap_or(INT::MAX)
}
