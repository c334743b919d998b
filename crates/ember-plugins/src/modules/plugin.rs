//! `plugin::` - hook registration, identity and admin requests.
//!
//! ```rhai
//! plugin::hook("session_start", || console::log("map up"));
//! plugin::hook_event("round_end", |winner| console::log(`${winner} won`));
//! plugin::api_version(1);
//! if !plugin::is_sandboxed() { plugin::reload("other"); }
//! ```

use rhai::{Dynamic, FnPtr, INT, ImmutableString};
use tracing::debug;

use crate::binding::{Binding, NativeResult};
use crate::context::{self, ContextId, PendingOp};
use crate::error::PluginResult;
use crate::hooks::{HookCallback, HookKind};
use crate::module::Attachments;
use crate::plugin::{Plugin, PluginInfo};
use crate::requests::{AdminRequest, RequestKind, RequestQueue};

/// Hook registration and plugin self-inspection.
#[derive(Debug)]
pub struct PluginModule {
    requests: RequestQueue,
    attachments: Attachments,
}

impl PluginModule {
    pub(crate) fn new(requests: RequestQueue) -> Self {
        Self {
            requests,
            attachments: Attachments::default(),
        }
    }

    pub(crate) fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub(crate) fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        let ctx = plugin.context_id();
        let fns = binding.functions();

        for (name, kind) in [
            ("hook", HookKind::Pre),
            ("hook_event", HookKind::Event),
            ("hook_event_post", HookKind::Post),
        ] {
            fns.set_native_fn(
                name,
                move |event: ImmutableString, callback: FnPtr| -> NativeResult<()> {
                    register_hook(ctx, kind, &event, callback)
                },
            );
        }

        fns.set_native_fn("dir", move || -> NativeResult<String> {
            Ok(owner(ctx)?.directory)
        });
        fns.set_native_fn("id", move || -> NativeResult<INT> {
            Ok(INT::try_from(owner(ctx)?.id.get()).unwrap_or(INT::MAX))
        });
        fns.set_native_fn("is_sandboxed", move || -> NativeResult<bool> {
            Ok(owner(ctx)?.sandboxed)
        });
        fns.set_native_fn("api_version", move || -> NativeResult<Dynamic> {
            Ok(context::api_version(ctx).map_or(Dynamic::UNIT, |v| Dynamic::from(INT::from(v))))
        });
        fns.set_native_fn("api_version", move |version: INT| -> NativeResult<()> {
            let version = u32::try_from(version)
                .map_err(|_| format!("api version {version} is out of range"))?;
            if context::push_pending(ctx, PendingOp::DeclareApi(version)) {
                Ok(())
            } else {
                Err("plugin context has been released".into())
            }
        });

        for (name, kind) in [
            ("load", RequestKind::Load),
            ("unload", RequestKind::Unload),
            ("reload", RequestKind::Reload),
        ] {
            let requests = self.requests.clone();
            fns.set_native_fn(name, move |directory: ImmutableString| -> NativeResult<()> {
                let caller = owner(ctx)?;
                if caller.sandboxed {
                    return Err(format!("plugin::{kind} is not available to sandboxed plugins").into());
                }
                if directory.trim().is_empty() {
                    return Err(format!("plugin::{kind} needs a plugin directory").into());
                }
                debug!(plugin = %caller.directory, target = %directory, request = %kind, "Queued admin request");
                requests.borrow_mut().push_back(AdminRequest {
                    kind,
                    directory: directory.to_string(),
                    requested_by: caller.directory,
                });
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

fn owner(ctx: ContextId) -> NativeResult<PluginInfo> {
    context::owner(ctx).ok_or_else(|| "plugin context has been released".into())
}

fn register_hook(ctx: ContextId, kind: HookKind, event: &str, callback: FnPtr) -> NativeResult<()> {
    if event.is_empty() {
        return Err("hook event name must not be empty".into());
    }
    let op = PendingOp::RegisterHook {
        kind,
        event: event.to_owned(),
        callback: HookCallback::new(callback),
    };
    if context::push_pending(ctx, op) {
        Ok(())
    } else {
        Err("plugin context has been released".into())
    }
}
