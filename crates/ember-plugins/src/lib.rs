//! Rhai plugin host for the Ember server.
//!
//! Loads script plugins from directories under a plugin root, gives each one
//! an isolated execution context with a fixed set of capability modules, and
//! fans host events out to the hooks the scripts register.
//!
//! - [`PluginManager`]: registry of loaded plugins, trust decision, load and
//!   unload with rollback, hook dispatch, deferred admin requests
//! - [`Plugin`]: one execution context plus its hooks, attached modules and
//!   destroy callbacks
//! - [`CapabilityModule`]: the closed set of script-visible modules
//!   (`plugin`, `console`, `clients`, `keyvalue`, `socket`)
//! - [`Binding`]: a named bag of native functions, constants and types that a
//!   module installs into a context
//! - [`AdminCommand`]: the `js_load` / `js_unload` / `js_reload` / `js_list`
//!   command surface
//!
//! # Trust
//!
//! A plugin whose directory name appears in the trust list runs with the
//! looser `[limits.trusted]` set and may open sockets and queue admin
//! requests. Everything else is sandboxed: stricter limits, no `eval`, and
//! file reads confined to its own directory.
//!
//! # Threading
//!
//! Everything here is single-threaded. Contexts, hooks and the host session
//! live on the host thread; shared state uses `Rc<RefCell<_>>`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod admin;
pub mod binding;
pub mod context;
pub mod destroy;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod events;
pub mod hooks;
pub mod host;
pub mod manager;
pub mod manifest;
pub mod module;
pub mod modules;
pub mod plugin;
pub mod requests;
mod sandbox;
pub mod trust;

pub use admin::{AdminCommand, AdminParseError};
pub use binding::{Binding, NativeResult};
pub use context::ContextId;
pub use destroy::{DestroyCallbacks, PluginDestroyedHandler};
pub use discovery::{discover_plugins, validate_directory_name};
pub use engine::ScriptContext;
pub use error::{PluginError, PluginResult, ScriptException};
pub use hooks::{DispatchReport, HookCallback, HookKind, HookTable};
pub use host::{HostSession, Participant, SharedHost};
pub use manager::{LoadSummary, PluginManager};
pub use manifest::{PluginManifest, load_manifest};
pub use module::{CapabilityModule, ModuleRegistry};
pub use plugin::{Plugin, PluginId, PluginInfo, PluginState};
pub use requests::{AdminRequest, RequestKind, RequestQueue};
pub use trust::TrustList;
