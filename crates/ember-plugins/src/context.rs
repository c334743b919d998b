//! Context index: resolves an execution context to the plugin that owns it.
//!
//! Native functions run inside a plugin's engine but hold no reference to
//! the [`Plugin`](crate::Plugin) itself. They identify their caller either
//! through the [`ContextId`] captured when their binding was built, or
//! through [`current_plugin`], which reads the stack of contexts currently
//! executing script code. Both resolve through a thread-local index that the
//! plugin registers on construction and removes on destruction.
//!
//! Hook registrations made by script code are written to a per-context
//! journal instead of touching the plugin while it is running. The plugin
//! drains the journal after every call into its context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::hooks::{HookCallback, HookKind};
use crate::plugin::PluginInfo;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A mutation requested from inside a running context.
#[derive(Debug, Clone)]
pub(crate) enum PendingOp {
    /// Append a callback to one of the plugin's hook mappings.
    RegisterHook {
        kind: HookKind,
        event: String,
        callback: HookCallback,
    },
    /// The script declared the API version it targets.
    DeclareApi(u32),
}

struct ContextRecord {
    owner: PluginInfo,
    api_version: Option<u32>,
    pending: Vec<PendingOp>,
}

thread_local! {
    static CONTEXTS: RefCell<HashMap<ContextId, ContextRecord>> = RefCell::new(HashMap::new());
    static RUNNING: RefCell<Vec<ContextId>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn register(id: ContextId, owner: PluginInfo) {
    CONTEXTS.with(|c| {
        c.borrow_mut().insert(
            id,
            ContextRecord {
                owner,
                api_version: None,
                pending: Vec::new(),
            },
        );
    });
}

pub(crate) fn unregister(id: ContextId) {
    CONTEXTS.with(|c| {
        c.borrow_mut().remove(&id);
    });
}

/// The plugin that owns `id`, if it is still alive.
#[must_use]
pub fn owner(id: ContextId) -> Option<PluginInfo> {
    CONTEXTS.with(|c| c.borrow().get(&id).map(|r| r.owner.clone()))
}

/// The context currently executing script code, innermost first.
#[must_use]
pub fn current() -> Option<ContextId> {
    RUNNING.with(|r| r.borrow().last().copied())
}

/// The plugin whose script code is currently executing.
#[must_use]
pub fn current_plugin() -> Option<PluginInfo> {
    current().and_then(owner)
}

pub(crate) fn push_pending(id: ContextId, op: PendingOp) -> bool {
    CONTEXTS.with(|c| match c.borrow_mut().get_mut(&id) {
        Some(record) => {
            if let PendingOp::DeclareApi(version) = op {
                record.api_version = Some(version);
            }
            record.pending.push(op);
            true
        },
        None => false,
    })
}

pub(crate) fn take_pending(id: ContextId) -> Vec<PendingOp> {
    CONTEXTS.with(|c| {
        c.borrow_mut()
            .get_mut(&id)
            .map(|r| std::mem::take(&mut r.pending))
            .unwrap_or_default()
    })
}

pub(crate) fn api_version(id: ContextId) -> Option<u32> {
    CONTEXTS.with(|c| c.borrow().get(&id).and_then(|r| r.api_version))
}

pub(crate) fn set_api_version(id: ContextId, version: u32) {
    CONTEXTS.with(|c| {
        if let Some(record) = c.borrow_mut().get_mut(&id) {
            record.api_version = Some(version);
        }
    });
}

/// Marks a context as executing for as long as the guard lives.
pub(crate) struct RunningGuard {
    id: ContextId,
}

impl RunningGuard {
    pub(crate) fn enter(id: ContextId) -> Self {
        RUNNING.with(|r| r.borrow_mut().push(id));
        Self { id }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        RUNNING.with(|r| {
            let mut stack = r.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.id) {
                stack.remove(pos);
            }
        });
    }
}
