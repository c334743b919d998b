//! Per-plugin hook storage.
//!
//! A plugin keeps three independent mappings from event name to an ordered
//! list of script callbacks:
//!
//! - [`HookKind::Pre`]: host lifecycle events and the pre-action bracket
//! - [`HookKind::Event`]: host game events
//! - [`HookKind::Post`]: the post-action bracket of host game events
//!
//! Callbacks for one event run in registration order.

use std::collections::HashMap;
use std::fmt;

use rhai::FnPtr;

/// Which of a plugin's three hook mappings a callback lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Pre-dispatch hooks (`plugin::hook`).
    Pre,
    /// Event hooks (`plugin::hook_event`).
    Event,
    /// Post-event hooks (`plugin::hook_event_post`).
    Post,
}

impl HookKind {
    /// All kinds in mapping order.
    pub const ALL: [Self; 3] = [Self::Pre, Self::Event, Self::Post];

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Event => "event",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script function reference registered as a hook.
///
/// Only meaningful inside the context that created it; the owning plugin
/// drops it on destruction.
#[derive(Debug, Clone)]
pub struct HookCallback {
    func: FnPtr,
}

impl HookCallback {
    pub(crate) fn new(func: FnPtr) -> Self {
        Self { func }
    }

    /// Script-side function name (`anon$...` for closures).
    #[must_use]
    pub fn name(&self) -> &str {
        self.func.fn_name()
    }

    pub(crate) fn func(&self) -> &FnPtr {
        &self.func
    }
}

/// Outcome of running the callbacks for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks invoked.
    pub invoked: usize,
    /// Callbacks that raised an exception.
    pub failed: usize,
}

impl DispatchReport {
    /// Add another report's counts to this one.
    pub fn absorb(&mut self, other: Self) {
        self.invoked = self.invoked.saturating_add(other.invoked);
        self.failed = self.failed.saturating_add(other.failed);
    }
}

/// The three hook mappings of one plugin.
#[derive(Debug, Default)]
pub struct HookTable {
    pre: HashMap<String, Vec<HookCallback>>,
    event: HashMap<String, Vec<HookCallback>>,
    post: HashMap<String, Vec<HookCallback>>,
}

impl HookTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, kind: HookKind) -> &mut HashMap<String, Vec<HookCallback>> {
        match kind {
            HookKind::Pre => &mut self.pre,
            HookKind::Event => &mut self.event,
            HookKind::Post => &mut self.post,
        }
    }

    fn map(&self, kind: HookKind) -> &HashMap<String, Vec<HookCallback>> {
        match kind {
            HookKind::Pre => &self.pre,
            HookKind::Event => &self.event,
            HookKind::Post => &self.post,
        }
    }

    /// The callback list for `event`, created empty on first access.
    pub fn get_or_create(&mut self, kind: HookKind, event: &str) -> &mut Vec<HookCallback> {
        self.map_mut(kind).entry(event.to_owned()).or_default()
    }

    /// Append a callback for `event`.
    pub fn push(&mut self, kind: HookKind, event: &str, callback: HookCallback) {
        self.get_or_create(kind, event).push(callback);
    }

    /// Number of callbacks registered for `event`, without creating an entry.
    #[must_use]
    pub fn count(&self, kind: HookKind, event: &str) -> usize {
        self.map(kind).get(event).map_or(0, Vec::len)
    }

    /// Total callbacks across all mappings.
    #[must_use]
    pub fn total(&self) -> usize {
        HookKind::ALL
            .iter()
            .map(|k| self.map(*k).values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Drop every callback.
    pub fn clear(&mut self) {
        self.pre.clear();
        self.event.clear();
        self.post.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(name: &str) -> HookCallback {
        HookCallback::new(FnPtr::new(name).unwrap())
    }

    #[test]
    fn test_first_access_creates_empty_list() {
        let mut table = HookTable::new();
        assert_eq!(table.count(HookKind::Event, "round_start"), 0);
        assert!(table.get_or_create(HookKind::Event, "round_start").is_empty());
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_mappings_are_independent_and_ordered() {
        let mut table = HookTable::new();
        table.push(HookKind::Event, "e", callback("first"));
        table.push(HookKind::Event, "e", callback("second"));
        table.push(HookKind::Post, "e", callback("post"));

        let names: Vec<_> = table
            .get_or_create(HookKind::Event, "e")
            .iter()
            .map(|c| c.name().to_owned())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(table.count(HookKind::Post, "e"), 1);
        assert_eq!(table.count(HookKind::Pre, "e"), 0);
        assert_eq!(table.total(), 3);

        table.clear();
        assert_eq!(table.total(), 0);
    }
}
