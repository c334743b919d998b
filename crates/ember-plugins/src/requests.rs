//! Deferred administrative requests.
//!
//! Scripts cannot load or unload plugins while the manager is iterating
//! over them. Trusted plugins instead enqueue a request, and the manager
//! applies it once the current dispatch has returned.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// What a request asks the manager to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Load a plugin directory.
    Load,
    /// Unload a plugin directory.
    Unload,
    /// Unload then load a plugin directory.
    Reload,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Reload => "reload",
        })
    }
}

/// A queued load/unload/reload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRequest {
    /// Operation.
    pub kind: RequestKind,
    /// Target plugin directory.
    pub directory: String,
    /// Directory of the plugin that asked.
    pub requested_by: String,
}

/// Queue shared between the manager and the `plugin` module.
pub type RequestQueue = Rc<RefCell<VecDeque<AdminRequest>>>;
