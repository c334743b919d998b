//! Trust list: which plugin directories run without the sandbox.
//!
//! Every plugin is sandboxed unless its directory name appears on the list.
//! The list is read once at startup; a missing file trusts nobody.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

/// Set of trusted plugin directory names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustList {
    names: HashSet<String>,
}

impl TrustList {
    /// A list that trusts nobody.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from directory names.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Read the list file. Absence or an unreadable file yields an empty
    /// list; neither stops the host from starting.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match ember_config::read_name_list(path) {
            Ok(Some(names)) => {
                info!(path = %path.display(), count = names.len(), "Loaded trust list");
                Self::from_names(names)
            },
            Ok(None) => {
                warn!(path = %path.display(), "Trust list not found, all plugins will be sandboxed");
                Self::empty()
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Trust list unreadable, all plugins will be sandboxed");
                Self::empty()
            },
        }
    }

    /// Whether `directory` is trusted.
    #[must_use]
    pub fn contains(&self, directory: &str) -> bool {
        self.names.contains(directory)
    }

    /// Number of trusted names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nobody is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_trusts_nobody() {
        let dir = tempfile::tempdir().unwrap();
        let list = TrustList::load(&dir.path().join("trusted.txt"));
        assert!(list.is_empty());
        assert!(!list.contains("anything"));
    }

    #[test]
    fn test_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trusted.txt");
        std::fs::write(&path, "trusted_pkg\r\nadmin\n").unwrap();
        let list = TrustList::load(&path);
        assert_eq!(list.len(), 2);
        assert!(list.contains("trusted_pkg"));
        assert!(!list.contains("other_pkg"));
    }
}
