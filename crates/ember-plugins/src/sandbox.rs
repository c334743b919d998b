//! Path confinement for sandboxed plugins.
//!
//! Both file reads and `import` statements go through [`confine`], so a
//! sandboxed plugin can never name a file outside its own directory, even
//! through `..` segments or symlinks.

use std::path::{Path, PathBuf};

use rhai::module_resolvers::FileModuleResolver;
use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Shared};
use tracing::warn;

/// Canonicalize `candidate` and require it to sit under `root`.
pub(crate) fn confine(root: &Path, candidate: &Path) -> Result<PathBuf, String> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| format!("plugin directory unavailable: {e}"))?;
    let canonical = candidate
        .canonicalize()
        .map_err(|e| format!("{}: {e}", candidate.display()))?;
    if canonical.starts_with(&canonical_root) {
        Ok(canonical)
    } else {
        Err(format!(
            "{}: sandboxed plugins may only read their own directory",
            candidate.display()
        ))
    }
}

/// `import` resolver that refuses modules outside the plugin directory.
pub(crate) struct SandboxedResolver {
    root: PathBuf,
    files: FileModuleResolver,
}

impl SandboxedResolver {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: FileModuleResolver::new_with_path(root),
        }
    }
}

impl ModuleResolver for SandboxedResolver {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let candidate = self.files.get_file_path(path, None);
        if let Err(reason) = confine(&self.root, &candidate) {
            warn!(root = %self.root.display(), import = path, "Import refused: {reason}");
            return Err(EvalAltResult::ErrorModuleNotFound(path.to_owned(), pos).into());
        }
        self.files.resolve(engine, source, path, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confine_accepts_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/util.rhai"), "").unwrap();

        let path = confine(dir.path(), &dir.path().join("lib/../lib/util.rhai")).unwrap();
        assert!(path.ends_with("lib/util.rhai"));
    }

    #[test]
    fn test_confine_rejects_parent_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("mine");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.rhai"), "").unwrap();

        let err = confine(&root, &root.join("../secret.rhai")).unwrap_err();
        assert!(err.contains("own directory"), "{err}");
    }

    #[test]
    fn test_confine_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(confine(dir.path(), &dir.path().join("nope.rhai")).is_err());
    }

    #[test]
    fn test_resolver_refuses_outside_module() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("mine");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(outer.path().join("other")).unwrap();
        std::fs::write(outer.path().join("other/x.rhai"), "fn leak() { 1 }").unwrap();

        let mut engine = Engine::new();
        engine.set_module_resolver(SandboxedResolver::new(&root));
        let err = engine.run(r#"import "../other/x" as x;"#).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorModuleNotFound(..)), "{err}");
    }
}
