//! Execution engine adapter: one isolated Rhai environment per plugin.
//!
//! A [`ScriptContext`] owns an [`Engine`] (with the plugin's bindings and
//! limits), the global [`Scope`] that `as_global` scripts run in, and the
//! accumulated function library that hook callbacks resolve against.

use std::path::Path;

use rhai::module_resolvers::FileModuleResolver;
use rhai::{AST, Dynamic, Engine, FnPtr, Scope};
use tracing::{debug, info};

use ember_config::ScriptLimits;

use crate::binding::Binding;
use crate::context::{ContextId, RunningGuard};
use crate::error::{PluginError, PluginResult, ScriptException};
use crate::sandbox::SandboxedResolver;

/// One plugin's script execution environment.
pub struct ScriptContext {
    id: ContextId,
    plugin: String,
    engine: Engine,
    scope: Scope<'static>,
    library: AST,
    namespaces: Vec<String>,
}

impl ScriptContext {
    /// Build an engine for the plugin at `path`.
    ///
    /// `import` statements resolve relative to `path`. Sandboxed contexts
    /// may only import from inside `path` and lose `eval`.
    #[must_use]
    pub fn new(
        id: ContextId,
        directory: &str,
        path: &Path,
        limits: &ScriptLimits,
        sandboxed: bool,
    ) -> Self {
        let mut engine = Engine::new();
        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth)
            .set_max_string_size(limits.max_string_size)
            .set_max_array_size(limits.max_array_size)
            .set_max_map_size(limits.max_map_size);
        if sandboxed {
            engine.set_module_resolver(SandboxedResolver::new(path));
        } else {
            engine.set_module_resolver(FileModuleResolver::new_with_path(path));
        }

        let tag = directory.to_owned();
        engine.on_print(move |text| info!(plugin = %tag, "{text}"));
        let tag = directory.to_owned();
        engine.on_debug(move |text, source, pos| {
            debug!(plugin = %tag, source = source.unwrap_or(""), line = ?pos.line(), "{text}");
        });

        if sandboxed {
            engine.disable_symbol("eval");
        }

        Self {
            id,
            plugin: directory.to_owned(),
            engine,
            scope: Scope::new(),
            library: AST::empty(),
            namespaces: Vec::new(),
        }
    }

    /// Identity used by the context index.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Namespaces installed so far, in attachment order.
    #[must_use]
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Register a binding as a static module of this engine.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ModuleAttach`] if the namespace is not a valid
    /// identifier or is already taken.
    pub fn install(&mut self, binding: Binding) -> PluginResult<()> {
        let name = binding.name().to_owned();
        if !Binding::is_valid_name(&name) {
            return Err(PluginError::ModuleAttach {
                module: name,
                message: "namespace is not a valid identifier".to_owned(),
            });
        }
        if self.namespaces.contains(&name) {
            return Err(PluginError::ModuleAttach {
                module: name,
                message: "namespace already installed".to_owned(),
            });
        }
        debug!(plugin = %self.plugin, module = %name, class = binding.class_name(), "Installed binding");
        binding.install(&mut self.engine);
        self.namespaces.push(name);
        Ok(())
    }

    /// Compile and run `source`.
    ///
    /// With `as_global`, top-level variables persist in the context's scope.
    /// Function definitions always join the context library so callbacks
    /// created by the script stay callable.
    ///
    /// # Errors
    ///
    /// Returns the parse or runtime failure as a [`ScriptException`].
    pub fn run(&mut self, name: &str, source: &str, as_global: bool) -> Result<(), ScriptException> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| ScriptException::from_parse(&self.plugin, name, &e))?;

        self.library.combine(ast.clone_functions_only());
        let mut program = self.library.merge(&ast);
        program.set_source(name);

        let _running = RunningGuard::enter(self.id);
        let result = if as_global {
            self.engine.run_ast_with_scope(&mut self.scope, &program)
        } else {
            let mut scope = Scope::new();
            self.engine.run_ast_with_scope(&mut scope, &program)
        };
        result.map_err(|e| ScriptException::from_eval(&self.plugin, name, *e))
    }

    /// Invoke a script function reference with `args`.
    ///
    /// # Errors
    ///
    /// Returns the failure as a [`ScriptException`].
    pub fn call(&self, func: &FnPtr, args: &[Dynamic]) -> Result<Dynamic, ScriptException> {
        let _running = RunningGuard::enter(self.id);
        func.call::<Dynamic>(&self.engine, &self.library, args.to_vec())
            .map_err(|e| ScriptException::from_eval(&self.plugin, func.fn_name(), *e))
    }

    /// Value of a global variable set by an `as_global` script.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Dynamic> {
        self.scope.get_value::<Dynamic>(name)
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}
