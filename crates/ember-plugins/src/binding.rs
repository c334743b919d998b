//! Binding declarations: the only way native code becomes script-visible.
//!
//! A [`Binding`] is a named namespace (`console`, `socket`, ...) holding
//! native functions, constants and nested namespaces, plus any custom types
//! whose methods scripts may call. Installing a binding registers it as a
//! static module of the plugin's engine, so scripts reach it as
//! `console::log("hi")`.

use std::fmt;

use rhai::{Dynamic, Engine, Module};

type TypeInstaller = Box<dyn FnOnce(&mut Engine)>;

/// Return type of native functions. An `Err` surfaces in script as a
/// catchable exception.
pub type NativeResult<T> = Result<T, Box<rhai::EvalAltResult>>;

/// A capability surface under construction for one plugin.
pub struct Binding {
    name: String,
    class_name: String,
    module: Module,
    types: Vec<TypeInstaller>,
}

impl Binding {
    /// Start an empty binding exposed to scripts as `name::`.
    #[must_use]
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        let name = name.into();
        let mut module = Module::new();
        module.set_id(name.as_str());
        Self {
            name,
            class_name: class_name.into(),
            module,
            types: Vec::new(),
        }
    }

    /// Namespace under which scripts see this binding.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptive class name of the providing module.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Native function table. Register with [`Module::set_native_fn`].
    pub fn functions(&mut self) -> &mut Module {
        &mut self.module
    }

    /// Expose a read-only value, e.g. `clients::MAX`.
    pub fn constant(&mut self, name: &str, value: impl Into<Dynamic>) -> &mut Self {
        self.module.set_var(name, value.into());
        self
    }

    /// Nest another binding under this one, e.g. `plugin::info::dir()`.
    ///
    /// Custom types of the nested binding are carried over.
    pub fn nested(&mut self, binding: Binding) -> &mut Self {
        let Binding {
            name,
            module,
            types,
            ..
        } = binding;
        self.module.set_sub_module(name, module);
        self.types.extend(types);
        self
    }

    /// Register a custom type and its methods on the engine when installed.
    pub fn custom_type(&mut self, install: impl FnOnce(&mut Engine) + 'static) -> &mut Self {
        self.types.push(Box::new(install));
        self
    }

    /// Whether `name` is a usable namespace identifier.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub(crate) fn install(self, engine: &mut Engine) {
        for install in self.types {
            install(engine);
        }
        engine.register_static_module(self.name, self.module.into());
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("types", &self.types.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(Binding::is_valid_name("console"));
        assert!(Binding::is_valid_name("key_value2"));
        assert!(!Binding::is_valid_name(""));
        assert!(!Binding::is_valid_name("2fast"));
        assert!(!Binding::is_valid_name("has-dash"));
    }

    #[test]
    fn test_installed_binding_is_callable() {
        let mut binding = Binding::new("math2", "MathModule");
        binding
            .functions()
            .set_native_fn("double", |x: rhai::INT| -> NativeResult<rhai::INT> {
                Ok(x.saturating_mul(2))
            });
        binding.constant("ANSWER", 42 as rhai::INT);

        let mut inner = Binding::new("deep", "DeepModule");
        inner
            .functions()
            .set_native_fn("one", || -> NativeResult<rhai::INT> { Ok(1) });
        binding.nested(inner);

        let mut engine = Engine::new();
        binding.install(&mut engine);
        let value = engine
            .eval::<rhai::INT>("math2::double(math2::ANSWER) + math2::deep::one()")
            .unwrap();
        assert_eq!(value, 85);
    }
}
