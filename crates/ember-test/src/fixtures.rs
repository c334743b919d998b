//! On-disk plugin roots for tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use ember_config::HostConfig;
use ember_plugins::modules::ConsoleBuffer;
use ember_plugins::{CapabilityModule, PluginManager};

/// A temporary plugin root directory.
///
/// Everything is removed when the fixture is dropped, so keep it alive for
/// as long as the manager that reads from it.
#[derive(Debug)]
pub struct PluginRootFixture {
    dir: TempDir,
}

impl PluginRootFixture {
    /// Create an empty plugin root.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::with_prefix("ember-plugins-").expect("Failed to create plugin root"),
        }
    }

    /// Path of the plugin root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create `name/Main.rhai` containing `main_src`. Returns the plugin
    /// directory.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    pub fn add_plugin(&self, name: &str, main_src: &str) -> PathBuf {
        self.add_file(name, "Main.rhai", main_src);
        self.root().join(name)
    }

    /// Write `relative` inside plugin `name`, creating directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn add_file(&self, name: &str, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(name).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create plugin directory");
        }
        fs::write(&path, content).expect("Failed to write plugin file");
        path
    }

    /// Write `name/plugin.toml`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn add_manifest(&self, name: &str, toml: &str) -> PathBuf {
        self.add_file(name, "plugin.toml", toml)
    }

    /// Write the trust list.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_trusted(&self, names: &[&str]) {
        self.write_list("trusted.txt", names);
    }

    /// Write the autoload list.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_autoload(&self, names: &[&str]) {
        self.write_list("autoload.txt", names);
    }

    fn write_list(&self, file: &str, names: &[&str]) {
        let mut content = names.join("\n");
        content.push('\n');
        fs::write(self.root().join(file), content).expect("Failed to write name list");
    }

    /// Default configuration pointed at this root.
    #[must_use]
    pub fn config(&self) -> HostConfig {
        let mut config = HostConfig::default();
        config.plugins.root = self.root().to_path_buf();
        config
    }

    /// Manager with the default modules and the trust list read from disk.
    #[must_use]
    pub fn manager(&self) -> PluginManager {
        self.manager_with(self.config())
    }

    /// Manager with the default modules over a custom configuration.
    #[must_use]
    pub fn manager_with(&self, config: HostConfig) -> PluginManager {
        let mut manager = PluginManager::with_default_modules(config);
        manager.reload_trust_list();
        manager
    }

    /// Manager whose `console` module records every line scripts write.
    #[must_use]
    pub fn capture_manager(&self) -> (PluginManager, ConsoleBuffer) {
        let mut manager = PluginManager::new(self.config());
        let (console, buffer) = CapabilityModule::console_capture();
        manager.register_module(CapabilityModule::plugin(manager.requests()));
        manager.register_module(console);
        manager.register_module(CapabilityModule::clients(manager.host()));
        manager.register_module(CapabilityModule::keyvalue());
        manager.register_module(CapabilityModule::socket(manager.config().sockets));
        manager.reload_trust_list();
        (manager, buffer)
    }
}

impl Default for PluginRootFixture {
    fn default() -> Self {
        Self::new()
    }
}
