//! `ember check <dir>`.

use anyhow::{Result, bail};

use ember_config::HostConfig;
use ember_plugins::PluginManager;

/// Load one plugin against the configured root and report the outcome.
pub(crate) fn check_plugin(config: HostConfig, dir: &str) -> Result<()> {
    let mut manager = PluginManager::with_default_modules(config);
    manager.reload_trust_list();

    match manager.load_plugin(dir) {
        Ok(plugin) => {
            let api = plugin
                .api_version()
                .map_or_else(|| "unspecified".to_string(), |v| v.to_string());
            let trust = if plugin.is_sandboxed() { "sandboxed" } else { "trusted" };
            println!("Plugin \"{dir}\" loaded successfully! (id {}, {trust}, api {api})", plugin.id());
            manager.unload_all();
            Ok(())
        },
        Err(e) => bail!("Plugin \"{dir}\" failed to load! ({e})"),
    }
}
