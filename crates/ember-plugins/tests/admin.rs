//! Administrative commands, autoload and discovery.

use ember_plugins::{AdminCommand, LoadSummary};
use ember_test::PluginRootFixture;

fn run(manager: &mut ember_plugins::PluginManager, line: &str) -> String {
    AdminCommand::parse(line).unwrap().execute(manager)
}

#[test]
fn test_admin_command_messages() {
    let root = PluginRootFixture::new();
    root.add_plugin("good", "");
    root.add_plugin("bad", "throw \"nope\";");
    let mut manager = root.manager();

    assert_eq!(run(&mut manager, "js_load good"), "Plugin \"good\" loaded successfully!");
    assert_eq!(run(&mut manager, "js_load good"), "Plugin \"good\" is already loaded!");
    assert!(
        run(&mut manager, "js_load bad").starts_with("Plugin \"bad\" failed to load!")
    );
    assert_eq!(run(&mut manager, "js_unload bad"), "Plugin \"bad\" is not loaded!");
    assert_eq!(
        run(&mut manager, "js_reload good"),
        "Plugin \"good\" unloaded successfully!\nPlugin \"good\" loaded successfully!"
    );
    assert_eq!(run(&mut manager, "unload good"), "Plugin \"good\" unloaded successfully!");
    assert!(manager.is_empty());
}

#[test]
fn test_admin_list() {
    let root = PluginRootFixture::new();
    root.add_plugin("alpha", "");
    root.add_plugin("beta", "");
    root.write_trusted(&["beta"]);
    let mut manager = root.manager();

    assert_eq!(run(&mut manager, "js_list"), "No plugins loaded.");

    manager.load_plugin("alpha").unwrap();
    manager.load_plugin("beta").unwrap();
    let listing = run(&mut manager, "list");

    assert!(listing.starts_with("Loaded plugins (2):"), "{listing}");
    assert!(listing.contains("alpha (sandboxed)"), "{listing}");
    assert!(listing.contains("beta (trusted)"), "{listing}");
    assert!(listing.find("alpha").unwrap() < listing.find("beta").unwrap());
}

#[test]
fn test_autoload_continues_past_failures() {
    let root = PluginRootFixture::new();
    root.add_plugin("one", "");
    root.add_plugin("broken", "throw \"bad\";");
    root.add_plugin("three", "");
    root.write_autoload(&["one", "# comment", "", "broken", "missing", "three"]);
    let mut manager = root.manager();

    let summary = manager.load_autoload_list();

    assert_eq!(
        summary,
        LoadSummary {
            loaded: vec!["one".into(), "three".into()],
            failed: vec!["broken".into(), "missing".into()],
        }
    );
    assert_eq!(manager.directories(), vec!["one", "three"]);
}

#[test]
fn test_missing_autoload_list_loads_nothing() {
    let root = PluginRootFixture::new();
    root.add_plugin("one", "");
    let mut manager = root.manager();

    assert_eq!(manager.load_autoload_list(), LoadSummary::default());
    assert!(manager.is_empty());
}

#[test]
fn test_load_all_discovered_skips_disabled() {
    let root = PluginRootFixture::new();
    root.add_plugin("zeta", "");
    root.add_plugin("alpha", "");
    root.add_plugin("disabled", "");
    root.add_plugin(".hidden", "");
    let mut manager = root.manager();

    let summary = manager.load_all_discovered().unwrap();

    assert_eq!(summary.loaded, vec!["alpha", "zeta"]);
    assert!(summary.failed.is_empty());
    assert_eq!(manager.directories(), vec!["alpha", "zeta"]);
}
