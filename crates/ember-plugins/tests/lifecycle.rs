//! Load, unload, rollback and teardown behaviour of the plugin manager.

use ember_plugins::{CapabilityModule, PluginError, PluginManager, PluginState};
use ember_test::{CallLog, PluginRootFixture, init_test_logging};

#[test]
fn test_load_is_idempotent() {
    init_test_logging();
    let root = PluginRootFixture::new();
    root.add_plugin("hello", r#"let greeting = "hi";"#);
    let mut manager = root.manager();

    let first = manager.load_plugin("hello").unwrap().id();
    let second = manager.load_plugin("hello").unwrap().id();

    assert_eq!(first, second);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.directories(), vec!["hello"]);
}

#[test]
fn test_loaded_plugin_state_and_globals() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "let answer = 42;");
    let mut manager = root.manager();

    let plugin = manager.load_plugin("hello").unwrap();
    assert_eq!(plugin.state(), PluginState::Loaded);
    assert!(plugin.is_sandboxed());
    assert_eq!(plugin.global("answer").unwrap().as_int().unwrap(), 42);
    assert_eq!(
        plugin.module_names(),
        vec!["plugin", "console", "clients", "keyvalue", "socket"]
    );
}

#[test]
fn test_unload_removes_plugin() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "");
    let mut manager = root.manager();

    manager.load_plugin("hello").unwrap();
    manager.unload_plugin("hello").unwrap();

    assert!(manager.find_by_directory("hello").is_none());
    assert!(manager.is_empty());
}

#[test]
fn test_unload_unknown_plugin_is_reported() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "");
    let mut manager = root.manager();
    manager.load_plugin("hello").unwrap();

    let err = manager.unload_plugin("ghost").unwrap_err();
    assert!(matches!(err, PluginError::NotLoaded(ref d) if d == "ghost"));
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_missing_and_invalid_directories() {
    let root = PluginRootFixture::new();
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("nowhere"),
        Err(PluginError::DirectoryNotFound(_))
    ));
    assert!(matches!(
        manager.load_plugin("../escape"),
        Err(PluginError::InvalidDirectory { .. })
    ));
    assert!(manager.is_empty());
}

#[test]
fn test_entry_exception_rolls_back() {
    let root = PluginRootFixture::new();
    root.add_plugin(
        "broken",
        r#"
        plugin::hook("tick", || console::log("never"));
        throw "boom";
        "#,
    );
    let mut manager = root.manager();

    let err = manager.load_plugin("broken").unwrap_err();
    match err {
        PluginError::Script(ex) => {
            assert_eq!(ex.plugin, "broken");
            assert!(ex.message.contains("boom"), "{}", ex.message);
            assert!(ex.line.is_some());
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.find_by_directory("broken").is_none());
    for module in manager.modules().as_slice() {
        assert!(
            module.attached_plugins().is_empty(),
            "{} still lists the failed plugin",
            module.name()
        );
    }
}

#[test]
fn test_module_attach_failure_rolls_back() {
    let root = PluginRootFixture::new();
    root.add_plugin("twice", "let touched = true;");
    let mut manager = PluginManager::new(root.config());
    manager.register_module(CapabilityModule::keyvalue());
    manager.register_module(CapabilityModule::keyvalue());

    let err = manager.load_plugin("twice").unwrap_err();
    match err {
        PluginError::ModuleAttach { module, .. } => assert_eq!(module, "keyvalue"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.find_by_directory("twice").is_none());
    assert!(manager.is_empty());
    for module in manager.modules().as_slice() {
        assert!(module.attached_plugins().is_empty(), "{}", module.name());
    }
}

#[test]
fn test_entry_parse_error_rolls_back() {
    let root = PluginRootFixture::new();
    root.add_plugin("typo", "let x = ;");
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("typo"),
        Err(PluginError::Script(_))
    ));
    assert!(manager.is_empty());
}

#[test]
fn test_missing_entry_file_fails() {
    let root = PluginRootFixture::new();
    root.add_file("empty", "README.txt", "no script here");
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("empty"),
        Err(PluginError::Io { .. })
    ));
}

#[test]
fn test_declared_api_version_outside_range_fails() {
    let root = PluginRootFixture::new();
    root.add_plugin("future", "plugin::api_version(7);");
    root.add_plugin("current", "plugin::api_version(1);");
    let mut manager = root.manager();

    match manager.load_plugin("future").unwrap_err() {
        PluginError::ApiVersionMismatch {
            declared, min, max, ..
        } => {
            assert_eq!(declared, 7);
            assert_eq!((min, max), (1, 1));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.find_by_directory("future").is_none());

    let plugin = manager.load_plugin("current").unwrap();
    assert_eq!(plugin.api_version(), Some(1));
}

#[test]
fn test_manifest_api_version_checked_before_modules_attach() {
    let root = PluginRootFixture::new();
    root.add_plugin("old", "console::log(\"unreachable\");");
    root.add_manifest("old", "name = \"Old\"\napi_version = 0\n");
    let (mut manager, console) = root.capture_manager();

    assert!(matches!(
        manager.load_plugin("old"),
        Err(PluginError::ApiVersionMismatch { declared: 0, .. })
    ));
    assert!(console.lines().is_empty());
}

#[test]
fn test_manifest_entry_overrides_main() {
    let root = PluginRootFixture::new();
    root.add_file("custom", "src/start.rhai", "console::log(\"custom entry\");");
    root.add_manifest("custom", "name = \"Custom\"\nentry = \"src/start.rhai\"\n");
    let (mut manager, console) = root.capture_manager();

    let plugin = manager.load_plugin("custom").unwrap();
    assert_eq!(plugin.manifest().unwrap().name.as_deref(), Some("Custom"));
    assert_eq!(console.lines(), vec!["custom entry"]);
}

#[test]
fn test_destroy_callbacks_run_once_in_order() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "");
    let mut manager = root.manager();
    let log = CallLog::new();

    manager.load_plugin("hello").unwrap();
    let plugin = manager.find_by_directory_mut("hello").unwrap();
    plugin.register_destroy_listener(log.listener("listener"));
    plugin.register_destroy_fn(log.recorder("fn1"));
    plugin.register_destroy_fn(log.recorder("fn2"));

    manager.unload_plugin("hello").unwrap();
    assert_eq!(
        log.entries(),
        vec!["fn1:hello", "fn2:hello", "listener:hello"]
    );

    drop(manager);
    assert_eq!(log.len(), 3);
}

#[test]
fn test_destroyed_plugin_leaves_every_module() {
    let root = PluginRootFixture::new();
    root.add_plugin("a", "");
    root.add_plugin("b", "");
    let mut manager = root.manager();

    let a = manager.load_plugin("a").unwrap().id();
    let b = manager.load_plugin("b").unwrap().id();
    manager.unload_plugin("a").unwrap();

    for module in manager.modules().as_slice() {
        let attached = module.attached_plugins();
        assert!(!attached.contains(&a), "{}", module.name());
        assert!(attached.contains(&b), "{}", module.name());
    }
}

#[test]
fn test_unload_all_goes_in_reverse_order() {
    let root = PluginRootFixture::new();
    for name in ["first", "second", "third"] {
        root.add_plugin(name, "");
    }
    let mut manager = root.manager();
    let log = CallLog::new();

    for name in ["first", "second", "third"] {
        manager.load_plugin(name).unwrap();
        manager
            .find_by_directory_mut(name)
            .unwrap()
            .register_destroy_fn(log.recorder("down"));
    }
    manager.unload_all();

    assert!(manager.is_empty());
    assert_eq!(
        log.entries(),
        vec!["down:third", "down:second", "down:first"]
    );
}

#[test]
fn test_reload_creates_fresh_plugin() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "let version = 1;");
    let mut manager = root.manager();

    let old = manager.load_plugin("hello").unwrap().id();
    root.add_plugin("hello", "let version = 2;");
    let plugin = manager.reload_plugin("hello").unwrap();

    assert_ne!(plugin.id(), old);
    assert_eq!(plugin.global("version").unwrap().as_int().unwrap(), 2);
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_reload_of_unloaded_plugin_loads_it() {
    let root = PluginRootFixture::new();
    root.add_plugin("hello", "");
    let mut manager = root.manager();

    manager.reload_plugin("hello").unwrap();
    assert!(manager.find_by_directory("hello").is_some());
}

#[test]
fn test_imports_resolve_inside_plugin_directory() {
    let root = PluginRootFixture::new();
    root.add_file("lib", "util.rhai", "fn double(x) { x * 2 }");
    root.add_plugin("lib", "import \"util\" as util;\nlet result = util::double(21);");
    let mut manager = root.manager();

    let plugin = manager.load_plugin("lib").unwrap();
    assert_eq!(plugin.global("result").unwrap().as_int().unwrap(), 42);
}
