//! Trust decisions and the trust-gated capability modules.

use std::io::Read;
use std::net::TcpListener;
use std::time::{Duration, Instant};

use ember_plugins::{CapabilityModule, PluginError, TrustList};
use ember_test::PluginRootFixture;

#[test]
fn test_trusted_and_sandboxed_plugins() {
    let root = PluginRootFixture::new();
    root.add_plugin("trusted_pkg", "let sandboxed = plugin::is_sandboxed();");
    root.add_plugin("other_pkg", "let sandboxed = plugin::is_sandboxed();");
    root.write_trusted(&["# admins", "trusted_pkg", ""]);
    let mut manager = root.manager();

    let trusted = manager.load_plugin("trusted_pkg").unwrap();
    assert!(!trusted.is_sandboxed());
    assert!(!trusted.global("sandboxed").unwrap().as_bool().unwrap());

    let other = manager.load_plugin("other_pkg").unwrap();
    assert!(other.is_sandboxed());
    assert!(other.global("sandboxed").unwrap().as_bool().unwrap());
}

#[test]
fn test_missing_trust_list_sandboxes_everything() {
    let root = PluginRootFixture::new();
    root.add_plugin("any", "");
    let mut manager = root.manager();

    assert_eq!(manager.reload_trust_list(), 0);
    assert!(manager.load_plugin("any").unwrap().is_sandboxed());
}

#[test]
fn test_trust_change_applies_to_next_load_only() {
    let root = PluginRootFixture::new();
    root.add_plugin("pkg", "");
    let mut manager = root.manager();

    assert!(manager.load_plugin("pkg").unwrap().is_sandboxed());
    manager.set_trust_list(TrustList::from_names(["pkg"]));
    assert!(manager.find_by_directory("pkg").unwrap().is_sandboxed());

    assert!(!manager.reload_plugin("pkg").unwrap().is_sandboxed());
}

#[test]
fn test_sandboxed_plugin_cannot_eval() {
    let root = PluginRootFixture::new();
    root.add_plugin("evil", r#"eval("let x = 1;");"#);
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("evil"),
        Err(PluginError::Script(_))
    ));
}

#[test]
fn test_sandboxed_runaway_script_is_stopped() {
    let root = PluginRootFixture::new();
    root.add_plugin("spin", "loop { }");
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("spin"),
        Err(PluginError::Script(_))
    ));
}

#[test]
fn test_socket_denied_to_sandboxed_plugin() {
    let root = PluginRootFixture::new();
    root.add_plugin("net", r#"let s = socket::connect("127.0.0.1", 9);"#);
    let mut manager = root.manager();

    match manager.load_plugin("net").unwrap_err() {
        PluginError::Script(ex) => assert!(ex.message.contains("sandboxed"), "{}", ex.message),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_sockets_close_when_plugin_unloads() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let root = PluginRootFixture::new();
    root.add_plugin(
        "net",
        &r#"
        let sock = socket::connect("127.0.0.1", PORT);
        let sent = false;
        plugin::hook("tick", || {
            if !sent && sock.is_open() {
                sock.send("hello");
                sent = true;
                console::log("sent");
            }
        });
        "#
        .replace("PORT", &port.to_string()),
    );
    root.write_trusted(&["net"]);
    let (mut manager, console) = root.capture_manager();

    let id = manager.load_plugin("net").unwrap().id();
    let Some(CapabilityModule::Socket(sockets)) = manager.modules().get("socket").cloned() else {
        panic!("socket module not registered");
    };
    assert_eq!(sockets.open_sockets(id), 1);

    let (mut server, _) = listener.accept().unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    for _ in 0..500 {
        manager.tick();
        if !console.lines().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(console.lines(), vec!["sent"]);

    manager.unload_plugin("net").unwrap();
    assert_eq!(sockets.open_sockets(id), 0);

    let mut received = String::new();
    server.read_to_string(&mut received).unwrap();
    assert_eq!(received, "hello");
}

#[test]
fn test_socket_connect_returns_without_waiting() {
    let root = PluginRootFixture::new();
    root.add_plugin(
        "slow",
        r#"
        try {
            let sock = socket::connect("10.255.255.1", 81);
        } catch {}
        "#,
    );
    root.write_trusted(&["slow"]);
    let mut config = root.config();
    config.sockets.connect_timeout_ms = 30_000;
    let mut manager = root.manager_with(config);

    let started = Instant::now();
    manager.load_plugin("slow").unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "load took {:?}",
        started.elapsed()
    );
}

#[test]
fn test_socket_connect_refuses_hostnames() {
    let root = PluginRootFixture::new();
    root.add_plugin("named", r#"let s = socket::connect("example.invalid", 80);"#);
    root.write_trusted(&["named"]);
    let mut manager = root.manager();

    match manager.load_plugin("named").unwrap_err() {
        PluginError::Script(ex) => assert!(ex.message.contains("not resolved"), "{}", ex.message),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_socket_limit_per_plugin() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let root = PluginRootFixture::new();
    root.add_plugin(
        "greedy",
        &format!(
            r#"
            let a = socket::connect("127.0.0.1", {port});
            let b = socket::connect("127.0.0.1", {port});
            "#
        ),
    );
    root.write_trusted(&["greedy"]);
    let mut config = root.config();
    config.sockets.max_per_plugin = 1;
    let mut manager = root.manager_with(config);

    match manager.load_plugin("greedy").unwrap_err() {
        PluginError::Script(ex) => assert!(ex.message.contains("limit"), "{}", ex.message),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_keyvalue_file_inside_plugin_directory() {
    let root = PluginRootFixture::new();
    root.add_file(
        "cfg",
        "settings.kv",
        "\"Settings\"\n{\n  \"motd\" \"welcome\"\n}\n",
    );
    root.add_plugin(
        "cfg",
        r#"
        let kv = keyvalue::parse_file("settings.kv");
        let motd = kv.Settings.motd;
        "#,
    );
    let mut manager = root.manager();

    let plugin = manager.load_plugin("cfg").unwrap();
    assert_eq!(
        plugin.global("motd").unwrap().into_string().unwrap(),
        "welcome"
    );
}

#[test]
fn test_keyvalue_sandbox_blocks_outside_files() {
    let root = PluginRootFixture::new();
    std::fs::write(root.root().join("secret.kv"), "key value\n").unwrap();
    let script = r#"let kv = keyvalue::parse_file("../secret.kv");"#;
    root.add_plugin("jailed", script);
    root.add_plugin("free", script);
    root.write_trusted(&["free"]);
    let mut manager = root.manager();

    assert!(matches!(
        manager.load_plugin("jailed"),
        Err(PluginError::Script(_))
    ));
    assert!(manager.load_plugin("free").is_ok());
}

#[test]
fn test_sandboxed_import_stays_inside_plugin_directory() {
    let root = PluginRootFixture::new();
    root.add_file("other", "x.rhai", "fn answer() { 42 }");
    let script = "import \"../other/x\" as x;\nlet result = x::answer();";
    root.add_plugin("jailed", script);
    root.add_plugin("free", script);
    root.write_trusted(&["free"]);
    let mut manager = root.manager();

    match manager.load_plugin("jailed").unwrap_err() {
        PluginError::Script(ex) => assert!(ex.message.contains("other/x"), "{}", ex.message),
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.find_by_directory("jailed").is_none());

    let free = manager.load_plugin("free").unwrap();
    assert_eq!(free.global("result").unwrap().as_int().unwrap(), 42);
}

#[test]
fn test_clients_module_reads_host_session() {
    let root = PluginRootFixture::new();
    root.add_plugin(
        "who",
        r#"
        plugin::hook_event("census", || {
            console::log(`${clients::count()}/${clients::max()}`);
            for p in clients::list() {
                console::log(`${p.slot} ${p.name}`);
            }
            console::log(type_of(clients::get(5)));
        });
        "#,
    );
    let mut config = root.config();
    config.host.max_participants = 4;
    let (mut manager, console) = {
        let mut manager = ember_plugins::PluginManager::new(config);
        let (module, buffer) = CapabilityModule::console_capture();
        manager.register_module(CapabilityModule::plugin(manager.requests()));
        manager.register_module(module);
        manager.register_module(CapabilityModule::clients(manager.host()));
        (manager, buffer)
    };
    manager.load_plugin("who").unwrap();
    manager.start_session();
    manager.connect_participant("erin").unwrap();
    manager.connect_participant("finn").unwrap();

    manager.dispatch_event("census", &[]);

    assert_eq!(console.lines(), vec!["2/4", "0 erin", "1 finn", "()"]);
}
