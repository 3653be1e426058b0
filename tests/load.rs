// Loading source text and files, chunk naming and configuration files.

mod common;

use std::fs;

use solvra_lua::{Error, GuestValue, Libs, LuaRuntime, RuntimeOptions};

#[test]
fn load_returns_chunk_results() {
    let runtime = common::runtime();
    let values = runtime.load("return 1 + 1, 'two', { 3 }").expect("load");
    assert_eq!(values.len(), 3);
    assert_eq!(values.decode::<i64>(0).expect("sum"), 2);
    assert_eq!(values.decode::<String>(1).expect("text"), "two");
    assert_eq!(values.decode::<Vec<i64>>(2).expect("list"), vec![3]);
    assert!(runtime.load("x = 1").expect("no results").is_empty());
}

#[test]
fn syntax_errors_are_script_errors() {
    let runtime = common::runtime();
    match runtime.load("function (") {
        Err(Error::Script(message)) => assert!(message.contains("chunk"), "{message}"),
        other => panic!("expected script error, got {other:?}"),
    }
    // The instance stays usable.
    assert_eq!(
        runtime.load("return 5").expect("load").decode::<i64>(0).expect("five"),
        5
    );
}

#[test]
fn chunk_names_appear_in_errors() {
    let runtime = common::runtime_with(RuntimeOptions::default().with_chunk_name("=config"));
    match runtime.load("error('bad value')") {
        Err(Error::Script(message)) => assert!(message.contains("config:1: bad value"), "{message}"),
        other => panic!("expected script error, got {other:?}"),
    }
}

#[test]
fn load_file_runs_scripts_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("greeting.lua");
    fs::write(&path, "greeting = 'hello'\nfunction greet(name) return greeting .. ', ' .. name end\nreturn true")
        .expect("write script");

    let runtime = common::runtime();
    let values = runtime.load_file(&path).expect("load_file");
    assert!(values.decode::<bool>(0).expect("flag"));
    let greeting = runtime.call("greet", &[&"lua"]).expect("greet");
    assert_eq!(greeting.decode::<String>(0).expect("text"), "hello, lua");
}

#[test]
fn load_file_errors_name_the_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.lua");
    fs::write(&path, "error('nope')").expect("write script");

    let runtime = common::runtime();
    match runtime.load_file(&path) {
        Err(Error::Script(message)) => assert!(message.contains("broken.lua"), "{message}"),
        other => panic!("expected script error, got {other:?}"),
    }
}

#[test]
fn missing_files_are_io_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.lua");
    let runtime = common::runtime();
    match runtime.load_file(&path) {
        Err(Error::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn runtimes_open_from_configuration_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("runtime.toml");
    fs::write(&path, "libs = [\"base\", \"string\"]\nqueue_capacity = 2\nchunk_name = \"=cfg\"\n")
        .expect("write config");

    let options = RuntimeOptions::load(&path).expect("load options");
    assert_eq!(options.libs, Libs::BASE | Libs::STRING);
    let runtime = LuaRuntime::open(options).expect("open");
    let values = runtime.load("return string.upper('x'), math").expect("load");
    assert_eq!(values.value(0).expect("upper"), &GuestValue::from("X"));
    assert!(values.value(1).expect("math").is_nil());
}

#[test]
fn global_reads_current_values() {
    let runtime = common::runtime();
    runtime.load("settings = { depth = 2, name = 'deep' }").expect("load");
    let settings = runtime.global("settings").expect("settings");
    let table = settings.as_table().expect("table");
    assert_eq!(table.get("depth"), Some(&GuestValue::Number(2.0)));
    assert!(runtime.global("nothing_here").expect("nil").is_nil());
    assert!(matches!(runtime.global("print"), Err(Error::Unreadable { kind: "function" })));
}
