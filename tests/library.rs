// Publishing host namespaces as global tables.

mod common;

use std::collections::HashMap;

use solvra_lua::{Error, GuestValue, HostFunction, Library};

#[test]
fn define_library_publishes_mixed_members() {
    let runtime = common::runtime();
    let greet = HostFunction::wrap(|name: String| format!("hello {name}"));
    let limits = vec![1, 2, 3];
    runtime
        .define_library(
            "app",
            &[
                ("version", &"1.2.0"),
                ("answer", &42),
                ("limits", &limits),
                ("greet", &greet),
            ],
        )
        .expect("define library");

    let values = runtime
        .load("return app.version, app.answer, #app.limits, app.greet('lua')")
        .expect("use library");
    assert_eq!(values.decode::<String>(0).expect("version"), "1.2.0");
    assert_eq!(values.decode::<i64>(1).expect("answer"), 42);
    assert_eq!(values.decode::<i64>(2).expect("limits"), 3);
    assert_eq!(values.decode::<String>(3).expect("greet"), "hello lua");
}

#[test]
fn failed_members_publish_nothing() {
    let runtime = common::runtime();
    let mut bad: HashMap<Vec<u8>, i32> = HashMap::new();
    bad.insert(vec![1], 1);
    let library = Library::new("broken")
        .function("fine", || 1_i64)
        .member("bad", &bad);
    assert!(matches!(runtime.publish(library), Err(Error::KeyType { .. })));
    assert!(runtime.global("broken").expect("global").is_nil());
}

#[test]
fn republishing_replaces_the_table() {
    let runtime = common::runtime();
    runtime
        .publish(Library::new("lib").member("value", &1).function("old", || 0_i64))
        .expect("first publish");
    runtime
        .publish(Library::new("lib").member("value", &2))
        .expect("second publish");
    let values = runtime.load("return lib.value, lib.old").expect("read");
    assert_eq!(values.decode::<i64>(0).expect("value"), 2);
    assert!(values.value(1).expect("old").is_nil());
}

#[test]
fn libraries_are_visible_to_function_exists_only_through_globals() {
    let runtime = common::runtime();
    runtime
        .publish(Library::new("tools").function("ping", || "pong"))
        .expect("publish");
    assert!(!runtime.function_exists("tools").expect("table is not a function"));
    assert!(!runtime.function_exists("ping").expect("member is not global"));
    assert_eq!(
        runtime.load("return tools.ping()").expect("ping").value(0).expect("pong"),
        &GuestValue::from("pong")
    );
}
