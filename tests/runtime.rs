// Serialized access, deadlines and teardown.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::Capture;
use solvra_lua::{AccessState, Error, GuestValue, Libs, Library, LuaRuntime, RuntimeOptions};

fn wait_for_idle(runtime: &LuaRuntime, limit: Duration) {
    let started = Instant::now();
    while runtime.state() != AccessState::Idle {
        assert!(started.elapsed() < limit, "runtime never drained");
        thread::sleep(Duration::from_millis(10));
    }
}

fn sleepy_runtime(timeout: Duration) -> LuaRuntime {
    sleepy_runtime_with(RuntimeOptions::default().with_timeout(timeout))
}

fn sleepy_runtime_with(options: RuntimeOptions) -> LuaRuntime {
    let runtime = common::runtime_with(options);
    runtime
        .publish(Library::new("host").function("sleep", |ms: u64| thread::sleep(Duration::from_millis(ms))))
        .expect("publish host");
    runtime
        .load(
            r#"
            counter = 0
            function slow(ms) host.sleep(ms); counter = counter + 1 end
            function read_counter() return counter end
            "#,
        )
        .expect("load");
    runtime
}

#[test]
fn overrunning_call_times_out_and_drains() {
    let timeout = Duration::from_millis(100);
    let runtime = sleepy_runtime(timeout);

    let started = Instant::now();
    assert!(matches!(runtime.call("slow", &[&400]), Err(Error::Timeout(t)) if t == timeout));
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout, "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(350), "returned late: {elapsed:?}");
    assert_eq!(runtime.state(), AccessState::TimedOut);

    let started = Instant::now();
    assert!(matches!(runtime.call("read_counter", &[]), Err(Error::Timeout(_))));
    assert!(started.elapsed() < Duration::from_millis(50), "rejection was not immediate");

    wait_for_idle(&runtime, Duration::from_secs(5));
    let values = runtime.call("read_counter", &[]).expect("after drain");
    assert_eq!(values.decode::<i64>(0).expect("counter"), 1);
}

#[test]
fn calls_within_the_deadline_succeed() {
    let runtime = sleepy_runtime(Duration::from_millis(500));
    runtime.call("slow", &[&10]).expect("quick call");
    assert_eq!(runtime.state(), AccessState::Idle);
    assert_eq!(runtime.global("counter").expect("counter"), GuestValue::Number(1.0));
}

#[test]
fn waiting_callers_share_the_deadline() {
    let timeout = Duration::from_millis(300);
    let runtime = Arc::new(sleepy_runtime(timeout));

    let busy = {
        let runtime = Arc::clone(&runtime);
        thread::spawn(move || runtime.call("slow", &[&100]))
    };
    thread::sleep(Duration::from_millis(20));
    // Queued behind the first call; both finish inside their own deadlines.
    let second = runtime.call("slow", &[&10]);
    busy.join().expect("join").expect("first call");
    second.expect("second call");
    assert_eq!(runtime.global("counter").expect("counter"), GuestValue::Number(2.0));
}

#[test]
fn concurrent_callers_are_serialized() {
    let runtime = Arc::new(common::runtime());
    runtime
        .load("total = 0\nfunction bump(n) local seen = total; total = seen + n; return total end")
        .expect("load");

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                for _ in 0..25 {
                    runtime.call("bump", &[&1]).expect("bump");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("join");
    }
    assert_eq!(runtime.global("total").expect("total"), GuestValue::Number(200.0));
}

#[test]
fn function_exists_has_no_side_effects() {
    let (runtime, capture) = common::captured_runtime();
    runtime
        .load("calls = 0\nfunction greet() calls = calls + 1; print('hi', calls) end\nvalue = 3")
        .expect("load");

    for _ in 0..3 {
        assert!(runtime.function_exists("greet").expect("greet"));
        assert!(!runtime.function_exists("value").expect("value"));
        assert!(!runtime.function_exists("missing").expect("missing"));
    }
    assert_eq!(capture.contents(), "");
    assert_eq!(runtime.global("calls").expect("calls"), GuestValue::Number(0.0));

    runtime.call("greet", &[]).expect("greet");
    assert_eq!(capture.contents(), "hi\t1\n");
}

#[test]
fn print_output_follows_the_latest_redirect() {
    let runtime = common::runtime();
    let first = Capture::default();
    let second = Capture::default();
    runtime.redirect_output(first.clone()).expect("first redirect");
    runtime.load("print('one', 1, nil, true)").expect("print one");
    runtime.redirect_output(second.clone()).expect("second redirect");
    runtime.load("print('two')").expect("print two");
    assert_eq!(first.contents(), "one\t1\tnil\ttrue\n");
    assert_eq!(second.contents(), "two\n");
}

#[test]
fn missing_libraries_are_absent() {
    let runtime = LuaRuntime::new(Libs::MATH).expect("open");
    let values = runtime
        .load("return print == nil, string == nil, math.floor(2.5)")
        .expect("load");
    assert!(values.decode::<bool>(0).expect("print"));
    assert!(values.decode::<bool>(1).expect("string"));
    assert_eq!(values.decode::<i64>(2).expect("floor"), 2);
}

#[test]
fn redirect_installs_print_without_base() {
    let runtime = LuaRuntime::new(Libs::NONE).expect("open");
    let capture = Capture::default();
    runtime.redirect_output(capture.clone()).expect("redirect");
    runtime.load("print(1.5, 'x')").expect("print");
    assert_eq!(capture.contents(), "1.5\tx\n");
}

#[test]
fn close_is_idempotent_and_final() {
    let runtime = common::runtime();
    runtime.load("x = 1").expect("load");
    runtime.close();
    runtime.close();
    assert!(runtime.is_closed());
    assert!(matches!(runtime.call("anything", &[]), Err(Error::Closed)));
    assert!(matches!(runtime.redirect_output(Capture::default()), Err(Error::Closed)));
    assert!(matches!(
        runtime.publish(Library::new("late").function("f", || 1_i64)),
        Err(Error::Closed)
    ));
}

#[test]
fn queued_work_finishes_before_close_returns() {
    let runtime = Arc::new(common::runtime());
    let capture = Capture::default();
    runtime.redirect_output(capture.clone()).expect("redirect");
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || runtime.load(&format!("print({i})")).map(|_| ()))
        })
        .collect();
    for writer in writers {
        writer.join().expect("join").expect("print");
    }
    runtime.close();
    assert_eq!(capture.contents().lines().count(), 4);
}

#[test]
fn close_detached_returns_while_work_is_running() {
    let runtime = Arc::new(sleepy_runtime_with(RuntimeOptions::default()));
    let slow = {
        let runtime = Arc::clone(&runtime);
        thread::spawn(move || runtime.call("slow", &[&300]))
    };
    let started = Instant::now();
    while runtime.state() != AccessState::Running {
        assert!(started.elapsed() < Duration::from_secs(5), "slow call never started");
        thread::sleep(Duration::from_millis(5));
    }

    let started = Instant::now();
    runtime.close_detached();
    assert!(started.elapsed() < Duration::from_millis(100), "close_detached waited for the worker");
    assert!(runtime.is_closed());
    assert!(matches!(runtime.call("read_counter", &[]), Err(Error::Closed)));
    assert!(matches!(runtime.function_exists("slow"), Err(Error::Closed)));

    // The ticket already running still reports back to its caller.
    slow.join().expect("join").expect("in-flight call");
}
