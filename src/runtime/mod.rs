//=============================================
// solvra_lua/runtime/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Serialized access to the embedded interpreter
// Objective: Own the interpreter on a dedicated worker and expose load, call,
//            library and output operations to any number of host threads
//=============================================

//=============================================
// Import & Modules
//=============================================

mod config;
mod gate;
mod returns;
mod worker;

use std::fs;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use mlua::{Lua, MultiValue, Value};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::bridge::{self, Library, Sink};
use crate::error::{Error, Result};
use crate::libs::Libs;
use crate::marshal::{Encoded, IntoGuest, Walk};
use crate::value::{GuestValue, read_value};

pub use config::{DEFAULT_QUEUE_CAPACITY, RuntimeOptions};
pub use gate::AccessState;
pub use returns::ReturnValues;

use gate::Gate;
use worker::{Job, Ticket};

//=============================================
// Section 1.0 - Runtime handle
//=============================================

/// Thread-safe handle to one embedded interpreter.
///
/// Every operation becomes a ticket executed by the interpreter's own
/// thread, so no two operations ever overlap. Without a timeout the
/// handle behaves as a bounded FIFO queue. With a timeout each call waits
/// at most that long; a call that overruns is abandoned rather than
/// cancelled, and the runtime rejects every request with `Timeout` until
/// the abandoned work drains.
pub struct LuaRuntime {
    sender: RwLock<Option<Sender<Ticket>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    gate: Arc<Gate>,
    options: RuntimeOptions,
    next_ticket: AtomicU64,
    worker_thread: ThreadId,
}

impl LuaRuntime {
    /// Open an interpreter with the given standard libraries and default options.
    pub fn new(libs: Libs) -> Result<Self> {
        Self::open(RuntimeOptions::default().with_libs(libs))
    }

    pub fn open(options: RuntimeOptions) -> Result<Self> {
        options.validate()?;
        let gate = Arc::new(Gate::new());
        let (sender, handle) = worker::spawn(&options, Arc::clone(&gate))?;
        debug!(libs = %options.libs, timeout_ms = ?options.timeout_ms, "runtime opened");
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            worker_thread: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
            gate,
            options,
            next_ticket: AtomicU64::new(1),
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn state(&self) -> AccessState {
        self.gate.state()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    //=============================================
    // Section 2.0 - Operations
    //=============================================

    /// Compile and run source text, returning its top-level results.
    pub fn load(&self, source: &str) -> Result<ReturnValues> {
        self.run_chunk(source.to_string(), self.options.chunk_name.clone())
    }

    /// Read a script from disk on the calling thread, then run it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ReturnValues> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        self.run_chunk(source, format!("@{}", path.display()))
    }

    fn run_chunk(&self, source: String, name: String) -> Result<ReturnValues> {
        self.submit("load", move |lua| {
            let values = lua.load(source.as_str()).set_name(name).call::<_, MultiValue>(())?;
            Ok(ReturnValues::read(values))
        })
    }

    /// Call the global function `name`. Arguments are encoded before the
    /// interpreter is touched, so an unsupported argument changes nothing.
    pub fn call(&self, name: &str, args: &[&dyn IntoGuest]) -> Result<ReturnValues> {
        let encoded = self.encode_all(args.iter().copied())?;
        let name = name.to_string();
        self.submit("call", move |lua| {
            let function = match lua.globals().get::<_, Value>(name.as_str())? {
                Value::Function(function) => function,
                other => {
                    return Err(Error::Script(format!(
                        "attempt to call a {} value (global '{name}')",
                        guest_kind(&other)
                    )));
                }
            };
            let mut values = Vec::with_capacity(encoded.len());
            for value in encoded {
                values.push(bridge::materialize(lua, value)?);
            }
            let results = function.call::<_, MultiValue>(MultiValue::from_vec(values))?;
            Ok(ReturnValues::read(results))
        })
    }

    /// Publish `members` as the global table `name`; all or nothing.
    pub fn define_library(&self, name: &str, members: &[(&str, &dyn IntoGuest)]) -> Result<()> {
        let library = members.iter().fold(
            Library::new(name).with_max_depth(self.options.max_depth),
            |library, (key, value)| library.member(*key, *value),
        );
        self.publish(library)
    }

    pub fn publish(&self, library: Library) -> Result<()> {
        let (name, members) = library.into_members()?;
        self.submit("define_library", move |lua| {
            bridge::install_library(lua, &name, members)?;
            Ok(())
        })
    }

    /// Send `print` output to `sink` instead of the process stdout.
    pub fn redirect_output<W>(&self, sink: W) -> Result<()>
    where
        W: Write + Send + 'static,
    {
        let sink: Sink = Arc::new(Mutex::new(Box::new(sink)));
        self.submit("redirect_output", move |lua| {
            bridge::install_print(lua, sink)?;
            Ok(())
        })
    }

    /// Whether the global `name` currently holds a function.
    pub fn function_exists(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.submit("function_exists", move |lua| {
            Ok(matches!(
                lua.globals().get::<_, Value>(name.as_str())?,
                Value::Function(_)
            ))
        })
    }

    /// Read back the current value of the global `name`.
    pub fn global(&self, name: &str) -> Result<GuestValue> {
        let name = name.to_string();
        self.submit("global", move |lua| {
            read_value(&lua.globals().get::<_, Value>(name.as_str())?)
        })
    }

    //=============================================
    // Section 3.0 - Teardown
    //=============================================

    /// Stop accepting work, let queued tickets finish and join the worker.
    /// Calling it again is a no-op.
    pub fn close(&self) {
        let sender = self.sender.write().take();
        let handle = self.worker.lock().take();
        drop(sender);
        if let Some(handle) = handle {
            // A bridged host function closing its own runtime cannot join itself.
            if self.on_worker_thread() {
                return;
            }
            let _ = handle.join();
            debug!("runtime closed");
        }
    }

    /// Stop accepting work without waiting for in-flight tickets.
    pub fn close_detached(&self) {
        drop(self.sender.write().take());
        if self.worker.lock().take().is_some() {
            debug!("runtime detached");
        }
    }

    //=============================================
    // Section 4.0 - Ticket dispatch
    //=============================================

    fn encode_all<'a, I>(&self, values: I) -> Result<Vec<Encoded>>
    where
        I: Iterator<Item = &'a dyn IntoGuest>,
    {
        values
            .map(|value| value.encode(&mut Walk::new(self.options.max_depth)))
            .collect()
    }

    fn on_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_thread
    }

    fn sender(&self) -> Result<Sender<Ticket>> {
        self.sender.read().clone().ok_or(Error::Closed)
    }

    fn submit<T, F>(&self, op: &'static str, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Lua) -> Result<T> + Send + 'static,
    {
        // The worker would wait on a ticket only it can serve.
        if self.on_worker_thread() {
            return Err(Error::Reentrant(op));
        }
        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = bounded::<Result<T>>(1);
        let job: Job = Box::new(move |lua| {
            let outcome = catch_unwind(AssertUnwindSafe(|| operation(lua)))
                .unwrap_or_else(|payload| Err(Error::HostPanic(bridge::panic_message(payload.as_ref()))));
            // The caller may have abandoned this ticket.
            let _ = reply_tx.send(outcome);
        });
        let ticket = Ticket { id, op, job };

        let Some(timeout) = self.options.call_timeout() else {
            self.sender()?.send(ticket).map_err(|_| Error::Closed)?;
            return reply_rx.recv().map_err(|_| Error::Closed)?;
        };

        let sender = self.sender()?;
        let deadline = Instant::now() + timeout;
        self.gate.admit(id, deadline, timeout)?;
        if sender.send(ticket).is_err() {
            self.gate.settle(id);
            return Err(Error::Closed);
        }
        drop(sender);

        match reply_rx.recv_deadline(deadline) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                match self.gate.abandon_unless(id, || reply_rx.try_recv().ok()) {
                    Some(outcome) => outcome,
                    None => {
                        warn!(ticket = id, op, ?timeout, "deadline exceeded; abandoning ticket");
                        Err(Error::Timeout(timeout))
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Closed),
        }
    }
}

/// Guest type name as scripts see it; integers are numbers.
fn guest_kind(value: &Value<'_>) -> &'static str {
    match value {
        Value::Integer(_) | Value::Number(_) => "number",
        other => other.type_name(),
    }
}

impl Drop for LuaRuntime {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("libs", &self.options.libs)
            .field("timeout_ms", &self.options.timeout_ms)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, TrySendError};
    use std::time::Duration;

    fn wait_until(limit: Duration, mut ready: impl FnMut() -> bool) {
        let started = Instant::now();
        while !ready() {
            assert!(started.elapsed() < limit, "condition not reached in {limit:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn queued(runtime: &LuaRuntime) -> usize {
        runtime.sender().map(|sender| sender.len()).unwrap_or(0)
    }

    /// Occupy the worker until `release` fires.
    fn hold_worker(runtime: &Arc<LuaRuntime>, release: Receiver<()>) -> JoinHandle<Result<()>> {
        let handle = {
            let runtime = Arc::clone(runtime);
            thread::spawn(move || {
                runtime.submit("hold", move |_| {
                    let _ = release.recv();
                    Ok(())
                })
            })
        };
        wait_until(Duration::from_secs(5), || runtime.state() == AccessState::Running);
        handle
    }

    #[test]
    fn operations_after_close_fail() {
        let runtime = LuaRuntime::new(Libs::ALL).expect("open");
        runtime.close();
        runtime.close();
        assert!(runtime.is_closed());
        assert!(matches!(runtime.load("return 1"), Err(Error::Closed)));
        assert!(matches!(runtime.function_exists("print"), Err(Error::Closed)));
    }

    #[test]
    fn script_errors_keep_their_text() {
        let runtime = LuaRuntime::new(Libs::ALL).expect("open");
        match runtime.load("error('kaboom')") {
            Err(Error::Script(message)) => assert!(message.contains("kaboom"), "{message}"),
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[test]
    fn calling_a_non_function_names_the_global() {
        let runtime = LuaRuntime::new(Libs::ALL).expect("open");
        runtime.load("answer = 42").expect("load");
        match runtime.call("answer", &[]) {
            Err(Error::Script(message)) => {
                assert_eq!(message, "attempt to call a number value (global 'answer')")
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[test]
    fn full_queue_pushes_back_on_submitters() {
        let runtime = Arc::new(
            LuaRuntime::open(RuntimeOptions::default().with_queue_capacity(1)).expect("open"),
        );
        let (release_tx, release_rx) = bounded::<()>(0);
        let busy = hold_worker(&runtime, release_rx);

        let waiting = {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || runtime.load("return 7").and_then(|values| values.decode::<i64>(0)))
        };
        wait_until(Duration::from_secs(5), || queued(&runtime) == 1);

        let blocked = {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || runtime.load("return 8").and_then(|values| values.decode::<i64>(0)))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished());
        {
            let sender = runtime.sender().expect("sender");
            let extra = Ticket {
                id: 0,
                op: "extra",
                job: Box::new(|_: &Lua| {}),
            };
            assert!(matches!(sender.try_send(extra), Err(TrySendError::Full(_))));
        }

        release_tx.send(()).expect("release worker");
        busy.join().expect("join").expect("hold");
        assert_eq!(waiting.join().expect("join").expect("waiting"), 7);
        assert_eq!(blocked.join().expect("join").expect("blocked"), 8);
    }

    #[test]
    fn queued_tickets_run_in_submission_order() {
        let runtime = Arc::new(LuaRuntime::new(Libs::ALL).expect("open"));
        runtime.load("order = {}").expect("load");
        let (release_tx, release_rx) = bounded::<()>(0);
        let busy = hold_worker(&runtime, release_rx);

        let tags = ["a", "b", "c", "d", "e"];
        let mut submitters = Vec::new();
        for (index, tag) in tags.iter().enumerate() {
            let runtime_ref = Arc::clone(&runtime);
            let source = format!("order[#order + 1] = '{tag}'");
            submitters.push(thread::spawn(move || runtime_ref.load(&source).map(|_| ())));
            wait_until(Duration::from_secs(5), || queued(&runtime) == index + 1);
        }

        release_tx.send(()).expect("release worker");
        busy.join().expect("join").expect("hold");
        for submitter in submitters {
            submitter.join().expect("join").expect("append");
        }
        let order: Vec<String> = crate::marshal::decode(&runtime.global("order").expect("order"))
            .expect("decode order");
        assert_eq!(order, tags);
    }

    #[test]
    fn invalid_options_are_rejected_before_start() {
        let options = RuntimeOptions::default().with_max_depth(0);
        assert!(matches!(LuaRuntime::open(options), Err(Error::Config(_))));
    }
}
