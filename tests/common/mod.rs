#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use solvra_lua::{Libs, LuaRuntime, RuntimeOptions};

/// Cloneable writer that keeps everything written to it.
#[derive(Clone, Default)]
pub struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn runtime() -> LuaRuntime {
    LuaRuntime::new(Libs::ALL).expect("open runtime")
}

pub fn runtime_with(options: RuntimeOptions) -> LuaRuntime {
    LuaRuntime::open(options).expect("open runtime")
}

/// Runtime whose `print` output lands in the returned capture.
pub fn captured_runtime() -> (LuaRuntime, Capture) {
    let runtime = runtime();
    let capture = Capture::default();
    runtime
        .redirect_output(capture.clone())
        .expect("redirect output");
    (runtime, capture)
}
