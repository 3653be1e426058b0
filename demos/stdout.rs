//=============================================
// demos/stdout.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Redirecting script output
// Objective: Route print() through a host writer with a prefix
//=============================================

use std::io::{self, Write};

use anyhow::{Context, Result};
use solvra_lua::{Libs, LuaRuntime, logging};

struct Prefixed(&'static str);

impl Write for Prefixed {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(self.0.as_bytes())?;
        stdout.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

fn main() -> Result<()> {
    logging::init("stdout");
    let runtime = LuaRuntime::new(Libs::ALL).context("opening runtime")?;
    runtime
        .load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/stdout.lua"))
        .context("loading stdout.lua")?;
    runtime.redirect_output(Prefixed("test: "))?;
    runtime.call("hello", &[])?;
    Ok(())
}
