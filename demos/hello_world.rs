//=============================================
// demos/hello_world.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Smallest end-to-end use of the runtime
// Objective: Load a script file and print what it returns
//=============================================

use anyhow::{Context, Result};
use solvra_lua::{Libs, LuaRuntime, logging};

fn main() -> Result<()> {
    logging::init("hello_world");
    let runtime = LuaRuntime::new(Libs::ALL).context("opening runtime")?;
    let script = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/hello_world.lua");
    let values = runtime.load_file(script).context("loading hello_world.lua")?;
    for value in values.iter() {
        match value {
            Ok(value) => println!("{value}"),
            Err(err) => println!("<{err}>"),
        }
    }
    Ok(())
}
