//=============================================
// demos/library.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Publishing host functions as a Lua library
// Objective: Bridge typed closures, multiple returns, records and varargs
//=============================================

use anyhow::{Context, Result};
use solvra_lua::{Libs, Library, LuaRuntime, Variadic, logging, record};

record! {
    #[derive(Debug, Default)]
    pub struct Data {
        pub a: i64 => "A",
        pub b: i64 => "B",
    }
}

fn main() -> Result<()> {
    logging::init("library");
    let runtime = LuaRuntime::new(Libs::ALL).context("opening runtime")?;

    let testlib = Library::new("testlib")
        .function("Empty", || println!("Empty called"))
        .function("BasicParams", |a: i64, b: f64, c: String, d: bool| {
            println!("BasicParams called: {a} {b} {c} {d}");
        })
        .function("BasicRet", || {
            println!("BasicRet called");
            (3_i64, 4.2_f64, "hello".to_string(), false)
        })
        .function("StructParam", |data: Data| println!("StructParam called: {data:?}"))
        .function("Sum", |values: Variadic<i64>| values.iter().sum::<i64>());
    runtime.publish(testlib).context("publishing testlib")?;

    runtime
        .load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/library.lua"))
        .context("loading library.lua")?;
    Ok(())
}
