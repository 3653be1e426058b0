//=============================================
// demos/call_function.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Calling script functions with host values
// Objective: Show primitives, records and sequences crossing into Lua
//=============================================

use anyhow::{Context, Result};
use solvra_lua::{Libs, LuaRuntime, logging, record};

record! {
    #[derive(Debug, Default, Clone)]
    pub struct Data {
        pub a: i64 => "A",
        pub b: i64 => "B",
    }
}

fn main() -> Result<()> {
    logging::init("call_function");
    let runtime = LuaRuntime::new(Libs::ALL).context("opening runtime")?;
    runtime
        .load_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/call_function.lua"))
        .context("loading call_function.lua")?;

    for name in ["asdf", "noparams"] {
        let exists = runtime.function_exists(name)?;
        println!("function {name} exists: {exists}");
    }

    runtime.call("noparams", &[])?;
    let nothing: Option<i64> = None;
    runtime.call("basicTypes", &[&3, &4.2, &"hello", &false, &nothing])?;

    let data = Data { a: 3, b: 2 };
    runtime.call("struct", &[&data])?;
    runtime.call("slice", &[&vec![3, 2]])?;
    runtime.call("slice", &[&vec![data.clone()]])?;

    let returned = runtime.call("ret", &[])?;
    let mut count = 0_i64;
    let mut ratio = 0.0_f64;
    let mut greeting = String::new();
    let mut flag = true;
    returned.unmarshal(&mut [&mut count, &mut ratio, &mut greeting, &mut flag])?;
    println!("Return values: {count} {ratio} {greeting} {flag}");
    Ok(())
}
