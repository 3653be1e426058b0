//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: solvra-lua CLI entry point
// Objective: Run Lua scripts, call their functions with JSON arguments and
//            probe globals through the serialized runtime
//=====================================================

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use solvra_lua::{IntoGuest, Libs, LuaRuntime, ReturnValues, RuntimeOptions, logging};

const CONFIG_DIR: &str = "solvra_lua";
const CONFIG_FILE: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "solvra-lua", about = "Lua host bridge CLI", version)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GlobalArgs {
    /// Standard libraries to open, comma separated ("all", "none", "base,math", ...).
    #[arg(long, global = true)]
    pub libs: Option<String>,

    /// Per-call deadline in milliseconds.
    #[arg(long = "timeout-ms", global = true)]
    pub timeout_ms: Option<u64>,

    /// Runtime options file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print return values as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a script and print whatever it returns.
    Run(RunArgs),
    /// Load a script, then call one of its global functions.
    Call(CallArgs),
    /// Report whether a script defines a global function.
    Exists(ExistsArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Lua source file.
    pub script: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CallArgs {
    /// Lua source file defining the function.
    pub script: PathBuf,
    /// Global function to call.
    pub function: String,
    /// Arguments as JSON literals; anything else is passed as a string.
    pub args: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ExistsArgs {
    /// Lua source file to load first.
    pub script: PathBuf,
    /// Global name to probe.
    pub name: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let directive = match args.global.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    logging::init_with_default("solvra-lua", directive);
    match execute(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("solvra-lua error: {error:?}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: Args) -> Result<ExitCode> {
    let options = resolve_options(&args.global)?;
    let runtime = LuaRuntime::open(options).context("opening Lua runtime")?;
    match args.command {
        Command::Run(run) => {
            let values = load(&runtime, &run.script)?;
            print_values(&values, args.global.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call(call) => {
            load(&runtime, &call.script)?;
            let parsed: Vec<serde_json::Value> = call.args.iter().map(|arg| parse_arg(arg)).collect();
            let refs: Vec<&dyn IntoGuest> = parsed.iter().map(|arg| arg as &dyn IntoGuest).collect();
            let values = runtime
                .call(&call.function, &refs)
                .with_context(|| format!("calling {}", call.function))?;
            print_values(&values, args.global.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Exists(probe) => {
            load(&runtime, &probe.script)?;
            let exists = runtime
                .function_exists(&probe.name)
                .with_context(|| format!("probing {}", probe.name))?;
            println!("{exists}");
            Ok(if exists {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}

/// File values first, then command-line overrides.
fn resolve_options(global: &GlobalArgs) -> Result<RuntimeOptions> {
    let mut options = match &global.config {
        Some(path) => RuntimeOptions::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => match default_config_path() {
            Some(path) if path.exists() => RuntimeOptions::load(&path)
                .with_context(|| format!("reading configuration {}", path.display()))?,
            _ => RuntimeOptions::default(),
        },
    };
    if let Some(libs) = &global.libs {
        options.libs = libs
            .parse::<Libs>()
            .map_err(|err| anyhow!("--libs: {err}"))?;
    }
    if let Some(timeout_ms) = global.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }
    options.validate().context("validating runtime options")?;
    Ok(options)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn load(runtime: &LuaRuntime, script: &Path) -> Result<ReturnValues> {
    runtime
        .load_file(script)
        .with_context(|| format!("loading {}", script.display()))
}

fn parse_arg(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn print_values(values: &ReturnValues, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(values).context("serializing return values")?);
        return Ok(());
    }
    for slot in values.iter() {
        match slot {
            Ok(value) => println!("{value}"),
            Err(err) => println!("<{err}>"),
        }
    }
    Ok(())
}
