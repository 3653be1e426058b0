use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use mlua::{Lua, LuaOptions, Value};
use tracing::{debug, debug_span};

use super::config::RuntimeOptions;
use super::gate::Gate;
use crate::bridge::EncodeLimit;
use crate::error::{Error, Result};
use crate::libs::Libs;

pub(crate) type Job = Box<dyn FnOnce(&Lua) + Send + 'static>;

/// One unit of serialized work. The job owns its reply channel.
pub(crate) struct Ticket {
    pub(crate) id: u64,
    pub(crate) op: &'static str,
    pub(crate) job: Job,
}

/// Start the interpreter thread and wait for it to report start-up.
pub(crate) fn spawn(options: &RuntimeOptions, gate: Arc<Gate>) -> Result<(Sender<Ticket>, JoinHandle<()>)> {
    let (sender, receiver) = bounded::<Ticket>(options.queue_capacity);
    let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
    let libs = options.libs;
    let max_depth = options.max_depth;

    let handle = thread::Builder::new()
        .name("solvra-lua".to_string())
        .spawn(move || {
            let lua = match create_interpreter(libs, max_depth) {
                Ok(lua) => {
                    let _ = ready_tx.send(Ok(()));
                    lua
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            debug!(%libs, "interpreter started");
            serve(&lua, &receiver, &gate);
            debug!("interpreter stopped");
        })
        .map_err(|err| Error::Startup(err.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((sender, handle)),
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(err)
        }
        Err(_) => {
            let _ = handle.join();
            Err(Error::Startup("interpreter thread exited during start-up".into()))
        }
    }
}

fn create_interpreter(libs: Libs, max_depth: usize) -> Result<Lua> {
    let lua = Lua::new_with(libs.std_lib(), LuaOptions::default())
        .map_err(|err| Error::Startup(err.to_string()))?;
    if !libs.contains(Libs::BASE) {
        strip_base(&lua, &libs.retained_globals()).map_err(|err| Error::Startup(err.to_string()))?;
    }
    lua.set_app_data(EncodeLimit(max_depth));
    Ok(lua)
}

/// The interpreter always opens its base library; drop every global that
/// does not belong to a requested library.
fn strip_base(lua: &Lua, retained: &[&str]) -> mlua::Result<()> {
    let globals = lua.globals();
    let mut doomed = Vec::new();
    for pair in globals.clone().pairs::<Value, Value>() {
        let (key, _) = pair?;
        if let Value::String(name) = &key {
            let name = name.to_str()?;
            if !retained.contains(&name) {
                doomed.push(name.to_string());
            }
        }
    }
    for name in doomed {
        globals.raw_set(name, Value::Nil)?;
    }
    Ok(())
}

fn serve(lua: &Lua, queue: &Receiver<Ticket>, gate: &Gate) {
    for ticket in queue.iter() {
        let span = debug_span!("ticket", id = ticket.id, op = ticket.op);
        let _entered = span.enter();
        gate.enter(ticket.id);
        debug!("ticket admitted");
        (ticket.job)(lua);
        gate.settle(ticket.id);
        debug!("ticket completed");
    }
}
