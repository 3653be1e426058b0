use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use mlua::{Function, Lua, MultiValue, Value};
use parking_lot::Mutex;

use crate::error::Error;
use crate::value::format_number;

pub(crate) type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Rebind the global `print` to write tab separated arguments to `sink`.
pub(crate) fn install_print(lua: &Lua, sink: Sink) -> mlua::Result<()> {
    let print = lua.create_function(move |lua, args: MultiValue| {
        let tostring = match lua.globals().raw_get::<_, Value>("tostring")? {
            Value::Function(function) => Some(function),
            _ => None,
        };
        let mut parts = Vec::new();
        for arg in args.into_vec() {
            parts.push(render(tostring.as_ref(), arg)?);
        }
        let mut line = parts.join("\t");
        line.push('\n');
        let mut sink = sink.lock();
        sink.write_all(line.as_bytes())
            .and_then(|_| sink.flush())
            .map_err(|err| {
                mlua::Error::external(Error::Io {
                    path: PathBuf::from("<print sink>"),
                    message: err.to_string(),
                })
            })
    })?;
    lua.globals().set("print", print)
}

fn render<'lua>(tostring: Option<&Function<'lua>>, value: Value<'lua>) -> mlua::Result<String> {
    if let Some(tostring) = tostring {
        return tostring.call::<_, String>(value);
    }
    Ok(match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(flag) => flag.to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Number(number) => format_number(number),
        Value::String(text) => text.to_string_lossy().into_owned(),
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    })
}
