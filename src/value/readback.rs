use std::collections::HashSet;
use std::ffi::c_void;

use mlua::Value;
use tracing::trace;

use super::{GuestValue, Key, Table};
use crate::error::{Error, Result};

/// Deepest table nesting copied back into the host.
pub(crate) const MAX_READ_DEPTH: usize = 64;

/// Copy an interpreter value into a fresh [`GuestValue`].
///
/// Functions, userdata and threads have no host counterpart and are
/// reported as unreadable; inside tables such entries are skipped.
pub(crate) fn read_value(value: &Value<'_>) -> Result<GuestValue> {
    let mut path = HashSet::new();
    read_inner(value, &mut path, 0)
}

/// Guest strings are byte strings; invalid UTF-8 becomes U+FFFD.
fn read_text(text: &mlua::String<'_>) -> String {
    match text.to_str() {
        Ok(valid) => valid.to_owned(),
        Err(_) => {
            trace!(bytes = text.as_bytes().len(), "replacing invalid UTF-8 in guest string");
            text.to_string_lossy().into_owned()
        }
    }
}

fn read_inner(
    value: &Value<'_>,
    path: &mut HashSet<*const c_void>,
    depth: usize,
) -> Result<GuestValue> {
    match value {
        Value::Nil => Ok(GuestValue::Nil),
        Value::Boolean(flag) => Ok(GuestValue::Boolean(*flag)),
        Value::Integer(number) => Ok(GuestValue::Number(*number as f64)),
        Value::Number(number) => Ok(GuestValue::Number(*number)),
        Value::String(text) => Ok(GuestValue::String(read_text(text))),
        Value::Table(table) => {
            if depth >= MAX_READ_DEPTH {
                return Err(Error::Unreadable { kind: "table" });
            }
            let pointer = table.to_pointer();
            if !path.insert(pointer) {
                return Err(Error::Unreadable { kind: "table" });
            }
            let mut copy = Table::new();
            for pair in table.clone().pairs::<Value, Value>() {
                let (key, entry) = pair?;
                let Some(key) = read_key(&key) else {
                    trace!(key = key.type_name(), "skipping non-primitive table key");
                    continue;
                };
                if !is_copyable(&entry) {
                    trace!(kind = entry.type_name(), "skipping opaque table entry");
                    continue;
                }
                copy.insert(key, read_inner(&entry, path, depth + 1)?);
            }
            path.remove(&pointer);
            Ok(GuestValue::Table(copy))
        }
        other => Err(Error::Unreadable {
            kind: other.type_name(),
        }),
    }
}

fn read_key(key: &Value<'_>) -> Option<Key> {
    match key {
        Value::Integer(number) => Some(Key::Number(*number as f64)),
        Value::Number(number) => Some(Key::Number(*number)),
        Value::String(text) => Some(Key::String(read_text(text))),
        Value::Boolean(flag) => Some(Key::Boolean(*flag)),
        _ => None,
    }
}

fn is_copyable(value: &Value<'_>) -> bool {
    matches!(
        value,
        Value::Nil
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Table(_)
    )
}
