use mlua::Lua;

use super::{HostFunction, IntoHostFunction, materialize};
use crate::error::{Error, Result};
use crate::marshal::{Encoded, IntoGuest, Walk};

/// A named namespace of host values published as one global table.
///
/// Members are encoded as they are added; the first failure is kept and
/// reported on publish, so a broken member never yields a partial table.
#[derive(Debug)]
pub struct Library {
    name: String,
    members: Vec<(String, Encoded)>,
    failure: Option<Error>,
    max_depth: usize,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            failure: None,
            max_depth: Walk::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add any encodable host value under `name`.
    pub fn member(mut self, name: impl Into<String>, value: &dyn IntoGuest) -> Self {
        if self.failure.is_none() {
            match value.encode(&mut Walk::new(self.max_depth)) {
                Ok(encoded) => self.members.push((name.into(), encoded)),
                Err(err) => self.failure = Some(err),
            }
        }
        self
    }

    /// Add a host closure under `name`.
    pub fn function<F, Marker>(self, name: impl Into<String>, function: F) -> Self
    where
        F: IntoHostFunction<Marker>,
    {
        let function = HostFunction::wrap(function);
        self.member(name, &function)
    }

    pub(crate) fn into_members(self) -> Result<(String, Vec<(String, Encoded)>)> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok((self.name, self.members)),
        }
    }
}

/// Build the namespace table and bind it globally as the final step.
pub(crate) fn install(lua: &Lua, name: &str, members: Vec<(String, Encoded)>) -> mlua::Result<()> {
    let table = lua.create_table()?;
    for (key, value) in members {
        table.raw_set(key, materialize(lua, value)?)?;
    }
    lua.globals().set(name, table)
}
