//=============================================
// solvra_lua/marshal/encode.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host to guest encoding
// Objective: Build an interpreter-independent value tree under a recursion guard
//=============================================

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use super::decode::Text;
use super::descriptor::{Describe, descriptor_of};
use crate::bridge::HostFunction;
use crate::error::{Error, Result};
use crate::value::{GuestValue, Key, Table};

//=============================================
// Section 1.0 - Encoded tree
//=============================================

/// Primitive key of an outbound table entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedKey {
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
}

/// Outbound guest value, materialized into the interpreter by the worker.
#[derive(Debug, Clone)]
pub enum Encoded {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Table(Vec<(EncodedKey, Encoded)>),
    Function(HostFunction),
}

impl Encoded {
    pub fn kind(&self) -> &'static str {
        match self {
            Encoded::Nil => "nil",
            Encoded::Boolean(_) => "boolean",
            Encoded::Integer(_) | Encoded::Number(_) => "number",
            Encoded::String(_) => "string",
            Encoded::Table(_) => "table",
            Encoded::Function(_) => "function",
        }
    }

    fn into_key(self, key_type: &'static str) -> Result<EncodedKey> {
        match self {
            Encoded::Integer(number) => Ok(EncodedKey::Integer(number)),
            Encoded::Number(number) if !number.is_nan() => Ok(EncodedKey::Number(number)),
            Encoded::String(text) => Ok(EncodedKey::String(text)),
            Encoded::Boolean(flag) => Ok(EncodedKey::Boolean(flag)),
            other => Err(Error::KeyType {
                key: key_type,
                reason: format!("{} values cannot be table keys", other.kind()),
            }),
        }
    }
}

//=============================================
// Section 2.0 - Recursion guard
//=============================================

/// Recursion guard threaded through one encode pass.
#[derive(Debug, Clone)]
pub struct Walk {
    depth: usize,
    max_depth: usize,
    derefs: usize,
}

impl Walk {
    pub const DEFAULT_MAX_DEPTH: usize = 64;
    pub const MAX_DEREFS: usize = 1;

    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            derefs: 0,
        }
    }

    /// Enter a container level. Pointer chains restart inside containers.
    pub fn nested<F>(&mut self, type_name: &'static str, encode: F) -> Result<Encoded>
    where
        F: FnOnce(&mut Walk) -> Result<Encoded>,
    {
        if self.depth >= self.max_depth {
            return Err(Error::unsupported(
                type_name,
                format!(
                    "nesting deeper than {} levels (cyclic or unbounded structure)",
                    self.max_depth
                ),
            ));
        }
        let saved = self.derefs;
        self.depth += 1;
        self.derefs = 0;
        let outcome = encode(self);
        self.depth -= 1;
        self.derefs = saved;
        outcome
    }

    /// Follow one pointer.
    pub fn deref<F>(&mut self, type_name: &'static str, encode: F) -> Result<Encoded>
    where
        F: FnOnce(&mut Walk) -> Result<Encoded>,
    {
        if self.derefs >= Self::MAX_DEREFS {
            return Err(Error::unsupported(
                type_name,
                "only a single level of pointer indirection is supported",
            ));
        }
        self.derefs += 1;
        let outcome = encode(self);
        self.derefs -= 1;
        outcome
    }
}

impl Default for Walk {
    fn default() -> Self {
        Walk::new(Self::DEFAULT_MAX_DEPTH)
    }
}

/// Host values that can be handed to the interpreter.
pub trait IntoGuest {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded>;
}

/// Encode with a fresh default guard.
pub fn encode(value: &dyn IntoGuest) -> Result<Encoded> {
    value.encode(&mut Walk::default())
}

//=============================================
// Section 3.0 - Primitives
//=============================================

macro_rules! encode_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoGuest for $ty {
                fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
                    Ok(Encoded::Integer(i64::from(*self)))
                }
            }
        )*
    };
}

encode_integer!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! encode_wide_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoGuest for $ty {
                fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
                    Ok(match i64::try_from(*self) {
                        Ok(narrow) => Encoded::Integer(narrow),
                        Err(_) => Encoded::Number(*self as f64),
                    })
                }
            }
        )*
    };
}

encode_wide_integer!(i128, isize, u64, u128, usize);

impl IntoGuest for f32 {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::Number(f64::from(*self)))
    }
}

impl IntoGuest for f64 {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::Number(*self))
    }
}

impl IntoGuest for bool {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::Boolean(*self))
    }
}

impl IntoGuest for str {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::String(self.to_string()))
    }
}

impl IntoGuest for String {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::String(self.clone()))
    }
}

impl IntoGuest for char {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::String(self.to_string()))
    }
}

impl IntoGuest for Path {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::String(self.to_string_lossy().into_owned()))
    }
}

impl IntoGuest for PathBuf {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        self.as_path().encode(walk)
    }
}

impl<T: fmt::Display> IntoGuest for Text<T> {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(Encoded::String(self.0.to_string()))
    }
}

//=============================================
// Section 4.0 - Pointers and optionals
//=============================================

impl<T: IntoGuest + ?Sized> IntoGuest for &T {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        (**self).encode(walk)
    }
}

impl<T: IntoGuest> IntoGuest for Option<T> {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        match self {
            Some(inner) => inner.encode(walk),
            None => Ok(Encoded::Nil),
        }
    }
}

macro_rules! encode_pointer {
    ($($ptr:ident),*) => {
        $(
            impl<T: IntoGuest + ?Sized> IntoGuest for $ptr<T> {
                fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
                    walk.deref(stringify!($ptr), |walk| (**self).encode(walk))
                }
            }
        )*
    };
}

encode_pointer!(Box, Rc, Arc);

//=============================================
// Section 5.0 - Sequences and maps
//=============================================

fn encode_sequence<'a, T, I>(walk: &mut Walk, type_name: &'static str, items: I) -> Result<Encoded>
where
    T: IntoGuest + 'a,
    I: IntoIterator<Item = &'a T>,
{
    walk.nested(type_name, |walk| {
        let mut entries = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            entries.push((EncodedKey::Integer(index as i64 + 1), item.encode(walk)?));
        }
        Ok(Encoded::Table(entries))
    })
}

impl<T: IntoGuest> IntoGuest for [T] {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        encode_sequence(walk, "slice", self.iter())
    }
}

impl<T: IntoGuest, const N: usize> IntoGuest for [T; N] {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        encode_sequence(walk, "array", self.iter())
    }
}

impl<T: IntoGuest> IntoGuest for Vec<T> {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        encode_sequence(walk, "Vec", self.iter())
    }
}

fn encode_map<'a, K, V, I>(walk: &mut Walk, type_name: &'static str, entries: I) -> Result<Encoded>
where
    K: IntoGuest + Describe + 'static,
    V: IntoGuest + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let key_type = descriptor_of::<K>();
    key_type.key_domain()?;
    walk.nested(type_name, |walk| {
        let mut encoded = Vec::new();
        for (key, value) in entries {
            let key = key.encode(walk)?.into_key(key_type.name)?;
            encoded.push((key, value.encode(walk)?));
        }
        Ok(Encoded::Table(encoded))
    })
}

impl<K, V, S> IntoGuest for HashMap<K, V, S>
where
    K: IntoGuest + Describe + 'static,
    V: IntoGuest,
{
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        encode_map(walk, "HashMap", self.iter())
    }
}

impl<K, V> IntoGuest for BTreeMap<K, V>
where
    K: IntoGuest + Describe + 'static,
    V: IntoGuest,
{
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        encode_map(walk, "BTreeMap", self.iter())
    }
}

//=============================================
// Section 6.0 - Guest values and functions
//=============================================

impl IntoGuest for GuestValue {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        match self {
            GuestValue::Number(number) => Ok(Encoded::Number(*number)),
            GuestValue::Boolean(flag) => Ok(Encoded::Boolean(*flag)),
            GuestValue::String(text) => Ok(Encoded::String(text.clone())),
            GuestValue::Nil => Ok(Encoded::Nil),
            GuestValue::Table(table) => table.encode(walk),
        }
    }
}

impl IntoGuest for Table {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        walk.nested("Table", |walk| {
            let mut entries = Vec::with_capacity(self.len());
            for (key, value) in self.numbers() {
                entries.push((EncodedKey::Number(key), value.encode(walk)?));
            }
            for (key, value) in self.strings() {
                entries.push((EncodedKey::String(key.to_string()), value.encode(walk)?));
            }
            for (key, value) in self.booleans() {
                entries.push((EncodedKey::Boolean(key), value.encode(walk)?));
            }
            Ok(Encoded::Table(entries))
        })
    }
}

impl IntoGuest for Key {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        Ok(match self {
            Key::Number(number) => Encoded::Number(*number),
            Key::String(text) => Encoded::String(text.clone()),
            Key::Boolean(flag) => Encoded::Boolean(*flag),
        })
    }
}

impl IntoGuest for HostFunction {
    fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
        self.validate()?;
        Ok(Encoded::Function(self.clone()))
    }
}

//=============================================
// Section 7.0 - Refused host kinds
//=============================================

macro_rules! refuse {
    ($reason:literal => $($ty:ty),* $(,)?) => {
        $(
            impl<T> IntoGuest for $ty {
                fn encode(&self, _walk: &mut Walk) -> Result<Encoded> {
                    Err(Error::unsupported(std::any::type_name::<Self>(), $reason))
                }
            }
        )*
    };
}

refuse!("raw pointers cannot cross into the interpreter" => *const T, *mut T);
refuse!(
    "channels have no guest representation" =>
    std::sync::mpsc::Sender<T>,
    std::sync::mpsc::Receiver<T>,
    crossbeam_channel::Sender<T>,
    crossbeam_channel::Receiver<T>,
);
