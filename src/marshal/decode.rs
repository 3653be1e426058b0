//=============================================
// solvra_lua/marshal/decode.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Guest to host decoding
// Objective: Populate typed host destinations from read-back guest values
//=============================================

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::str::FromStr;

use super::descriptor::{Describe, Descriptor, KeyDomain, Shape, descriptor_of};
use crate::error::{Error, Result};
use crate::value::{GuestValue, Table};

//=============================================
// Section 1.0 - Destination contract
//=============================================

/// A host slot that can be populated from a guest value.
///
/// Each setter corresponds to one guest kind; the defaults reject the kind
/// with the matching error so implementors only override what they accept.
pub trait FromGuest {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn set_number(&mut self, _value: f64) -> Result<()> {
        Err(Error::mismatch("number", self.type_name()))
    }

    fn set_boolean(&mut self, _value: bool) -> Result<()> {
        Err(Error::mismatch("boolean", self.type_name()))
    }

    fn set_string(&mut self, _value: &str) -> Result<()> {
        Err(Error::mismatch("string", self.type_name()))
    }

    /// Textual deserialization hook. When it returns `Some`, the outcome
    /// replaces plain string assignment.
    fn set_text(&mut self, _value: &str) -> Option<Result<()>> {
        None
    }

    fn set_nil(&mut self) -> Result<()> {
        Err(Error::UnsupportedNilTarget {
            target: self.type_name(),
        })
    }

    fn set_table(&mut self, _table: &Table) -> Result<()> {
        Err(Error::UnsupportedTableTarget {
            target: self.type_name(),
        })
    }
}

/// Decode into an existing slot in place.
pub fn assign(slot: &mut dyn FromGuest, value: &GuestValue) -> Result<()> {
    value.unmarshal(slot)
}

/// Decode into a freshly defaulted `T`.
pub fn decode<T: FromGuest + Default>(value: &GuestValue) -> Result<T> {
    let mut slot = T::default();
    value.unmarshal(&mut slot)?;
    Ok(slot)
}

//=============================================
// Section 2.0 - Primitive destinations
//=============================================

macro_rules! numeric_destination {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromGuest for $ty {
                fn set_number(&mut self, value: f64) -> Result<()> {
                    *self = value as $ty;
                    Ok(())
                }
            }
        )*
    };
}

numeric_destination!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl FromGuest for bool {
    fn set_boolean(&mut self, value: bool) -> Result<()> {
        *self = value;
        Ok(())
    }
}

impl FromGuest for String {
    fn set_string(&mut self, value: &str) -> Result<()> {
        value.clone_into(self);
        Ok(())
    }
}

impl FromGuest for char {
    fn set_string(&mut self, value: &str) -> Result<()> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(single), None) => {
                *self = single;
                Ok(())
            }
            _ => Err(Error::InvalidText {
                target: "char",
                message: format!("expected exactly one character, got {value:?}"),
            }),
        }
    }
}

impl FromGuest for PathBuf {
    fn set_string(&mut self, value: &str) -> Result<()> {
        *self = PathBuf::from(value);
        Ok(())
    }
}

impl FromGuest for GuestValue {
    fn set_number(&mut self, value: f64) -> Result<()> {
        *self = GuestValue::Number(value);
        Ok(())
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        *self = GuestValue::Boolean(value);
        Ok(())
    }

    fn set_string(&mut self, value: &str) -> Result<()> {
        *self = GuestValue::from(value);
        Ok(())
    }

    fn set_nil(&mut self) -> Result<()> {
        *self = GuestValue::Nil;
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        *self = GuestValue::Table(table.clone());
        Ok(())
    }
}

//=============================================
// Section 3.0 - Nilable wrappers
//=============================================

fn fill_option<T, F>(slot: &mut Option<T>, fill: F) -> Result<()>
where
    T: FromGuest + Default,
    F: FnOnce(&mut T) -> Result<()>,
{
    match slot {
        Some(inner) => fill(inner),
        None => {
            let mut inner = T::default();
            fill(&mut inner)?;
            *slot = Some(inner);
            Ok(())
        }
    }
}

impl<T: FromGuest + Default> FromGuest for Option<T> {
    fn set_number(&mut self, value: f64) -> Result<()> {
        fill_option(self, |inner| inner.set_number(value))
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        fill_option(self, |inner| inner.set_boolean(value))
    }

    fn set_string(&mut self, value: &str) -> Result<()> {
        fill_option(self, |inner| inner.set_string(value))
    }

    fn set_text(&mut self, value: &str) -> Option<Result<()>> {
        match self {
            Some(inner) => inner.set_text(value),
            None => {
                let mut inner = T::default();
                let outcome = inner.set_text(value)?;
                if outcome.is_ok() {
                    *self = Some(inner);
                }
                Some(outcome)
            }
        }
    }

    fn set_nil(&mut self) -> Result<()> {
        *self = None;
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        fill_option(self, |inner| inner.set_table(table))
    }
}

impl<T: FromGuest + Default> FromGuest for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn set_number(&mut self, value: f64) -> Result<()> {
        (**self).set_number(value)
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        (**self).set_boolean(value)
    }

    fn set_string(&mut self, value: &str) -> Result<()> {
        (**self).set_string(value)
    }

    fn set_text(&mut self, value: &str) -> Option<Result<()>> {
        (**self).set_text(value)
    }

    fn set_nil(&mut self) -> Result<()> {
        **self = T::default();
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        (**self).set_table(table)
    }
}

//=============================================
// Section 4.0 - Sequence destinations
//=============================================

fn decode_run<T: FromGuest + Default>(table: &Table) -> Result<Vec<T>> {
    table
        .sequence()
        .into_iter()
        .map(|value| decode::<T>(value))
        .collect()
}

impl<T: FromGuest + Default> FromGuest for Vec<T> {
    fn set_nil(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        *self = decode_run(table)?;
        Ok(())
    }
}

impl<T: FromGuest + Default, const N: usize> FromGuest for [T; N] {
    fn set_table(&mut self, table: &Table) -> Result<()> {
        let needed = table.sequence().len();
        if needed > N {
            return Err(Error::Capacity {
                needed,
                capacity: N,
            });
        }
        for (slot, item) in self.iter_mut().zip(decode_run::<T>(table)?) {
            *slot = item;
        }
        Ok(())
    }
}

//=============================================
// Section 5.0 - Map destinations
//=============================================

fn decode_entries<K, V>(table: &Table) -> Result<Vec<(K, V)>>
where
    K: FromGuest + Describe + Default + 'static,
    V: FromGuest + Default,
{
    let descriptor = descriptor_of::<K>();
    let integral = matches!(descriptor.shape, Shape::Integer | Shape::Unsigned);
    let keyed: Vec<(GuestValue, &GuestValue)> = match descriptor.key_domain()? {
        KeyDomain::Number => table
            .numbers()
            .map(|(key, value)| {
                // Truncation would fold 1.5 onto 1.
                if integral && key.fract() != 0.0 {
                    return Err(Error::KeyType {
                        key: descriptor.name,
                        reason: format!("non-integral key {key} for an integer key type"),
                    });
                }
                Ok((GuestValue::Number(key), value))
            })
            .collect::<Result<_>>()?,
        KeyDomain::String => table
            .strings()
            .map(|(key, value)| (GuestValue::from(key), value))
            .collect(),
        KeyDomain::Boolean => table
            .booleans()
            .map(|(key, value)| (GuestValue::Boolean(key), value))
            .collect(),
    };
    keyed
        .into_iter()
        .map(|(key, value)| Ok((decode::<K>(&key)?, decode::<V>(value)?)))
        .collect()
}

impl<K, V, S> FromGuest for HashMap<K, V, S>
where
    K: FromGuest + Describe + Default + Eq + Hash + 'static,
    V: FromGuest + Default,
    S: BuildHasher,
{
    fn set_nil(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        self.extend(decode_entries::<K, V>(table)?);
        Ok(())
    }
}

impl<K, V> FromGuest for BTreeMap<K, V>
where
    K: FromGuest + Describe + Default + Ord + 'static,
    V: FromGuest + Default,
{
    fn set_nil(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        self.extend(decode_entries::<K, V>(table)?);
        Ok(())
    }
}

//=============================================
// Section 6.0 - Textual and variadic wrappers
//=============================================

/// Destination parsed from guest strings through [`FromStr`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Text<T>(pub T);

impl<T> Text<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Text<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Text<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Display> fmt::Display for Text<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> FromGuest for Text<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn set_text(&mut self, value: &str) -> Option<Result<()>> {
        Some(match value.parse::<T>() {
            Ok(parsed) => {
                self.0 = parsed;
                Ok(())
            }
            Err(err) => Err(Error::InvalidText {
                target: std::any::type_name::<T>(),
                message: err.to_string(),
            }),
        })
    }
}

impl<T: 'static> Describe for Text<T> {
    fn describe() -> Descriptor {
        Descriptor::new(std::any::type_name::<T>(), Shape::Text)
    }
}

/// Trailing parameter that collects every remaining argument of a bridged
/// call. Each assignment appends one decoded element.
#[derive(Debug, Clone, PartialEq)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Default for Variadic<T> {
    fn default() -> Self {
        Variadic(Vec::new())
    }
}

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Variadic<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> IntoIterator for Variadic<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: FromGuest + Default> Variadic<T> {
    fn push_with<F>(&mut self, fill: F) -> Result<()>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let mut element = T::default();
        fill(&mut element)?;
        self.0.push(element);
        Ok(())
    }
}

impl<T: FromGuest + Default> FromGuest for Variadic<T> {
    fn set_number(&mut self, value: f64) -> Result<()> {
        self.push_with(|element| element.set_number(value))
    }

    fn set_boolean(&mut self, value: bool) -> Result<()> {
        self.push_with(|element| element.set_boolean(value))
    }

    fn set_string(&mut self, value: &str) -> Result<()> {
        self.push_with(|element| element.set_string(value))
    }

    fn set_text(&mut self, value: &str) -> Option<Result<()>> {
        let mut element = T::default();
        let outcome = element.set_text(value)?;
        if outcome.is_ok() {
            self.0.push(element);
        }
        Some(outcome)
    }

    fn set_nil(&mut self) -> Result<()> {
        self.push_with(|element| element.set_nil())
    }

    fn set_table(&mut self, table: &Table) -> Result<()> {
        self.push_with(|element| element.set_table(table))
    }
}

impl<T: Describe + 'static> Describe for Variadic<T> {
    fn describe() -> Descriptor {
        Descriptor::new("Variadic", Shape::Variadic(descriptor_of::<T>()))
    }
}
