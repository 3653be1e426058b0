//=============================================
// solvra_lua/value/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Guest value model read back from the interpreter
// Objective: Closed tagged union plus the Unmarshal contract each variant honours
//=============================================

mod readback;
mod table;

use std::fmt;

use crate::error::Result;
use crate::marshal::FromGuest;

pub(crate) use readback::read_value;
pub use table::{Key, NumberKey, Table};

/// A value expressed in the embedded language's own value model.
///
/// Created fresh on every readback and never shared with the interpreter.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuestValue {
    Number(f64),
    Boolean(bool),
    /// Invalid UTF-8 in a guest string is replaced with U+FFFD on read back.
    String(String),
    #[default]
    Nil,
    Table(Table),
}

impl GuestValue {
    /// Guest type name as the embedded language spells it.
    pub fn kind(&self) -> &'static str {
        match self {
            GuestValue::Number(_) => "number",
            GuestValue::Boolean(_) => "boolean",
            GuestValue::String(_) => "string",
            GuestValue::Nil => "nil",
            GuestValue::Table(_) => "table",
        }
    }

    /// Populate a host destination from this value.
    pub fn unmarshal(&self, target: &mut dyn FromGuest) -> Result<()> {
        match self {
            GuestValue::Number(number) => target.set_number(*number),
            GuestValue::Boolean(flag) => target.set_boolean(*flag),
            GuestValue::String(text) => match target.set_text(text) {
                Some(outcome) => outcome,
                None => target.set_string(text),
            },
            GuestValue::Nil => target.set_nil(),
            GuestValue::Table(table) => table.unmarshal(target),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, GuestValue::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            GuestValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GuestValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GuestValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            GuestValue::Table(table) => Some(table),
            _ => None,
        }
    }
}

impl fmt::Display for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestValue::Number(number) => write!(f, "{}", format_number(*number)),
            GuestValue::Boolean(flag) => write!(f, "{flag}"),
            GuestValue::String(text) => f.write_str(text),
            GuestValue::Nil => f.write_str("nil"),
            GuestValue::Table(table) => write!(f, "{table}"),
        }
    }
}

/// Render numbers the way scripts see them: integral values without a fraction.
pub(crate) fn format_number(number: f64) -> String {
    if number.is_nan() {
        return "nan".to_string();
    }
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

impl From<f64> for GuestValue {
    fn from(value: f64) -> Self {
        GuestValue::Number(value)
    }
}

impl From<i64> for GuestValue {
    fn from(value: i64) -> Self {
        GuestValue::Number(value as f64)
    }
}

impl From<bool> for GuestValue {
    fn from(value: bool) -> Self {
        GuestValue::Boolean(value)
    }
}

impl From<&str> for GuestValue {
    fn from(value: &str) -> Self {
        GuestValue::String(value.to_string())
    }
}

impl From<String> for GuestValue {
    fn from(value: String) -> Self {
        GuestValue::String(value)
    }
}

impl From<Table> for GuestValue {
    fn from(value: Table) -> Self {
        GuestValue::Table(value)
    }
}
