use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{GuestValue, format_number};
use crate::error::Result;
use crate::marshal::FromGuest;

/// Numeric table key with a total order so it can index an ordered map.
#[derive(Clone, Copy, Debug)]
pub struct NumberKey(f64);

impl NumberKey {
    pub fn new(value: f64) -> Self {
        // Lua never distinguishes -0.0 from 0.0 as keys.
        if value == 0.0 {
            NumberKey(0.0)
        } else {
            NumberKey(value)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumberKey {}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for NumberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Key of a read-back table entry. Each key domain lands in its own mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Key {
    pub(crate) fn into_value(self) -> GuestValue {
        match self {
            Key::Number(number) => GuestValue::Number(number),
            Key::String(text) => GuestValue::String(text),
            Key::Boolean(flag) => GuestValue::Boolean(flag),
        }
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::Number(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(value.to_string())
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Boolean(value)
    }
}

/// Guest table split into three disjoint key domains.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    numbers: BTreeMap<NumberKey, GuestValue>,
    strings: BTreeMap<String, GuestValue>,
    booleans: BTreeMap<bool, GuestValue>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table whose contiguous 1-based run holds `items`.
    pub fn from_sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = GuestValue>,
    {
        let mut table = Table::new();
        for (index, item) in items.into_iter().enumerate() {
            table.insert(Key::Number((index + 1) as f64), item);
        }
        table
    }

    pub fn insert(&mut self, key: Key, value: GuestValue) -> Option<GuestValue> {
        match key {
            Key::Number(number) => self.numbers.insert(NumberKey::new(number), value),
            Key::String(text) => self.strings.insert(text, value),
            Key::Boolean(flag) => self.booleans.insert(flag, value),
        }
    }

    pub fn get(&self, key: &str) -> Option<&GuestValue> {
        self.strings.get(key)
    }

    pub fn get_index(&self, index: f64) -> Option<&GuestValue> {
        self.numbers.get(&NumberKey::new(index))
    }

    pub fn get_bool(&self, key: bool) -> Option<&GuestValue> {
        self.booleans.get(&key)
    }

    /// Values at keys `1, 2, 3, …` up to the first gap.
    pub fn sequence(&self) -> Vec<&GuestValue> {
        let mut run = Vec::new();
        let mut index = 1.0;
        while let Some(value) = self.numbers.get(&NumberKey::new(index)) {
            run.push(value);
            index += 1.0;
        }
        run
    }

    pub fn numbers(&self) -> impl Iterator<Item = (f64, &GuestValue)> + '_ {
        self.numbers.iter().map(|(key, value)| (key.get(), value))
    }

    pub fn strings(&self) -> impl Iterator<Item = (&str, &GuestValue)> + '_ {
        self.strings.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn booleans(&self) -> impl Iterator<Item = (bool, &GuestValue)> + '_ {
        self.booleans.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.numbers.len() + self.strings.len() + self.booleans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every entry belongs to the contiguous 1-based run.
    pub fn is_sequence(&self) -> bool {
        self.strings.is_empty()
            && self.booleans.is_empty()
            && self.sequence().len() == self.numbers.len()
    }

    pub fn unmarshal(&self, target: &mut dyn FromGuest) -> Result<()> {
        target.set_table(self)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries = Vec::with_capacity(self.len());
        for (key, value) in self.numbers() {
            entries.push(format!("[{}]={value}", format_number(key)));
        }
        for (key, value) in self.strings() {
            entries.push(format!("{key}={value}"));
        }
        for (key, value) in self.booleans() {
            entries.push(format!("[{key}]={value}"));
        }
        write!(f, "{{{}}}", entries.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_domains_stay_disjoint() {
        let mut table = Table::new();
        table.insert(Key::Number(1.0), GuestValue::from("one"));
        table.insert(Key::from("1"), GuestValue::from("string one"));
        table.insert(Key::Boolean(true), GuestValue::from("yes"));
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_index(1.0), Some(&GuestValue::from("one")));
        assert_eq!(table.get("1"), Some(&GuestValue::from("string one")));
        assert_eq!(table.get_bool(true), Some(&GuestValue::from("yes")));
        assert!(!table.is_sequence());
    }

    #[test]
    fn sequence_stops_at_first_gap() {
        let mut table = Table::new();
        for index in [1.0, 2.0, 4.0] {
            table.insert(Key::Number(index), GuestValue::Number(index * 10.0));
        }
        let run: Vec<f64> = table
            .sequence()
            .into_iter()
            .filter_map(GuestValue::as_number)
            .collect();
        assert_eq!(run, vec![10.0, 20.0]);
    }

    #[test]
    fn negative_zero_shares_the_zero_slot() {
        let mut table = Table::new();
        table.insert(Key::Number(0.0), GuestValue::Boolean(true));
        assert_eq!(table.get_index(-0.0), Some(&GuestValue::Boolean(true)));
    }

    #[test]
    fn display_lists_every_domain() {
        let mut table = Table::from_sequence([GuestValue::Number(3.0)]);
        table.insert(Key::from("A"), GuestValue::Number(1.0));
        assert_eq!(table.to_string(), "{[1]=3,A=1}");
    }
}
