use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as Json;

use super::encode::{Encoded, EncodedKey, IntoGuest, Walk};
use crate::error::Result;
use crate::value::{GuestValue, Table, format_number};

impl Serialize for GuestValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GuestValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 9.0e15 {
                    serializer.serialize_i64(*number as i64)
                } else {
                    serializer.serialize_f64(*number)
                }
            }
            GuestValue::Boolean(flag) => serializer.serialize_bool(*flag),
            GuestValue::String(text) => serializer.serialize_str(text),
            GuestValue::Nil => serializer.serialize_unit(),
            GuestValue::Table(table) => table.serialize(serializer),
        }
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_sequence() {
            let run = self.sequence();
            let mut seq = serializer.serialize_seq(Some(run.len()))?;
            for value in run {
                seq.serialize_element(value)?;
            }
            return seq.end();
        }
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.numbers() {
            map.serialize_entry(&format_number(key), value)?;
        }
        for (key, value) in self.strings() {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in self.booleans() {
            map.serialize_entry(&key.to_string(), value)?;
        }
        map.end()
    }
}

impl IntoGuest for Json {
    fn encode(&self, walk: &mut Walk) -> Result<Encoded> {
        match self {
            Json::Null => Ok(Encoded::Nil),
            Json::Bool(flag) => Ok(Encoded::Boolean(*flag)),
            Json::Number(number) => Ok(match number.as_i64() {
                Some(integer) => Encoded::Integer(integer),
                None => Encoded::Number(number.as_f64().unwrap_or(f64::NAN)),
            }),
            Json::String(text) => Ok(Encoded::String(text.clone())),
            Json::Array(items) => items.encode(walk),
            Json::Object(fields) => walk.nested("json object", |walk| {
                let mut entries = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    entries.push((EncodedKey::String(key.clone()), value.encode(walk)?));
                }
                Ok(Encoded::Table(entries))
            }),
        }
    }
}
