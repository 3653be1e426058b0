use mlua::MultiValue;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::marshal::{FromGuest, decode};
use crate::value::{GuestValue, read_value};

/// Values a script left on its result stack, in order.
///
/// Each slot is read back independently; a value with no host counterpart
/// (a function, say) is an `Unreadable` error in its own slot while the
/// surrounding call still succeeds.
#[derive(Debug, Clone, Default)]
pub struct ReturnValues {
    slots: Vec<Result<GuestValue>>,
}

impl ReturnValues {
    pub(crate) fn read(values: MultiValue<'_>) -> Self {
        Self {
            slots: values.into_vec().iter().map(read_value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Result<GuestValue>> {
        self.slots.get(index)
    }

    /// The value in slot `index`, or the error that slot carries.
    pub fn value(&self, index: usize) -> Result<&GuestValue> {
        match self.slots.get(index) {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(err.clone()),
            None => Err(Error::ReturnCount {
                expected: index + 1,
                actual: self.slots.len(),
            }),
        }
    }

    pub fn decode<T: FromGuest + Default>(&self, index: usize) -> Result<T> {
        decode(self.value(index)?)
    }

    /// Populate one destination per returned value. Counts must match.
    pub fn unmarshal(&self, targets: &mut [&mut dyn FromGuest]) -> Result<()> {
        if targets.len() != self.slots.len() {
            return Err(Error::ReturnCount {
                expected: targets.len(),
                actual: self.slots.len(),
            });
        }
        for (index, target) in targets.iter_mut().enumerate() {
            self.value(index)?.unmarshal(&mut **target)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Result<GuestValue>> + '_ {
        self.slots.iter()
    }

    pub fn into_values(self) -> Vec<Result<GuestValue>> {
        self.slots
    }

    /// Readable values as JSON; unreadable slots render as their error text.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.slots
                .iter()
                .map(|slot| match slot {
                    Ok(value) => serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                    Err(err) => serde_json::json!({ "error": err.to_string() }),
                })
                .collect(),
        )
    }
}

impl From<Vec<GuestValue>> for ReturnValues {
    fn from(values: Vec<GuestValue>) -> Self {
        Self {
            slots: values.into_iter().map(Ok).collect(),
        }
    }
}

impl Serialize for ReturnValues {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReturnValues {
        ReturnValues::from(vec![GuestValue::Number(5.0), GuestValue::from("five")])
    }

    #[test]
    fn unmarshal_requires_matching_counts() {
        let mut number = 0_i32;
        assert!(matches!(
            sample().unmarshal(&mut [&mut number]),
            Err(Error::ReturnCount {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn unmarshal_fills_each_target_in_order() {
        let mut number = 0_i32;
        let mut text = String::new();
        sample()
            .unmarshal(&mut [&mut number, &mut text])
            .expect("unmarshal");
        assert_eq!((number, text.as_str()), (5, "five"));
    }

    #[test]
    fn unreadable_slots_surface_on_access() {
        let values = ReturnValues {
            slots: vec![Err(Error::Unreadable { kind: "function" })],
        };
        assert!(matches!(values.decode::<i32>(0), Err(Error::Unreadable { .. })));
        assert!(matches!(values.decode::<i32>(3), Err(Error::ReturnCount { .. })));
        assert_eq!(values.to_json()[0]["error"], "guest function value cannot be read back into the host");
    }
}
