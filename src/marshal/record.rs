//=============================================
// solvra_lua/marshal/record.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Struct-like host values
// Objective: Declarative field enumeration for record encode and decode
//=============================================

use super::decode::FromGuest;
use super::encode::{Encoded, EncodedKey, IntoGuest, Walk};
use crate::error::Result;
use crate::value::Table;

/// Struct-like host value with an explicit list of exported fields.
///
/// Implemented by the [`record!`](crate::record) macro; only fields declared
/// with a guest key are visible to the interpreter.
pub trait Record {
    /// Exported fields in declaration order.
    fn fields(&self) -> Vec<(&'static str, &dyn IntoGuest)>;

    /// Exported field whose key matches `name` after case normalization.
    fn field_mut(&mut self, name: &str) -> Option<&mut dyn FromGuest>;

    fn field_names() -> Vec<&'static str>
    where
        Self: Sized;
}

/// Guest keys match field keys once both have an upper-cased first letter.
#[doc(hidden)]
pub fn same_key(field: &str, guest: &str) -> bool {
    let mut left = field.chars();
    let mut right = guest.chars();
    match (left.next(), right.next()) {
        (Some(a), Some(b)) => a.to_uppercase().eq(b.to_uppercase()) && left.as_str() == right.as_str(),
        (None, None) => true,
        _ => false,
    }
}

#[doc(hidden)]
pub fn encode_record(record: &dyn Record, type_name: &'static str, walk: &mut Walk) -> Result<Encoded> {
    walk.nested(type_name, |walk| {
        let mut entries = Vec::new();
        for (key, value) in record.fields() {
            entries.push((EncodedKey::String(key.to_string()), value.encode(walk)?));
        }
        Ok(Encoded::Table(entries))
    })
}

/// String-keyed entries land in matching fields; unknown keys are ignored.
#[doc(hidden)]
pub fn fill_record(record: &mut dyn Record, table: &Table) -> Result<()> {
    for (key, value) in table.strings() {
        if let Some(slot) = record.field_mut(key) {
            value.unmarshal(slot)?;
        }
    }
    Ok(())
}

/// Declare a struct that marshals to and from guest tables.
///
/// Fields followed by `=> "Key"` are exported under that key; all other
/// fields stay private to the host.
///
/// ```
/// solvra_lua::record! {
///     #[derive(Debug, Default)]
///     pub struct Point {
///         pub x: i64 => "X",
///         pub y: i64 => "Y",
///         cache: Option<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty $(=> $key:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::marshal::Record for $name {
            fn fields(&self) -> ::std::vec::Vec<(&'static str, &dyn $crate::marshal::IntoGuest)> {
                let mut fields: ::std::vec::Vec<(&'static str, &dyn $crate::marshal::IntoGuest)> =
                    ::std::vec::Vec::new();
                $($(
                    fields.push(($key, &self.$field as &dyn $crate::marshal::IntoGuest));
                )?)*
                fields
            }

            fn field_mut(&mut self, name: &str) -> ::std::option::Option<&mut dyn $crate::marshal::FromGuest> {
                $($(
                    if $crate::marshal::same_key($key, name) {
                        return ::std::option::Option::Some(
                            &mut self.$field as &mut dyn $crate::marshal::FromGuest,
                        );
                    }
                )?)*
                let _ = name;
                ::std::option::Option::None
            }

            fn field_names() -> ::std::vec::Vec<&'static str> {
                ::std::vec![$($($key,)?)*]
            }
        }

        impl $crate::marshal::Describe for $name {
            fn describe() -> $crate::marshal::Descriptor {
                $crate::marshal::Descriptor::new(
                    ::std::stringify!($name),
                    $crate::marshal::Shape::Record {
                        fields: <$name as $crate::marshal::Record>::field_names(),
                    },
                )
            }
        }

        impl $crate::marshal::IntoGuest for $name {
            fn encode(&self, walk: &mut $crate::marshal::Walk) -> $crate::Result<$crate::marshal::Encoded> {
                $crate::marshal::encode_record(self, ::std::stringify!($name), walk)
            }
        }

        impl $crate::marshal::FromGuest for $name {
            fn type_name(&self) -> &'static str {
                ::std::stringify!($name)
            }

            fn set_table(&mut self, table: &$crate::value::Table) -> $crate::Result<()> {
                $crate::marshal::fill_record(self, table)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::marshal::{decode, encode};
    use crate::value::{GuestValue, Key};

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Sample {
            pub a: i32 => "A",
            pub b: u32 => "B",
            hidden: String,
        }
    }

    #[test]
    fn only_exported_fields_encode() {
        let sample = Sample {
            a: 3,
            b: 2,
            hidden: "secret".to_string(),
        };
        let Encoded::Table(entries) = encode(&sample).expect("encode") else {
            panic!("records encode to tables");
        };
        let keys: Vec<EncodedKey> = entries.into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                EncodedKey::String("A".to_string()),
                EncodedKey::String("B".to_string())
            ]
        );
        assert_eq!(Sample::field_names(), vec!["A", "B"]);
    }

    #[test]
    fn decode_matches_case_normalized_keys_and_ignores_strangers() {
        let mut table = Table::new();
        table.insert(Key::from("a"), GuestValue::Number(7.0));
        table.insert(Key::from("B"), GuestValue::Number(9.0));
        table.insert(Key::from("hidden"), GuestValue::from("nope"));
        table.insert(Key::from("Extra"), GuestValue::Boolean(true));
        let sample: Sample = decode(&GuestValue::Table(table)).expect("decode");
        assert_eq!(
            sample,
            Sample {
                a: 7,
                b: 9,
                hidden: String::new()
            }
        );
    }

    #[test]
    fn field_errors_propagate() {
        let mut table = Table::new();
        table.insert(Key::from("A"), GuestValue::from("seven"));
        assert!(matches!(
            decode::<Sample>(&GuestValue::Table(table)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn key_normalization_only_touches_the_first_letter() {
        assert!(same_key("Name", "name"));
        assert!(same_key("Name", "Name"));
        assert!(!same_key("Name", "NAME"));
        assert!(!same_key("Name", "Nam"));
    }
}
