//=============================================
// solvra_lua/marshal/descriptor.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Static shape descriptions for host types
// Objective: Compute each host type's shape once and share it process-wide
//=============================================

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::value::{GuestValue, Table};

/// Shape of a host type as far as marshaling is concerned.
#[derive(Debug, Clone)]
pub enum Shape {
    Integer,
    Unsigned,
    Float,
    Boolean,
    String,
    /// Decoded through a textual parser rather than plain assignment.
    Text,
    /// Accepts any guest value.
    Dynamic,
    Record {
        fields: Vec<&'static str>,
    },
    Sequence {
        element: Arc<Descriptor>,
        len: Option<usize>,
    },
    Map {
        key: Arc<Descriptor>,
        value: Arc<Descriptor>,
    },
    Pointer(Arc<Descriptor>),
    Optional(Arc<Descriptor>),
    Variadic(Arc<Descriptor>),
    Function(Signature),
    Opaque,
}

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: &'static str,
    pub shape: Shape,
}

/// Ordered parameter and result shapes of a bridged function.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Arc<Descriptor>>,
    pub results: Vec<Arc<Descriptor>>,
}

/// Which of a guest table's key mappings a map destination reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDomain {
    Number,
    String,
    Boolean,
}

impl Descriptor {
    pub fn new(name: &'static str, shape: Shape) -> Self {
        Self { name, shape }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.shape, Shape::Variadic(_))
    }

    pub fn key_domain(&self) -> Result<KeyDomain> {
        match &self.shape {
            Shape::Integer | Shape::Unsigned | Shape::Float => Ok(KeyDomain::Number),
            Shape::String | Shape::Text => Ok(KeyDomain::String),
            Shape::Boolean => Ok(KeyDomain::Boolean),
            Shape::Record { .. } => Err(Error::KeyType {
                key: self.name,
                reason: "struct keys are not supported".to_string(),
            }),
            _ => Err(Error::KeyType {
                key: self.name,
                reason: "map keys must be numeric, string or boolean".to_string(),
            }),
        }
    }
}

impl Signature {
    /// True when the final parameter collects the remaining arguments.
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|param| param.is_variadic())
    }

    /// Arguments a caller must present.
    pub fn required(&self) -> usize {
        if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }
}

/// Host types with a statically known marshaling shape.
pub trait Describe {
    fn describe() -> Descriptor;
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<Descriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Cached descriptor for `T`, computed on first use.
pub fn descriptor_of<T: Describe + ?Sized + 'static>() -> Arc<Descriptor> {
    let id = TypeId::of::<T>();
    if let Some(found) = DESCRIPTORS.read().get(&id) {
        return Arc::clone(found);
    }
    // Nested shapes call back into the cache; build before taking the write lock.
    let built = Arc::new(T::describe());
    Arc::clone(DESCRIPTORS.write().entry(id).or_insert(built))
}

macro_rules! describe_as {
    ($shape:ident => $($ty:ty),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> Descriptor {
                    Descriptor::new(stringify!($ty), Shape::$shape)
                }
            }
        )*
    };
}

describe_as!(Integer => i8, i16, i32, i64, i128, isize);
describe_as!(Unsigned => u8, u16, u32, u64, u128, usize);
describe_as!(Float => f32, f64);
describe_as!(Boolean => bool);
describe_as!(String => String, str, char, PathBuf);
describe_as!(Dynamic => GuestValue, Table, serde_json::Value);

impl<T: Describe + ?Sized + 'static> Describe for &T {
    fn describe() -> Descriptor {
        (*descriptor_of::<T>()).clone()
    }
}

impl<T: Describe + 'static> Describe for Option<T> {
    fn describe() -> Descriptor {
        Descriptor::new("Option", Shape::Optional(descriptor_of::<T>()))
    }
}

macro_rules! describe_pointer {
    ($($ptr:ident),*) => {
        $(
            impl<T: Describe + ?Sized + 'static> Describe for $ptr<T> {
                fn describe() -> Descriptor {
                    Descriptor::new(stringify!($ptr), Shape::Pointer(descriptor_of::<T>()))
                }
            }
        )*
    };
}

describe_pointer!(Box, Rc, Arc);

impl<T: Describe + 'static> Describe for Vec<T> {
    fn describe() -> Descriptor {
        Descriptor::new(
            "Vec",
            Shape::Sequence {
                element: descriptor_of::<T>(),
                len: None,
            },
        )
    }
}

impl<T: Describe + 'static> Describe for [T] {
    fn describe() -> Descriptor {
        Descriptor::new(
            "slice",
            Shape::Sequence {
                element: descriptor_of::<T>(),
                len: None,
            },
        )
    }
}

impl<T: Describe + 'static, const N: usize> Describe for [T; N] {
    fn describe() -> Descriptor {
        Descriptor::new(
            "array",
            Shape::Sequence {
                element: descriptor_of::<T>(),
                len: Some(N),
            },
        )
    }
}

impl<K: Describe + 'static, V: Describe + 'static, S: 'static> Describe for HashMap<K, V, S> {
    fn describe() -> Descriptor {
        Descriptor::new(
            "HashMap",
            Shape::Map {
                key: descriptor_of::<K>(),
                value: descriptor_of::<V>(),
            },
        )
    }
}

impl<K: Describe + 'static, V: Describe + 'static> Describe for BTreeMap<K, V> {
    fn describe() -> Descriptor {
        Descriptor::new(
            "BTreeMap",
            Shape::Map {
                key: descriptor_of::<K>(),
                value: descriptor_of::<V>(),
            },
        )
    }
}

impl<T: 'static> Describe for *const T {
    fn describe() -> Descriptor {
        Descriptor::new("raw pointer", Shape::Opaque)
    }
}

impl<T: 'static> Describe for *mut T {
    fn describe() -> Descriptor {
        Descriptor::new("raw pointer", Shape::Opaque)
    }
}

impl<T: 'static> Describe for std::sync::mpsc::Sender<T> {
    fn describe() -> Descriptor {
        Descriptor::new("channel", Shape::Opaque)
    }
}

impl<T: 'static> Describe for std::sync::mpsc::Receiver<T> {
    fn describe() -> Descriptor {
        Descriptor::new("channel", Shape::Opaque)
    }
}

impl<T: 'static> Describe for crossbeam_channel::Sender<T> {
    fn describe() -> Descriptor {
        Descriptor::new("channel", Shape::Opaque)
    }
}

impl<T: 'static> Describe for crossbeam_channel::Receiver<T> {
    fn describe() -> Descriptor {
        Descriptor::new("channel", Shape::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_cached_per_type() {
        let first = descriptor_of::<Vec<u32>>();
        let second = descriptor_of::<Vec<u32>>();
        assert!(Arc::ptr_eq(&first, &second));
        match &first.shape {
            Shape::Sequence { element, len } => {
                assert!(matches!(element.shape, Shape::Unsigned));
                assert_eq!(*len, None);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn key_domains_follow_key_shape() {
        assert_eq!(descriptor_of::<i32>().key_domain().ok(), Some(KeyDomain::Number));
        assert_eq!(descriptor_of::<String>().key_domain().ok(), Some(KeyDomain::String));
        assert_eq!(descriptor_of::<bool>().key_domain().ok(), Some(KeyDomain::Boolean));
        assert!(matches!(
            descriptor_of::<Vec<u8>>().key_domain(),
            Err(Error::KeyType { .. })
        ));
    }

    #[test]
    fn arrays_record_their_length() {
        match &descriptor_of::<[f64; 3]>().shape {
            Shape::Sequence { len, .. } => assert_eq!(*len, Some(3)),
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
