//=============================================
// solvra_lua/bridge/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host function bridges
// Objective: Turn typed host closures into guest-callable functions and
//            materialize encoded values inside the interpreter
//=============================================

mod library;
mod print;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use mlua::{Lua, MultiValue, Value};

use crate::error::{Error, Result};
use crate::marshal::{
    Describe, Descriptor, Encoded, EncodedKey, FromGuest, IntoGuest, Signature, Walk,
    descriptor_of,
};
use crate::value::{GuestValue, read_value};

pub use library::Library;
pub(crate) use library::install as install_library;
pub(crate) use print::{Sink, install_print};

//=============================================
// Section 1.0 - Call arguments
//=============================================

/// Arguments presented by the interpreter, read back before binding.
pub struct Args {
    values: Vec<Result<GuestValue>>,
    next: usize,
}

impl Args {
    pub(crate) fn new(values: Vec<Result<GuestValue>>) -> Self {
        Self { values, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, required: usize) -> Result<()> {
        if self.values.len() < required {
            return Err(Error::Arity {
                expected: required,
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    fn assign_at(&self, index: usize, slot: &mut dyn FromGuest) -> Result<()> {
        match self.values.get(index) {
            Some(Ok(value)) => value.unmarshal(slot),
            Some(Err(Error::Unreadable { kind })) => Err(Error::mismatch(kind, slot.type_name())),
            Some(Err(err)) => Err(err.clone()),
            None => Err(Error::Arity {
                expected: index + 1,
                actual: self.values.len(),
            }),
        }
    }

    /// Bind the next parameter. A variadic slot swallows every remaining argument.
    fn bind<T>(&mut self) -> Result<T>
    where
        T: FromGuest + Describe + Default + 'static,
    {
        let mut slot = T::default();
        if descriptor_of::<T>().is_variadic() {
            while self.next < self.values.len() {
                self.assign_at(self.next, &mut slot)?;
                self.next += 1;
            }
        } else {
            self.assign_at(self.next, &mut slot)?;
            self.next += 1;
        }
        Ok(slot)
    }
}

//=============================================
// Section 2.0 - Return values
//=============================================

/// Values a bridged function hands back to the script, in declaration order.
pub trait Results {
    fn result_shapes() -> Vec<Arc<Descriptor>>;
    fn into_encoded(self, walk: &mut Walk) -> Result<Vec<Encoded>>;
}

impl Results for () {
    fn result_shapes() -> Vec<Arc<Descriptor>> {
        Vec::new()
    }

    fn into_encoded(self, _walk: &mut Walk) -> Result<Vec<Encoded>> {
        Ok(Vec::new())
    }
}

impl<T: IntoGuest + Describe + 'static> Results for T {
    fn result_shapes() -> Vec<Arc<Descriptor>> {
        vec![descriptor_of::<T>()]
    }

    fn into_encoded(self, walk: &mut Walk) -> Result<Vec<Encoded>> {
        Ok(vec![self.encode(walk)?])
    }
}

impl<R: Results, E: fmt::Display> Results for std::result::Result<R, E> {
    fn result_shapes() -> Vec<Arc<Descriptor>> {
        R::result_shapes()
    }

    fn into_encoded(self, walk: &mut Walk) -> Result<Vec<Encoded>> {
        match self {
            Ok(values) => values.into_encoded(walk),
            Err(err) => Err(Error::Host(err.to_string())),
        }
    }
}

macro_rules! tuple_results {
    ($($name:ident),+) => {
        impl<$($name: IntoGuest + Describe + 'static),+> Results for ($($name,)+) {
            fn result_shapes() -> Vec<Arc<Descriptor>> {
                vec![$(descriptor_of::<$name>()),+]
            }

            #[allow(non_snake_case)]
            fn into_encoded(self, walk: &mut Walk) -> Result<Vec<Encoded>> {
                let ($($name,)+) = self;
                Ok(vec![$($name.encode(walk)?),+])
            }
        }
    };
}

tuple_results!(A);
tuple_results!(A, B);
tuple_results!(A, B, C);
tuple_results!(A, B, C, D);
tuple_results!(A, B, C, D, E);
tuple_results!(A, B, C, D, E, F);

//=============================================
// Section 3.0 - Host functions
//=============================================

type Thunk = dyn Fn(&mut Args, &mut Walk) -> Result<Vec<Encoded>> + Send + Sync;

/// A host closure the interpreter can call.
#[derive(Clone)]
pub struct HostFunction {
    signature: Arc<Signature>,
    thunk: Arc<Thunk>,
}

impl HostFunction {
    /// Wrap any supported host closure.
    pub fn wrap<F, Marker>(function: F) -> Self
    where
        F: IntoHostFunction<Marker>,
    {
        function.into_host_function()
    }

    fn from_parts<T>(signature: Signature, thunk: T) -> Self
    where
        T: Fn(&mut Args, &mut Walk) -> Result<Vec<Encoded>> + Send + Sync + 'static,
    {
        Self {
            signature: Arc::new(signature),
            thunk: Arc::new(thunk),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Only the final parameter may be variadic.
    pub(crate) fn validate(&self) -> Result<()> {
        let params = &self.signature.params;
        let misplaced = params
            .iter()
            .take(params.len().saturating_sub(1))
            .any(|param| param.is_variadic());
        if misplaced {
            return Err(Error::unsupported(
                "function",
                "a Variadic parameter must be the last parameter",
            ));
        }
        Ok(())
    }

    /// Bind, invoke and encode. Host panics are caught and reported.
    pub fn invoke(&self, values: Vec<Result<GuestValue>>, walk: &mut Walk) -> Result<Vec<Encoded>> {
        let mut args = Args::new(values);
        args.require(self.signature.required())?;
        match catch_unwind(AssertUnwindSafe(|| (self.thunk)(&mut args, walk))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(Error::HostPanic(panic_message(payload.as_ref()))),
        }
    }

    /// Invoke directly from the host with already read-back values.
    pub fn call(&self, args: &[GuestValue]) -> Result<Vec<Encoded>> {
        let values = args.iter().cloned().map(Ok).collect();
        self.invoke(values, &mut Walk::default())
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.signature.params.iter().map(|p| p.name).collect();
        let results: Vec<&str> = self.signature.results.iter().map(|r| r.name).collect();
        f.debug_struct("HostFunction")
            .field("params", &params)
            .field("results", &results)
            .finish()
    }
}

impl Describe for HostFunction {
    fn describe() -> Descriptor {
        Descriptor::new("function", crate::marshal::Shape::Function(Signature::default()))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Host closures convertible into a [`HostFunction`].
///
/// `Marker` only disambiguates the per-arity implementations.
pub trait IntoHostFunction<Marker> {
    fn into_host_function(self) -> HostFunction;
}

macro_rules! host_function {
    ($($param:ident),*) => {
        impl<Func, Ret, $($param,)*> IntoHostFunction<(Ret, $($param,)*)> for Func
        where
            Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
            Ret: Results,
            $($param: FromGuest + Describe + Default + 'static,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_host_function(self) -> HostFunction {
                let signature = Signature {
                    params: vec![$(descriptor_of::<$param>()),*],
                    results: Ret::result_shapes(),
                };
                HostFunction::from_parts(signature, move |args: &mut Args, walk: &mut Walk| {
                    $(let $param = args.bind::<$param>()?;)*
                    (self)($($param),*).into_encoded(walk)
                })
            }
        }
    };
}

host_function!();
host_function!(A);
host_function!(A, B);
host_function!(A, B, C);
host_function!(A, B, C, D);
host_function!(A, B, C, D, E);
host_function!(A, B, C, D, E, F);
host_function!(A, B, C, D, E, F, G);
host_function!(A, B, C, D, E, F, G, H);

//=============================================
// Section 4.0 - Interpreter materialization
//=============================================

/// Encode limit installed in the interpreter's app data by the worker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeLimit(pub usize);

pub(crate) fn materialize<'lua>(lua: &'lua Lua, encoded: Encoded) -> mlua::Result<Value<'lua>> {
    Ok(match encoded {
        Encoded::Nil => Value::Nil,
        Encoded::Boolean(flag) => Value::Boolean(flag),
        Encoded::Integer(number) => Value::Integer(number),
        Encoded::Number(number) => Value::Number(number),
        Encoded::String(text) => Value::String(lua.create_string(&text)?),
        Encoded::Table(entries) => {
            let table = lua.create_table()?;
            for (key, value) in entries {
                let key = match key {
                    EncodedKey::Integer(number) => Value::Integer(number),
                    EncodedKey::Number(number) => Value::Number(number),
                    EncodedKey::String(text) => Value::String(lua.create_string(&text)?),
                    EncodedKey::Boolean(flag) => Value::Boolean(flag),
                };
                table.raw_set(key, materialize(lua, value)?)?;
            }
            Value::Table(table)
        }
        Encoded::Function(function) => Value::Function(guest_function(lua, function)?),
    })
}

/// Build the guest-side closure around a host function.
pub(crate) fn guest_function(lua: &Lua, function: HostFunction) -> mlua::Result<mlua::Function<'_>> {
    lua.create_function(move |lua, args: MultiValue| {
        let values: Vec<Result<GuestValue>> = args.into_vec().iter().map(read_value).collect();
        let max_depth = lua
            .app_data_ref::<EncodeLimit>()
            .map(|limit| limit.0)
            .unwrap_or(Walk::DEFAULT_MAX_DEPTH);
        let encoded = function
            .invoke(values, &mut Walk::new(max_depth))
            .map_err(mlua::Error::external)?;
        let mut results = Vec::with_capacity(encoded.len());
        for value in encoded {
            results.push(materialize(lua, value)?);
        }
        Ok(MultiValue::from_vec(results))
    })
}
