//=============================================
// solvra_lua/lib.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Typed host bridge for an embedded Lua interpreter
// Objective: Expose the value model, marshaling engine, function bridges and
//            serialized runtime as one library surface
//=============================================

pub mod bridge;
pub mod error;
pub mod libs;
pub mod logging;
pub mod marshal;
pub mod runtime;
pub mod value;

pub use bridge::{HostFunction, IntoHostFunction, Library, Results};
pub use error::{Error, Result};
pub use libs::Libs;
pub use marshal::{Describe, FromGuest, IntoGuest, Record, Text, Variadic, decode};
pub use runtime::{AccessState, LuaRuntime, ReturnValues, RuntimeOptions};
pub use value::{GuestValue, Key, Table};
