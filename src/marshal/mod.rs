//=============================================
// solvra_lua/marshal/mod.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Bidirectional value marshaling engine
// Objective: Re-export descriptors, encode, decode and record helpers
//=============================================

mod decode;
mod descriptor;
mod encode;
mod json;
mod record;

pub use decode::{FromGuest, Text, Variadic, assign, decode};
pub use descriptor::{Describe, Descriptor, KeyDomain, Shape, Signature, descriptor_of};
pub use encode::{Encoded, EncodedKey, IntoGuest, Walk, encode};
pub use record::Record;

#[doc(hidden)]
pub use record::{encode_record, fill_record, same_key};
