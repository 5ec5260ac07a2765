//! # Marten Core
//!
//! Values and type conversions for the Marten interpreter.
//!
//! ## Design
//!
//! - **Expanded values**: [`Value`] is the eight-kind representation the
//!   evaluator works with; the one-slot packed form from `marten-gc` is
//!   what gets embedded inside heap payloads
//! - **Heap payloads**: strings, objects and native functions live in the
//!   GC heap and are reached through tracked handles
//! - **Conversions**: the ES1 abstract operations, including the
//!   shortest-round-trip number renderer
//! - **Errors**: one `thiserror` taxonomy; everything propagates with `?`
//!
//! The interpreter is single-threaded: values hold `Rc` and GC handles and
//! are deliberately not `Send`.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod object;
pub mod string;
pub mod value;

pub use convert::{
    number_to_string, parse_number, to_boolean, to_int32, to_int32_value, to_integer,
    to_integer_value, to_number, to_primitive, to_string, to_uint16, to_uint16_value, to_uint32,
    to_uint32_value, PreferredType,
};
pub use error::{Error, Result};
pub use object::JsObject;
pub use string::JsString;
pub use value::{NativeFn, NativeFunction, Reference, Value, ValueKind};

pub use marten_gc::{GcError, Handle, Heap, PackedKind, PackedValue, UntrackedHandle};
