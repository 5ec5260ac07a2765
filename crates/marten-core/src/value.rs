//! Runtime values.
//!
//! [`Value`] is the expanded representation the interpreter works with; the
//! one-slot [`PackedValue`] form is what gets embedded inside GC payloads.
//! `pack`/`unpack` convert between the two losslessly (identity for heap
//! kinds, bit-exact for numbers modulo NaN canonicalization).

use std::rc::Rc;

use marten_gc::{Handle, Heap, PackedKind, PackedValue};

use crate::error::{Error, Result};
use crate::object::JsObject;
use crate::string::JsString;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// The undefined value.
    Undefined,
    /// The null value.
    Null,
    /// A boolean.
    Boolean,
    /// An IEEE-754 double.
    Number,
    /// A heap string.
    String,
    /// A heap object.
    Object,
    /// A (base, property name) pair; never first-class.
    Reference,
    /// A function implemented in Rust.
    NativeFunction,
}

/// Native function handler type.
///
/// Receives the heap, the `this` value and the argument list. `Rc` rather
/// than `Arc`: the interpreter is single-threaded and handles are not
/// shareable across threads anyway.
pub type NativeFn = Rc<dyn Fn(&mut Heap, &Value, &[Value]) -> Result<Value>>;

/// A function implemented in Rust, stored as a heap payload so packed
/// values can refer to it by position.
pub struct NativeFunction {
    name: Box<str>,
    handler: NativeFn,
}

impl marten_gc::HeapType for NativeFunction {}

impl NativeFunction {
    /// Allocate a native function on `heap`.
    ///
    /// The handler must capture tracked handles only; untracked positions
    /// inside a Rust closure are invisible to the collector.
    pub fn new(heap: &mut Heap, name: &str, handler: NativeFn) -> Result<Handle<NativeFunction>> {
        Ok(heap.alloc(NativeFunction {
            name: name.into(),
            handler,
        })?)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone out the handler so it can be invoked with `&mut Heap`.
    pub fn handler(&self) -> NativeFn {
        Rc::clone(&self.handler)
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A (base object, property name) pair produced by property accesses.
///
/// Not first-class: references only flow between an expression evaluation
/// and the immediately following get/put.
#[derive(Debug, Clone)]
pub struct Reference {
    base: Handle<JsObject>,
    name: Handle<JsString>,
}

impl Reference {
    /// Build a reference to `base[name]`.
    pub fn new(base: Handle<JsObject>, name: Handle<JsString>) -> Self {
        Self { base, name }
    }

    /// The base object.
    pub fn base(&self) -> &Handle<JsObject> {
        &self.base
    }

    /// The property name.
    pub fn property_name<'h>(&self, heap: &'h Heap) -> &'h str {
        self.name.get(heap).as_str()
    }

    /// Read the referenced property (walking the prototype chain).
    pub fn get_value(&self, heap: &Heap) -> Value {
        let name = self.name.get(heap).as_str();
        self.base.get(heap).get(heap, name)
    }

    /// Write the referenced property on the base object itself.
    pub fn put_value(&self, heap: &mut Heap, value: &Value) {
        let name = self.name.get(heap).as_str().to_owned();
        let packed = value.pack();
        self.base.get_mut(heap).put(&name, packed);
    }
}

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// The undefined value.
    Undefined,
    /// The null value.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An IEEE-754 double.
    Number(f64),
    /// A heap string.
    String(Handle<JsString>),
    /// A heap object.
    Object(Handle<JsObject>),
    /// A property reference; never first-class.
    Reference(Reference),
    /// A function implemented in Rust.
    NativeFunction(Handle<NativeFunction>),
}

impl Value {
    /// Discriminant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Reference(_) => ValueKind::Reference,
            Value::NativeFunction(_) => ValueKind::NativeFunction,
        }
    }

    /// Name of the value's type, as `typeof`-adjacent diagnostics want it.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Object => "object",
            ValueKind::Reference => "reference",
            ValueKind::NativeFunction => "native_function",
        }
    }

    /// True for kinds that `to_primitive` returns unchanged.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Value::Object(_) | Value::Reference(_) | Value::NativeFunction(_)
        )
    }

    /// Pack into the one-slot embedded form.
    pub fn pack(&self) -> PackedValue {
        match self {
            Value::Undefined => PackedValue::undefined(),
            Value::Null => PackedValue::null(),
            Value::Boolean(b) => PackedValue::boolean(*b),
            Value::Number(n) => PackedValue::number(*n),
            Value::String(h) => PackedValue::string(h.pos()),
            Value::Object(h) => PackedValue::object(h.pos()),
            Value::Reference(r) => PackedValue::reference(r.base.pos(), r.name.pos()),
            Value::NativeFunction(h) => PackedValue::native_function(h.pos()),
        }
    }

    /// Expand a packed value back into the full representation, rooting any
    /// heap positions it carries.
    pub fn unpack(packed: PackedValue, heap: &Heap) -> Value {
        match packed.kind() {
            PackedKind::Undefined => Value::Undefined,
            PackedKind::Null => Value::Null,
            PackedKind::Boolean(b) => Value::Boolean(b),
            PackedKind::Number(n) => Value::Number(n),
            PackedKind::String(pos) => Value::String(heap.handle_from_position(pos)),
            PackedKind::Object(pos) => Value::Object(heap.handle_from_position(pos)),
            PackedKind::NativeFunction(pos) => {
                Value::NativeFunction(heap.handle_from_position(pos))
            }
            PackedKind::Reference { base, name } => Value::Reference(Reference::new(
                heap.handle_from_position(base),
                heap.handle_from_position(name),
            )),
        }
    }

    /// Equality between values.
    ///
    /// False across kinds; booleans and numbers by value (NaN equals NaN
    /// here), strings by content, objects and native functions by identity.
    /// References are not comparable; debug builds assert.
    pub fn equals(&self, other: &Value, heap: &Heap) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Number(l), Value::Number(r)) => l == r || (l.is_nan() && r.is_nan()),
            (Value::String(l), Value::String(r)) => {
                l.get(heap).as_str() == r.get(heap).as_str()
            }
            (Value::Object(l), Value::Object(r)) => l == r,
            (Value::NativeFunction(l), Value::NativeFunction(r)) => l == r,
            (Value::Reference(_), Value::Reference(_)) => {
                debug_assert!(false, "references are not comparable");
                false
            }
            _ => unreachable!("kinds already matched"),
        }
    }

    /// Dereference a reference value; any other kind is returned unchanged.
    pub fn get_value(&self, heap: &Heap) -> Value {
        match self {
            Value::Reference(r) => r.get_value(heap),
            other => other.clone(),
        }
    }

    /// Assign through a reference value.
    pub fn put_value(&self, heap: &mut Heap, value: &Value) -> Result<()> {
        match self {
            Value::Reference(r) => {
                r.put_value(heap, value);
                Ok(())
            }
            _ => Err(Error::reference_error("invalid assignment target")),
        }
    }

    /// Invoke a callable value.
    pub fn call(&self, heap: &mut Heap, this: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Value::NativeFunction(h) => {
                let handler = h.get(heap).handler();
                handler(heap, this, args)
            }
            other => Err(Error::type_error(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JsObject;

    #[test]
    fn pack_round_trips_every_kind() {
        let mut heap = Heap::new(512);
        let s = JsString::new(&mut heap, "abc").unwrap();
        let o = JsObject::new(&mut heap, "Object", None).unwrap();
        let f = NativeFunction::new(&mut heap, "id", Rc::new(|_, _, _| Ok(Value::Undefined)))
            .unwrap();
        let name = JsString::new(&mut heap, "prop").unwrap();

        let values = [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(0.5),
            Value::Number(-0.0),
            Value::Number(f64::NAN),
            Value::String(s),
            Value::Object(o.clone()),
            Value::Reference(Reference::new(o, name)),
            Value::NativeFunction(f),
        ];
        for v in &values {
            let back = Value::unpack(v.pack(), &heap);
            match (v, &back) {
                (Value::Reference(a), Value::Reference(b)) => {
                    assert_eq!(a.base(), b.base());
                    assert_eq!(a.property_name(&heap), b.property_name(&heap));
                }
                _ => assert!(v.equals(&back, &heap), "{v:?} did not round-trip"),
            }
        }
    }

    #[test]
    fn negative_zero_round_trips_bit_exact() {
        let heap = Heap::new(64);
        let v = Value::Number(-0.0);
        match Value::unpack(v.pack(), &heap) {
            Value::Number(n) => assert!(n == 0.0 && n.is_sign_negative()),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn equality_rules() {
        let mut heap = Heap::new(512);
        let a = JsString::new(&mut heap, "x").unwrap();
        let b = JsString::new(&mut heap, "x").unwrap();
        let c = JsString::new(&mut heap, "y").unwrap();
        // Strings compare by content, not identity.
        assert!(Value::String(a.clone()).equals(&Value::String(b), &heap));
        assert!(!Value::String(a).equals(&Value::String(c), &heap));

        // NaN equals NaN under this relation.
        assert!(Value::Number(f64::NAN).equals(&Value::Number(f64::NAN), &heap));
        assert!(!Value::Number(1.0).equals(&Value::Number(2.0), &heap));

        // Objects compare by identity.
        let o1 = JsObject::new(&mut heap, "Object", None).unwrap();
        let o2 = JsObject::new(&mut heap, "Object", None).unwrap();
        assert!(Value::Object(o1.clone()).equals(&Value::Object(o1.clone()), &heap));
        assert!(!Value::Object(o1).equals(&Value::Object(o2), &heap));

        // Kinds never cross-compare.
        assert!(!Value::Null.equals(&Value::Undefined, &heap));
        assert!(!Value::Number(0.0).equals(&Value::Boolean(false), &heap));
    }

    #[test]
    fn reference_get_and_put() {
        let mut heap = Heap::new(512);
        let obj = JsObject::new(&mut heap, "Object", None).unwrap();
        let name = JsString::new(&mut heap, "answer").unwrap();
        let reference = Value::Reference(Reference::new(obj.clone(), name));

        assert!(matches!(reference.get_value(&heap), Value::Undefined));
        reference.put_value(&mut heap, &Value::Number(42.0)).unwrap();
        match reference.get_value(&heap) {
            Value::Number(n) => assert_eq!(n, 42.0),
            other => panic!("expected number, got {other:?}"),
        }

        // Only references are assignable.
        assert!(Value::Number(1.0)
            .put_value(&mut heap, &Value::Null)
            .is_err());
    }

    #[test]
    fn native_function_calls() {
        let mut heap = Heap::new(512);
        let double = NativeFunction::new(
            &mut heap,
            "double",
            Rc::new(|_, _, args| match args {
                [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
                _ => Err(Error::type_error("expected one number")),
            }),
        )
        .unwrap();
        let f = Value::NativeFunction(double);
        match f.call(&mut heap, &Value::Undefined, &[Value::Number(21.0)]) {
            Ok(Value::Number(n)) => assert_eq!(n, 42.0),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(Value::Null.call(&mut heap, &Value::Undefined, &[]).is_err());
    }
}
