//! The minimal object type.
//!
//! Objects carry a class name, a nullable prototype, an internal primitive
//! value slot, and a property table mapping names to packed values. This is
//! the root object type in the GC registry: convertible payload types can
//! be dereferenced through object handles.
//!
//! The built-in object library sits above this crate; what lives here is
//! exactly the surface the conversion rules and reference values need.

use marten_gc::{FixupQueue, Handle, Heap, HeapType, PackedValue, UntrackedHandle};
use rustc_hash::FxHashMap;

use crate::convert::PreferredType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Maximum prototype chain depth walked before giving up.
const MAX_PROTOTYPE_CHAIN_DEPTH: usize = 100;

/// A garbage-collected script object.
pub struct JsObject {
    class_name: Box<str>,
    prototype: UntrackedHandle<JsObject>,
    internal_value: PackedValue,
    properties: FxHashMap<Box<str>, PackedValue>,
}

impl HeapType for JsObject {
    const NEEDS_FIXUP: bool = true;
    const CONVERTIBLE_TO_OBJECT: bool = true;
    const IS_OBJECT_ROOT: bool = true;

    fn fixup(&mut self, queue: &mut FixupQueue) {
        self.prototype.fixup_after_move(queue);
        self.internal_value.fixup_after_move(queue);
        for value in self.properties.values_mut() {
            value.fixup_after_move(queue);
        }
    }
}

impl JsObject {
    /// Allocate an object with the given class name and prototype.
    pub fn new(
        heap: &mut Heap,
        class_name: &str,
        prototype: Option<&Handle<JsObject>>,
    ) -> Result<Handle<JsObject>> {
        let handle = heap.alloc(JsObject {
            class_name: class_name.into(),
            prototype: UntrackedHandle::null(),
            internal_value: PackedValue::undefined(),
            properties: FxHashMap::default(),
        })?;
        if let Some(proto) = prototype {
            handle.get_mut(heap).prototype = proto.untracked();
        }
        Ok(handle)
    }

    /// The object's class name (`[[Class]]`).
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The prototype link; null for prototype-less objects.
    pub fn prototype(&self) -> UntrackedHandle<JsObject> {
        self.prototype
    }

    /// Replace the prototype link.
    pub fn set_prototype(&mut self, prototype: &Handle<JsObject>) {
        self.prototype = prototype.untracked();
    }

    /// The internal primitive value slot (`[[Value]]`).
    pub fn internal_value(&self) -> PackedValue {
        self.internal_value
    }

    /// Store into the internal primitive value slot.
    pub fn set_internal_value(&mut self, value: PackedValue) {
        self.internal_value = value;
    }

    /// Read a property, walking the prototype chain. Absent properties read
    /// as undefined.
    pub fn get(&self, heap: &Heap, name: &str) -> Value {
        let mut current = self;
        for _ in 0..MAX_PROTOTYPE_CHAIN_DEPTH {
            if let Some(packed) = current.properties.get(name) {
                return Value::unpack(*packed, heap);
            }
            if current.prototype.is_null() {
                return Value::Undefined;
            }
            current = current.prototype.get(heap);
        }
        debug_assert!(false, "prototype chain deeper than {MAX_PROTOTYPE_CHAIN_DEPTH}");
        Value::Undefined
    }

    /// Read an own property without consulting the prototype chain.
    pub fn get_own(&self, heap: &Heap, name: &str) -> Option<Value> {
        self.properties
            .get(name)
            .map(|packed| Value::unpack(*packed, heap))
    }

    /// Create or overwrite an own property.
    pub fn put(&mut self, name: &str, value: PackedValue) {
        self.properties.insert(name.into(), value);
    }

    /// True iff the property exists on the object or its prototype chain.
    pub fn has_property(&self, heap: &Heap, name: &str) -> bool {
        let mut current = self;
        for _ in 0..MAX_PROTOTYPE_CHAIN_DEPTH {
            if current.properties.contains_key(name) {
                return true;
            }
            if current.prototype.is_null() {
                return false;
            }
            current = current.prototype.get(heap);
        }
        debug_assert!(false, "prototype chain deeper than {MAX_PROTOTYPE_CHAIN_DEPTH}");
        false
    }

    /// Remove an own property, reporting whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.properties.remove(name).is_some()
    }

    /// Own property names, sorted for deterministic enumeration.
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    /// ES1 `[[DefaultValue]]`: probe `valueOf` and `toString` in hint
    /// order, invoking callable candidates on the object, and return the
    /// first primitive result.
    pub fn default_value(
        heap: &mut Heap,
        object: &Handle<JsObject>,
        hint: PreferredType,
    ) -> Result<Value> {
        let method_names = match hint {
            PreferredType::Number => ["valueOf", "toString"],
            PreferredType::String => ["toString", "valueOf"],
        };
        for name in method_names {
            let candidate = object.get(heap).get(heap, name);
            if matches!(candidate, Value::NativeFunction(_)) {
                let this = Value::Object(object.clone());
                let result = candidate.call(heap, &this, &[])?;
                if result.is_primitive() {
                    tracing::trace!(method = name, kind = result.type_name(), "default value");
                    return Ok(result);
                }
            }
        }
        Err(Error::type_error(format!(
            "cannot convert {} object to a primitive value",
            object.get(heap).class_name()
        )))
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("class", &self.class_name)
            .field("prototype", &self.prototype)
            .field("properties", &self.properties.len())
            .finish()
    }
}
