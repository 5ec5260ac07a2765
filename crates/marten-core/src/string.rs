//! Heap-managed immutable strings.
//!
//! Strings are immutable: once constructed, a `JsString` never changes.
//! Equality between string values is by content (there is no intern table
//! in the core; embedders that want pointer-fast comparison can layer one
//! on top).

use marten_gc::{Handle, Heap, HeapType};

use crate::error::Result;

/// An immutable string payload living in the GC heap.
///
/// The payload owns its character storage; the registry's destroy hook
/// releases it when the record is reclaimed, and the bitwise move hook
/// carries the owning pointer across collections.
pub struct JsString {
    chars: Box<str>,
}

impl HeapType for JsString {}

impl JsString {
    /// Allocate a new string on `heap`.
    pub fn new(heap: &mut Heap, text: &str) -> Result<Handle<JsString>> {
        Ok(heap.alloc(JsString { chars: text.into() })?)
    }

    /// String contents.
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl std::fmt::Debug for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsString({:?})", &*self.chars)
    }
}
