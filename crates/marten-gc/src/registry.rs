//! Process-wide catalogue of GC-managed types.
//!
//! Every payload type stored in a [`Heap`](crate::Heap) is described by a
//! [`TypeInfo`] entry: type-erased destroy/move/fixup hooks, a display name,
//! and a convertibility flag toward the root object type. Entries are
//! append-only; the index handed out on first registration is stable for the
//! lifetime of the process and is what allocation headers record.
//!
//! Registration is serialized behind a write lock, so concurrent first
//! registration of the same type resolves to a single entry. Lookups after
//! registration only ever take the read lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::sync::OnceLock;

use crate::heap::FixupQueue;

/// Sentinel type index for a reserved-but-unconstructed record.
pub(crate) const UNALLOCATED_TYPE: u32 = u32::MAX;
/// Sentinel type index for a record that has been moved during collection.
pub(crate) const FORWARDED_TYPE: u32 = u32::MAX - 1;

/// Contract for payload types that can live in a GC heap.
///
/// The associated consts describe the type to the registry, and [`fixup`]
/// is the hook the collector invokes right after a payload has been
/// bit-moved, so the payload can enqueue every embedded untracked handle
/// and packed value for position translation.
///
/// [`fixup`]: HeapType::fixup
pub trait HeapType: Sized + 'static {
    /// True iff the payload embeds untracked handles or packed values.
    /// Types that set this must override [`HeapType::fixup`].
    const NEEDS_FIXUP: bool = false;

    /// True iff a handle to this payload may be dereferenced as the root
    /// object type.
    const CONVERTIBLE_TO_OBJECT: bool = false;

    /// True only for the root object type itself (the convertibility target).
    const IS_OBJECT_ROOT: bool = false;

    /// Visit every embedded untracked handle and packed value, forwarding
    /// each to the queue via its `fixup_after_move`.
    fn fixup(&mut self, queue: &mut FixupQueue) {
        let _ = queue;
    }
}

/// Immutable registry entry for one GC-managed type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    /// Runs the payload destructor. Absent for trivially destructible types.
    pub(crate) destroy: Option<unsafe fn(*mut u8)>,
    /// Relocates the payload by bitwise move. The moved-from bytes are left
    /// in place; a forwarded record is never destroyed, which keeps them
    /// inert.
    pub(crate) relocate: unsafe fn(to: *mut u8, from: *mut u8),
    /// Rewrites embedded positions after a move. Absent when the payload
    /// holds no heap references.
    pub(crate) fixup: Option<unsafe fn(*mut u8, &mut FixupQueue)>,
    /// Payload size in bytes (`size_of::<T>()`); records may carry extra
    /// trailing slots beyond this.
    pub(crate) size: usize,
    convertible_to_object: bool,
    object_root: bool,
    name: &'static str,
}

impl TypeInfo {
    /// Human-readable type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether handles of this type may be viewed as the root object type.
    pub fn is_convertible_to_object(&self) -> bool {
        self.convertible_to_object
    }
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("convertible_to_object", &self.convertible_to_object)
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    entries: RwLock<Vec<TypeInfo>>,
    indices: RwLock<FxHashMap<TypeId, u32>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::default)
}

unsafe fn destroy_erased<T>(payload: *mut u8) {
    // SAFETY: the caller guarantees `payload` points at a live, correctly
    // typed payload that is dropped exactly once.
    unsafe { std::ptr::drop_in_place(payload.cast::<T>()) }
}

unsafe fn relocate_erased<T>(to: *mut u8, from: *mut u8) {
    // SAFETY: the caller guarantees both pointers are valid for
    // `size_of::<T>()` bytes and do not overlap (they live in different
    // storage buffers). The source is never dropped afterwards.
    unsafe { std::ptr::copy_nonoverlapping(from.cast::<T>(), to.cast::<T>(), 1) }
}

unsafe fn fixup_erased<T: HeapType>(payload: *mut u8, queue: &mut FixupQueue) {
    // SAFETY: the caller guarantees `payload` points at a live `T` in the
    // destination storage with no other outstanding references.
    unsafe { T::fixup(&mut *payload.cast::<T>(), queue) }
}

/// Register `T`, returning its stable type index. Idempotent: repeat calls
/// for the same type return the index assigned on first registration.
pub fn register<T: HeapType>() -> u32 {
    let reg = registry();
    let id = TypeId::of::<T>();
    if let Some(&index) = reg.indices.read().get(&id) {
        return index;
    }

    let mut indices = reg.indices.write();
    // Lost the race between the read above and taking the write lock.
    if let Some(&index) = indices.get(&id) {
        return index;
    }

    assert!(
        std::mem::align_of::<T>() <= crate::heap::SLOT_SIZE as usize,
        "heap payload types must be at most slot-aligned: {}",
        std::any::type_name::<T>()
    );

    let mut entries = reg.entries.write();
    let index = entries.len() as u32;
    // The sentinels occupy the top of the index space (see the open question
    // on registry growth: resolved by refusing to hand out colliding indices).
    assert!(index < FORWARDED_TYPE, "type registry exhausted");

    entries.push(TypeInfo {
        destroy: if std::mem::needs_drop::<T>() {
            Some(destroy_erased::<T>)
        } else {
            None
        },
        relocate: relocate_erased::<T>,
        fixup: if T::NEEDS_FIXUP {
            Some(fixup_erased::<T>)
        } else {
            None
        },
        size: std::mem::size_of::<T>(),
        convertible_to_object: T::CONVERTIBLE_TO_OBJECT,
        object_root: T::IS_OBJECT_ROOT,
        name: std::any::type_name::<T>(),
    });
    indices.insert(id, index);
    index
}

/// Look up the entry for a registered type index.
///
/// Panics on an unregistered or sentinel index; allocation headers only ever
/// carry indices handed out by [`register`].
pub fn lookup(index: u32) -> TypeInfo {
    let entries = registry().entries.read();
    entries[index as usize]
}

/// True iff a payload of type `index` may be dereferenced as `target`:
/// either the indices match, or `target` designates the root object type and
/// `index` is flagged convertible to it.
pub fn is_convertible(index: u32, target: u32) -> bool {
    if index == target {
        return true;
    }
    let entries = registry().entries.read();
    entries[target as usize].object_root && entries[index as usize].convertible_to_object
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(u64);
    impl HeapType for Plain {}

    struct WithDrop(Vec<u8>);
    impl HeapType for WithDrop {}

    #[test]
    fn registration_is_idempotent() {
        let a = register::<Plain>();
        let b = register::<Plain>();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_types_get_distinct_indices() {
        assert_ne!(register::<Plain>(), register::<WithDrop>());
    }

    #[test]
    fn destroy_hook_present_only_when_needed() {
        assert!(lookup(register::<Plain>()).destroy.is_none());
        assert!(lookup(register::<WithDrop>()).destroy.is_some());
    }

    #[test]
    fn self_conversion_always_allowed() {
        let index = register::<Plain>();
        assert!(is_convertible(index, index));
        assert!(!is_convertible(index, register::<WithDrop>()));
    }
}
