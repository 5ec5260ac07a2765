//! Slot heap with a bump allocator and a stop-the-world copying collector.
//!
//! ## Storage model
//!
//! The heap is a contiguous slab of 64-bit slots. Storage is a concatenation
//! of records, each `[header | payload...]`. The header packs the record
//! size in slots (including the header itself) and the payload's type
//! registry index. Two sentinel indices mark a record as reserved but not
//! yet constructed, or as moved during a collection.
//!
//! ## Collection
//!
//! The collector is stop-the-world, copying and compacting, and precise:
//! the tracked-handle root set is exact, payload types declare their
//! embedded references through their fixup hook, and everything else is
//! treated as opaque payload bits.
//!
//! A moved-from record keeps its size in the header, its type becomes the
//! forwarded sentinel, and its first payload slot carries the new position.
//! Keeping the size intact lets the commit phase still walk the old storage
//! record-by-record to run destructors on whatever was not moved.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, trace};

use crate::handle::Handle;
use crate::packed::PackedValue;
use crate::registry::{self, HeapType, FORWARDED_TYPE, UNALLOCATED_TYPE};

/// Size of one heap slot in bytes.
pub const SLOT_SIZE: u32 = 8;

/// Upper bound on heap capacity, in slots.
///
/// Packed reference values carry two slot positions in one 64-bit word
/// (24 bits each), so positions must stay below 2^24.
pub const MAX_CAPACITY: u32 = 1 << 24;

/// Round a byte count up to whole slots.
pub const fn bytes_to_slots(bytes: usize) -> u32 {
    ((bytes + SLOT_SIZE as usize - 1) / SLOT_SIZE as usize) as u32
}

#[inline]
fn header_encode(size: u32, type_index: u32) -> u64 {
    (size as u64) | ((type_index as u64) << 32)
}

#[inline]
fn header_size(header: u64) -> u32 {
    header as u32
}

#[inline]
fn header_type(header: u64) -> u32 {
    (header >> 32) as u32
}

#[inline]
fn header_is_active(header: u64) -> bool {
    let t = header_type(header);
    t != UNALLOCATED_TYPE && t != FORWARDED_TYPE
}

/// Heap allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GcError {
    /// The reservation would exceed capacity even after a full collection.
    #[error("out of memory: {needed} slots requested, {available} free of {capacity} after collection")]
    OutOfMemory {
        /// Slots the failed reservation asked for, header included.
        needed: u32,
        /// Free slots after the attempted collection.
        available: u32,
        /// Total heap capacity in slots.
        capacity: u32,
    },
}

/// Insertion-ordered set of live tracked-handle registration slots.
///
/// Handles register on construction and erase on drop. Erase scans from the
/// back: short-lived handles die soon after creation, making the scan
/// amortized O(1) for LIFO workloads.
pub(crate) struct RootSet {
    pub(crate) entries: RefCell<Vec<Rc<Cell<u32>>>>,
}

impl RootSet {
    fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn insert(&self, slot: Rc<Cell<u32>>) {
        self.entries.borrow_mut().push(slot);
    }

    pub(crate) fn erase(&self, slot: &Rc<Cell<u32>>) {
        let mut entries = self.entries.borrow_mut();
        for i in (0..entries.len()).rev() {
            if Rc::ptr_eq(&entries[i], slot) {
                entries.remove(i);
                return;
            }
        }
        debug_assert!(false, "handle not found in root set");
    }
}

/// Deferred position rewrites collected while records are being moved.
///
/// The fixup hook of a freshly moved payload pushes the location of every
/// embedded untracked handle and packed value; the collector drains the
/// queue after the root copy, translating each position through forwarding
/// entries (and moving the target record first when it has not been reached
/// yet). Deferring keeps the collection iterative rather than recursive.
pub struct FixupQueue {
    pending: Vec<Pending>,
}

enum Pending {
    /// A bare slot position embedded in a payload (untracked handle).
    Pos(*mut u32),
    /// A packed value whose payload bits may carry one or two positions.
    Packed(*mut PackedValue),
}

impl FixupQueue {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Queue a bare position field for translation.
    pub fn push_pos(&mut self, pos: &mut u32) {
        self.pending.push(Pending::Pos(pos as *mut u32));
    }

    /// Queue a packed value for translation of its embedded positions.
    pub fn push_packed(&mut self, packed: &mut PackedValue) {
        self.pending.push(Pending::Packed(packed as *mut PackedValue));
    }
}

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

/// A garbage-collected slot heap.
pub struct Heap {
    storage: Box<[u64]>,
    capacity: u32,
    next_free: u32,
    roots: Rc<RootSet>,
    id: u64,
}

impl Heap {
    /// Create a heap with the given capacity in slots.
    ///
    /// Capacity is bounded by [`MAX_CAPACITY`] so that every position fits
    /// in a packed reference value.
    pub fn new(capacity: u32) -> Self {
        assert!(
            capacity <= MAX_CAPACITY,
            "heap capacity {capacity} exceeds {MAX_CAPACITY} slots"
        );
        Self {
            storage: vec![0u64; capacity as usize].into_boxed_slice(),
            capacity,
            next_free: 0,
            roots: Rc::new(RootSet::new()),
            id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Heap capacity in slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far, reclaimed or not.
    pub fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Sum of the sizes of all active records, headers included.
    pub fn calc_used(&self) -> u32 {
        let mut used = 0;
        let mut pos = 0;
        while pos < self.next_free {
            let header = self.storage[pos as usize];
            let size = header_size(header);
            debug_assert!(size >= 2 && pos + size <= self.next_free);
            if header_is_active(header) {
                used += size;
            }
            pos += size;
        }
        used
    }

    /// Allocate and construct a payload, returning a tracked handle to it.
    ///
    /// Equivalent to [`Heap::alloc_with_size`] with the payload's own size.
    pub fn alloc<T: HeapType>(&mut self, value: T) -> Result<Handle<T>, GcError> {
        self.alloc_with_size(std::mem::size_of::<T>(), value)
    }

    /// Allocate `num_bytes` (rounded up to whole slots, at least one) plus a
    /// header slot, move `value` into the payload, and return a tracked
    /// handle. If the reservation would exceed capacity, a full collection
    /// is attempted before failing with [`GcError::OutOfMemory`].
    ///
    /// `value` must not carry untracked positions across this call: a
    /// collection triggered here cannot see fields still on the Rust stack.
    /// Construct with null untracked handles and fill them in through the
    /// returned handle.
    pub fn alloc_with_size<T: HeapType>(
        &mut self,
        num_bytes: usize,
        value: T,
    ) -> Result<Handle<T>, GcError> {
        debug_assert!(num_bytes >= std::mem::size_of::<T>());
        let type_index = registry::register::<T>();
        let payload_slots = bytes_to_slots(num_bytes).max(1);
        let total = payload_slots + 1;

        let header_index = match self.reserve(total) {
            Some(index) => index,
            None => {
                self.garbage_collect();
                self.reserve(total).ok_or(GcError::OutOfMemory {
                    needed: total,
                    available: self.capacity - self.next_free,
                    capacity: self.capacity,
                })?
            }
        };

        // The record is unallocated (reserved, unconstructed) until the
        // payload write completes and the real type index is published.
        self.storage[header_index as usize] = header_encode(total, UNALLOCATED_TYPE);
        let pos = header_index + 1;
        // SAFETY: the reserved payload spans at least `size_of::<T>()`
        // bytes, is slot-aligned (alignment checked at registration), and
        // nothing observes it until the header type is set below.
        unsafe {
            std::ptr::write(self.storage.as_mut_ptr().add(pos as usize).cast::<T>(), value);
        }
        self.storage[header_index as usize] = header_encode(total, type_index);
        Ok(Handle::from_heap(self, pos))
    }

    fn reserve(&mut self, total: u32) -> Option<u32> {
        if self.next_free + total > self.capacity {
            return None;
        }
        let index = self.next_free;
        self.next_free += total;
        Some(index)
    }

    /// Run a stop-the-world copying collection.
    ///
    /// Live records (those reachable from tracked handles) are moved into a
    /// fresh slab in root-set order, every surviving handle and embedded
    /// position is rewritten, and destructors run for whatever was left
    /// behind. Surviving objects keep their observable state but not their
    /// relative addresses.
    pub fn garbage_collect(&mut self) {
        let before = self.calc_used();
        let mut scratch = vec![0u64; self.capacity as usize].into_boxed_slice();

        let roots = Rc::clone(&self.roots);
        let entries = roots.entries.borrow();
        // Snapshot the root count: nothing may register or erase while the
        // collector runs, and the snapshot makes that checkable.
        let keep_count = entries.len();

        let mut collector = Collector {
            old: &mut self.storage[..],
            new: &mut scratch[..],
            next_free: 0,
            queue: FixupQueue::new(),
            depth: 0,
        };
        for root in entries.iter().take(keep_count) {
            let pos = root.get();
            if pos != 0 {
                root.set(collector.gc_move(pos));
            }
        }
        collector.drain();
        let new_next_free = collector.next_free;
        debug_assert_eq!(entries.len(), keep_count, "root set changed during collection");
        drop(entries);

        let old_next_free = std::mem::replace(&mut self.next_free, new_next_free);
        std::mem::swap(&mut self.storage, &mut scratch);
        // `scratch` now holds the old slab; destroy everything that was not
        // moved out of it.
        run_destructors(&mut scratch, old_next_free);

        debug!(
            used_before = before,
            used_after = new_next_free,
            capacity = self.capacity,
            roots = keep_count,
            "garbage collection finished"
        );
    }

    /// One line per record: position, size, and type (or sentinel) name.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        let mut pos = 0;
        while pos < self.next_free {
            let header = self.storage[pos as usize];
            let size = header_size(header);
            let name = match header_type(header) {
                UNALLOCATED_TYPE => "<unallocated>",
                FORWARDED_TYPE => "<forwarded>",
                t => registry::lookup(t).name(),
            };
            writeln!(out, "{:6}: size {:4} {}", pos + 1, size, name).unwrap();
            pos += size;
        }
        writeln!(
            out,
            "{} of {} slots used, {} roots",
            self.next_free,
            self.capacity,
            self.roots.entries.borrow().len()
        )
        .unwrap();
        out
    }

    /// Create a tracked handle from a bare payload position.
    ///
    /// The position must come from a handle or packed value of the same
    /// heap, so that the recorded header type is convertible to `T`; this is
    /// checked in debug builds.
    pub fn handle_from_position<T: HeapType>(&self, pos: u32) -> Handle<T> {
        self.check_payload::<T>(pos);
        Handle::from_heap(self, pos)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn roots(&self) -> &Rc<RootSet> {
        &self.roots
    }

    pub(crate) fn check_payload<T: HeapType>(&self, pos: u32) {
        debug_assert!(pos > 0 && pos < self.next_free, "position {pos} out of bounds");
        debug_assert!(
            registry::is_convertible(
                header_type(self.storage[(pos - 1) as usize]),
                registry::register::<T>()
            ),
            "payload at {pos} is not convertible to {}",
            std::any::type_name::<T>()
        );
    }

    pub(crate) fn payload<T: HeapType>(&self, pos: u32) -> &T {
        self.check_payload::<T>(pos);
        // SAFETY: `pos` addresses a live record whose type is convertible to
        // `T` (checked above); the returned borrow ties the payload to this
        // heap borrow, so it cannot outlive a collection point (collection
        // needs `&mut Heap`).
        unsafe { &*self.storage.as_ptr().add(pos as usize).cast::<T>() }
    }

    pub(crate) fn payload_mut<T: HeapType>(&mut self, pos: u32) -> &mut T {
        self.check_payload::<T>(pos);
        // SAFETY: as in `payload`, plus exclusivity from `&mut self`.
        unsafe { &mut *self.storage.as_mut_ptr().add(pos as usize).cast::<T>() }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        debug_assert!(
            self.roots.entries.borrow().is_empty(),
            "tracked handles still point into a heap being torn down"
        );
        run_destructors(&mut self.storage, self.next_free);
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("capacity", &self.capacity)
            .field("next_free", &self.next_free)
            .field("roots", &self.roots.entries.borrow().len())
            .finish()
    }
}

fn run_destructors(storage: &mut [u64], next_free: u32) {
    let mut pos = 0;
    while pos < next_free {
        let header = storage[pos as usize];
        let size = header_size(header);
        debug_assert!(size >= 2);
        if header_is_active(header) {
            let info = registry::lookup(header_type(header));
            if let Some(destroy) = info.destroy {
                // SAFETY: the record is active, so the payload one slot past
                // the header is a live object of the registered type that
                // has not been destroyed before.
                unsafe { destroy(storage.as_mut_ptr().add(pos as usize + 1).cast::<u8>()) };
            }
            trace!(pos = pos + 1, ty = info.name(), "destroyed record");
        }
        pos += size;
    }
}

struct Collector<'h> {
    old: &'h mut [u64],
    new: &'h mut [u64],
    next_free: u32,
    queue: FixupQueue,
    depth: u32,
}

impl Collector<'_> {
    /// Move the record whose payload starts at `pos` into the new slab,
    /// returning the new payload position. Re-encountering an already moved
    /// record short-circuits through its forwarding entry.
    fn gc_move(&mut self, pos: u32) -> u32 {
        debug_assert!(pos > 0);
        let header_index = (pos - 1) as usize;
        let header = self.old[header_index];
        let size = header_size(header);
        let type_index = header_type(header);
        if type_index == FORWARDED_TYPE {
            return self.old[pos as usize] as u32;
        }
        debug_assert!(type_index != UNALLOCATED_TYPE, "moving an unconstructed record");
        let info = registry::lookup(type_index);

        let new_header_index = self.next_free as usize;
        let new_pos = self.next_free + 1;
        self.next_free += size;
        self.new[new_header_index] = header;

        self.depth += 1;
        // SAFETY: source and destination records are `size - 1` payload
        // slots wide, live in disjoint slabs, and the destination is
        // untouched scratch space.
        unsafe {
            let from = self.old.as_mut_ptr().add(pos as usize).cast::<u8>();
            let to = self.new.as_mut_ptr().add(new_pos as usize).cast::<u8>();
            (info.relocate)(to, from);
            // Raw-copy any trailing slots beyond the typed payload.
            let typed_slots = bytes_to_slots(info.size).max(1);
            let payload_slots = size - 1;
            if payload_slots > typed_slots {
                std::ptr::copy_nonoverlapping(
                    self.old.as_ptr().add(pos as usize + typed_slots as usize),
                    self.new.as_mut_ptr().add(new_pos as usize + typed_slots as usize),
                    (payload_slots - typed_slots) as usize,
                );
            }
        }

        // Forward the old record before running the fixup hook, so a
        // self-referential payload resolves to its own new position.
        self.old[header_index] = header_encode(size, FORWARDED_TYPE);
        self.old[pos as usize] = new_pos as u64;

        if let Some(fixup) = info.fixup {
            // SAFETY: the new payload is fully moved and exclusively ours;
            // the hook only enqueues field locations, which stay valid
            // because the new slab never reallocates.
            unsafe {
                fixup(
                    self.new.as_mut_ptr().add(new_pos as usize).cast::<u8>(),
                    &mut self.queue,
                );
            }
        }
        trace!(from = pos, to = new_pos, ty = info.name(), depth = self.depth, "moved record");
        self.depth -= 1;
        new_pos
    }

    /// Translate every queued position, moving not-yet-reached targets as
    /// they are encountered. Translations may enqueue further fixups; the
    /// loop runs until the queue is dry.
    fn drain(&mut self) {
        while let Some(pending) = self.queue.pending.pop() {
            match pending {
                Pending::Pos(field) => {
                    // SAFETY: the pointer was enqueued by a fixup hook and
                    // points into the new slab, which is stable until the
                    // collector finishes.
                    unsafe {
                        let old_pos = *field;
                        debug_assert!(old_pos != 0, "null position queued for fixup");
                        *field = self.gc_move(old_pos);
                    }
                }
                Pending::Packed(packed) => {
                    // SAFETY: as above; the packed value rewrites its own
                    // embedded positions through the translator.
                    unsafe {
                        (*packed).fixup_positions(&mut |pos| self.gc_move(pos));
                    }
                }
            }
        }
    }
}
