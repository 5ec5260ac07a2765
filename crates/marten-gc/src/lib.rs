//! # Marten GC
//!
//! Moving, compacting, precisely-tracked heap for the Marten interpreter.
//!
//! ## Design
//!
//! - **Slot heap**: storage is a slab of 64-bit slots; allocation is a bump
//!   pointer over `[header | payload]` records
//! - **Copying collection**: stop-the-world, root set of tracked handles,
//!   forwarded headers, move-then-fixup ordering
//! - **Type registry**: process-wide catalogue of destroy/move/fixup hooks,
//!   append-only after first registration per type
//! - **Packed values**: a NaN-boxed one-slot encoding whose embedded heap
//!   positions the collector knows how to rewrite
//!
//! The heap is single-threaded by design: handles are neither `Send` nor
//! `Sync`, and nothing here blocks or suspends.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod handle;
pub mod heap;
pub mod packed;
pub mod registry;

pub use handle::{Handle, UntrackedHandle};
pub use heap::{bytes_to_slots, FixupQueue, GcError, Heap, MAX_CAPACITY, SLOT_SIZE};
pub use packed::{PackedKind, PackedValue};
pub use registry::{is_convertible, lookup, register, HeapType, TypeInfo};
