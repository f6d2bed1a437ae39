//! # Storage Module
//!
//! Fixed-record file storage for bibdex. Every persistent structure in
//! the engine (B+tree nodes, extent records, top-K tallies) is a
//! fixed-size `#[repr(C)]` struct written at `slot * size_of::<R>()`
//! inside a single regular file. The [`Pager`] performs the positional
//! I/O; everything above it thinks in slot indexes, never byte offsets.
//!
//! ## File Model
//!
//! ```text
//! index file (*_idx_*.bin)          record file (*_rec_*.bin)
//! +--------------------------+      +---------+---------+-----
//! | slot 0: TreeHeader (16B  |      | slot 0  | slot 1  | ...
//! |         of a Node-sized  |      +---------+---------+-----
//! |         reserved slot)   |        packed fixed-size records,
//! +--------------------------+        ids handed out densely by
//! | slot 1: root Node        |        Pager::allocate_id
//! +--------------------------+
//! | slot 2..: Node           |
//! +--------------------------+
//! ```
//!
//! ## Serialization
//!
//! Records implement [`DiskRecord`] (a zerocopy trait bundle). Field
//! order is pinned by `#[repr(C)]` and every multi-byte field is a
//! `zerocopy::little_endian` type, so files written by one build are
//! readable by another regardless of host endianness.

mod pager;

pub use pager::Pager;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Marker for types the [`Pager`] can persist: plain-old-data with a
/// pinned little-endian layout and no alignment requirement.
pub trait DiskRecord: FromBytes + IntoBytes + Immutable + KnownLayout + Unaligned {}

impl<T: FromBytes + IntoBytes + Immutable + KnownLayout + Unaligned> DiskRecord for T {}
