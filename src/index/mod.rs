//! # Index Layer
//!
//! The three query-facing subsystems, each pairing a B+ tree over an
//! index file with a record file of fixed-size payloads:
//!
//! - [`FieldIndex`]: one per textual field (author, title); tree keyed
//!   by [`PrimaryKey`](crate::records::PrimaryKey), record file of
//!   extents, prefix lookup.
//! - [`InvertedIndex`]: one shared tree keyed by token hash; posting
//!   lists are implicit in the tree's ordered adjacency.
//! - [`TopK`]: author tallies deduplicated through a hash tree, ranked
//!   with a bounded min-heap.

mod inverted;
mod primary;
mod topk;

pub use inverted::InvertedIndex;
pub use primary::FieldIndex;
pub use topk::TopK;

/// The two textual fields carried by every bibliographic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Author,
    Title,
}
