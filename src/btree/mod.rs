//! # On-Disk B+ Tree
//!
//! An ordered map persisted through a [`Pager`](crate::storage::Pager),
//! parameterized by the key record type. All four index trees in the
//! engine (author, title, inverted, top-K dedupe) are instances of the
//! same [`BplusTree`] with a different [`IndexKey`].
//!
//! ## Layout
//!
//! Every node occupies one fixed-size slot of the index file. Slot 0 is
//! reserved: its first 16 bytes are the [`TreeHeader`] `(root_id,
//! count)`. Slot 1 holds the initial root, and the root never moves;
//! when it splits, its slot is rewritten as a single-key internal node
//! over two freshly allocated children.
//!
//! ```text
//!                 [page 1: internal]          TreeHeader.root_id == 1
//!                 /        |       \          TreeHeader.count == max page id
//!        [page 4]     [page 2]    [page 3]
//!           |----------->|----------->|       leaf chain via Node.right
//! ```
//!
//! ## Ordering
//!
//! Keys carry satellite data (a record slot id) that never participates
//! in comparison; [`IndexKey::key_cmp`] compares the key part only.
//! Duplicates are allowed and keep insertion order: position scans stop
//! at the first *strictly greater* key, so a new duplicate lands after
//! its equals.

mod cursor;
mod node;
mod tree;

pub use cursor::Cursor;
pub use node::{IndexKey, Node, ORDER};
pub use tree::{BplusTree, TreeHeader};
