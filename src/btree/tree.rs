//! B+ tree operations over a shared pager.
//!
//! The tree owns no file itself: it holds a reference-counted handle to
//! the index-file [`Pager`] so cursors can keep reading leaves after the
//! lookup that produced them returns.
//!
//! ## Insertion
//!
//! Insertion is a recursive descent. When a child comes back overflowed
//! (`count > ORDER`), the parent carves it into two siblings around the
//! partition point and lifts the median: a *leaf* split copies the
//! median into the right sibling (range scans must still find it), an
//! *internal* split moves it up exclusively. A root overflow rewrites
//! page 1 in place as a one-key internal node over two fresh children,
//! so `TreeHeader.root_id` never changes.
//!
//! ## Failure semantics
//!
//! Tree operations never recover from I/O errors: a node slot that
//! cannot be read back in full is a corrupted index and the error
//! propagates to the caller as-is.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

use eyre::{ensure, Result};
use zerocopy::little_endian::I64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::cursor::Cursor;
use super::node::{IndexKey, Node, END_PAGE, MAX_KEYS, SPLIT_POINT};
use crate::storage::Pager;

/// Slot 0 of every index file: the root page id (always 1) and the
/// highest page id allocated so far.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TreeHeader {
    root_id: I64,
    count: I64,
}

impl TreeHeader {
    fn new() -> Self {
        Self {
            root_id: I64::new(1),
            count: I64::new(0),
        }
    }

    pub fn root_id(&self) -> i64 {
        self.root_id.get()
    }

    pub fn count(&self) -> i64 {
        self.count.get()
    }
}

const HEADER_SLOT: i64 = 0;

const _: () = assert!(std::mem::size_of::<TreeHeader>() == 16);

/// Print at most this many entries from the debugging dump.
const PRINT_LIMIT: usize = 64;

enum InsertState {
    Fit,
    Overflow,
}

pub struct BplusTree<K: IndexKey> {
    pager: Rc<RefCell<Pager>>,
    header: TreeHeader,
    _key: PhantomData<K>,
}

impl<K: IndexKey> std::fmt::Debug for BplusTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BplusTree")
            .field("pager", &self.pager)
            .field("header", &self.header)
            .finish()
    }
}

impl<K: IndexKey> BplusTree<K> {
    /// Binds a tree to an index-file pager, initializing slot 0 and the
    /// root when the file is fresh and loading the header otherwise.
    pub fn new(pager: Rc<RefCell<Pager>>) -> Result<Self> {
        let mut header = TreeHeader::new();
        {
            let mut file = pager.borrow_mut();
            if file.is_empty() {
                let root = Node::<K>::new(header.root_id());
                file.save(root.page_id(), &root)?;
                header.count = I64::new(1);
                file.save(HEADER_SLOT, &header)?;
            } else {
                let found = file.recover(HEADER_SLOT, &mut header)?;
                ensure!(
                    found,
                    "missing tree header in '{}'",
                    file.path().display()
                );
            }
        }
        Ok(Self {
            pager,
            header,
            _key: PhantomData,
        })
    }

    /// Cursor at the first entry in key order, or the end sentinel for
    /// an empty tree.
    pub fn begin(&mut self) -> Result<Cursor<K>> {
        let mut node = self.read_node(self.header.root_id())?;
        while !node.is_leaf() {
            node = self.read_node(node.child(0))?;
        }
        if node.count() == 0 {
            return Ok(self.end());
        }
        Ok(Cursor::new(Rc::clone(&self.pager), node, 0))
    }

    /// Cursor at `key` if present, `None` otherwise.
    pub fn find(&mut self, key: &K) -> Result<Option<Cursor<K>>> {
        let cursor = self.find_geq(key)?;
        if !cursor.is_end() && cursor.key().key_cmp(key) == Ordering::Equal {
            Ok(Some(cursor))
        } else {
            Ok(None)
        }
    }

    /// Cursor at the first entry with key `>= key`, or the end sentinel.
    /// Well-defined at leaf boundaries: landing one past the last entry
    /// of a leaf advances into the next leaf in the chain.
    pub fn find_geq(&mut self, key: &K) -> Result<Cursor<K>> {
        let mut node = self.read_node(self.header.root_id())?;
        while !node.is_leaf() {
            let pos = node.upper_bound(key);
            node = self.read_node(node.child(pos))?;
        }
        let pos = node.lower_bound(key);
        let at_boundary = pos == node.count() as usize;
        let mut cursor = Cursor::new(Rc::clone(&self.pager), node, pos as i64);
        if at_boundary {
            cursor.advance()?;
        }
        Ok(cursor)
    }

    /// End sentinel.
    pub fn end(&self) -> Cursor<K> {
        Cursor::new(Rc::clone(&self.pager), Node::new(END_PAGE), 0)
    }

    pub fn insert(&mut self, key: K) -> Result<()> {
        let root = self.read_node(self.header.root_id())?;
        if let InsertState::Overflow = self.insert_into(root, &key)? {
            self.split_root()?;
        }
        Ok(())
    }

    /// Leaf-order dump for debugging, capped at [`PRINT_LIMIT`] entries.
    pub fn print(&mut self) -> Result<()> {
        let mut cursor = self.begin()?;
        let mut shown = 0;
        while !cursor.is_end() {
            if shown == PRINT_LIMIT {
                println!("...");
                println!(
                    "There are more than {} entries, please narrow the lookup.",
                    PRINT_LIMIT
                );
                break;
            }
            shown += 1;
            println!("{:>5} {}", format!("[{}] ", shown), cursor.key().render());
            cursor.advance()?;
        }
        Ok(())
    }

    fn insert_into(&mut self, mut node: Node<K>, key: &K) -> Result<InsertState> {
        let pos = node.upper_bound(key);

        if node.child(pos) != 0 {
            let child = self.read_node(node.child(pos))?;
            if let InsertState::Overflow = self.insert_into(child, key)? {
                self.split_child(&mut node, pos)?;
            }
        } else {
            node.insert_at(pos, key.clone());
            self.write_node(&node)?;
        }

        Ok(if node.is_overflow() {
            InsertState::Overflow
        } else {
            InsertState::Fit
        })
    }

    /// Splits the overflowed child at `parent.children[pos]` in two and
    /// promotes the median into `parent`.
    fn split_child(&mut self, parent: &mut Node<K>, pos: usize) -> Result<()> {
        let overflow = self.read_node(parent.child(pos))?;
        let mut left = overflow.clone();
        left.set_count(0);
        let mut right = self.new_node()?;

        let mut take = 0;
        carve(&overflow, &mut left, &mut take, SPLIT_POINT);
        parent.insert_at(pos, overflow.key(take).clone());

        if overflow.is_leaf() {
            // The median stays in the right leaf; link it into the chain.
            right.set_right(left.right());
            left.set_right(right.page_id());
        } else {
            take += 1;
        }
        carve(&overflow, &mut right, &mut take, MAX_KEYS);

        parent.set_child(pos, left.page_id());
        parent.set_child(pos + 1, right.page_id());
        self.write_node(parent)?;
        self.write_node(&left)?;
        self.write_node(&right)
    }

    /// Rewrites the overflowed root in place as a single-key internal
    /// node over two fresh children; the root's page id is stable.
    fn split_root(&mut self) -> Result<()> {
        let overflow = self.read_node(self.header.root_id())?;
        let mut left = self.new_node()?;
        let mut right = self.new_node()?;
        let mut root = overflow.clone();

        let mut take = 0;
        carve(&overflow, &mut left, &mut take, SPLIT_POINT);
        root.set_key(0, overflow.key(take).clone());

        if overflow.is_leaf() {
            left.set_right(right.page_id());
        } else {
            take += 1;
        }
        carve(&overflow, &mut right, &mut take, MAX_KEYS);

        root.set_count(1);
        root.set_right(0);
        root.set_child(0, left.page_id());
        root.set_child(1, right.page_id());
        self.write_node(&root)?;
        self.write_node(&left)?;
        self.write_node(&right)
    }

    /// Allocates the next page id and persists the header that records it.
    fn new_node(&mut self) -> Result<Node<K>> {
        let page_id = self.header.count() + 1;
        self.header.count = I64::new(page_id);
        self.pager.borrow_mut().save(HEADER_SLOT, &self.header)?;
        Ok(Node::new(page_id))
    }

    fn read_node(&self, page_id: i64) -> Result<Node<K>> {
        read_node(&self.pager, page_id)
    }

    fn write_node(&mut self, node: &Node<K>) -> Result<()> {
        self.pager.borrow_mut().save(node.page_id(), node)
    }
}

/// Copies entries (and their left-hand children) from `src` into `dst`
/// until `take` reaches `upto`, then carries the trailing child pointer.
fn carve<K: IndexKey>(src: &Node<K>, dst: &mut Node<K>, take: &mut usize, upto: usize) {
    let mut at = 0;
    while *take < upto {
        dst.set_child(at, src.child(*take));
        dst.set_key(at, src.key(*take).clone());
        dst.set_count(dst.count() + 1);
        *take += 1;
        at += 1;
    }
    dst.set_child(at, src.child(*take));
}

pub(crate) fn read_node<K: IndexKey>(
    pager: &Rc<RefCell<Pager>>,
    page_id: i64,
) -> Result<Node<K>> {
    let mut node = Node::<K>::new(END_PAGE);
    let mut file = pager.borrow_mut();
    let found = file.recover(page_id, &mut node)?;
    ensure!(
        found,
        "missing node at page {} in '{}'",
        page_id,
        file.path().display()
    );
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::ORDER;
    use tempfile::{tempdir, TempDir};
    use zerocopy::little_endian::U64;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
    struct NumKey {
        value: U64,
        slot: I64,
    }

    impl NumKey {
        fn of(value: u64) -> Self {
            Self::tagged(value, -1)
        }

        fn tagged(value: u64, slot: i64) -> Self {
            Self {
                value: U64::new(value),
                slot: I64::new(slot),
            }
        }
    }

    impl IndexKey for NumKey {
        fn key_cmp(&self, other: &Self) -> Ordering {
            self.value.get().cmp(&other.value.get())
        }

        fn render(&self) -> String {
            self.value.get().to_string()
        }
    }

    fn fresh_tree() -> (TempDir, BplusTree<NumKey>) {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("t_idx.bin"), true).unwrap();
        let tree = BplusTree::new(Rc::new(RefCell::new(pager))).unwrap();
        (dir, tree)
    }

    fn collect(tree: &mut BplusTree<NumKey>) -> Vec<u64> {
        let mut out = Vec::new();
        let mut cursor = tree.begin().unwrap();
        while !cursor.is_end() {
            out.push(cursor.key().value.get());
            cursor.advance().unwrap();
        }
        out
    }

    /// Walks every node checking the §8 structural invariants: fill
    /// bounds on non-root nodes, key partitioning, and the leaf chain.
    fn check_invariants(tree: &BplusTree<NumKey>) {
        fn walk(
            tree: &BplusTree<NumKey>,
            page_id: i64,
            is_root: bool,
            low: Option<u64>,
            high: Option<u64>,
            leaves: &mut Vec<i64>,
        ) {
            let node = tree.read_node(page_id).unwrap();
            let count = node.count() as usize;
            assert!(count <= ORDER, "node {} overfull: {}", page_id, count);
            if !is_root {
                assert!(
                    count >= ORDER.div_ceil(2),
                    "node {} underfull: {}",
                    page_id,
                    count
                );
            }
            for at in 1..count {
                assert!(node.key(at - 1).value.get() <= node.key(at).value.get());
            }
            // Duplicate runs may leave separator-equal keys in the left
            // subtree, so the upper fence is inclusive.
            if count > 0 {
                if let Some(low) = low {
                    assert!(node.key(0).value.get() >= low);
                }
                if let Some(high) = high {
                    assert!(node.key(count - 1).value.get() <= high);
                }
            }
            if node.is_leaf() {
                leaves.push(page_id);
                return;
            }
            assert_eq!(node.right(), 0, "internal node {} in leaf chain", page_id);
            for at in 0..=count {
                let child_low = if at == 0 {
                    low
                } else {
                    Some(node.key(at - 1).value.get())
                };
                let child_high = if at == count {
                    high
                } else {
                    Some(node.key(at).value.get())
                };
                walk(tree, node.child(at), false, child_low, child_high, leaves);
            }
        }

        let mut leaves = Vec::new();
        walk(tree, tree.header.root_id(), true, None, None, &mut leaves);

        // The right pointers must thread the leaves in key order.
        let mut chained = Vec::new();
        let mut node = tree.read_node(tree.header.root_id()).unwrap();
        while !node.is_leaf() {
            node = tree.read_node(node.child(0)).unwrap();
        }
        loop {
            chained.push(node.page_id());
            if node.right() == 0 {
                break;
            }
            node = tree.read_node(node.right()).unwrap();
        }
        assert_eq!(chained, leaves);
    }

    #[test]
    fn empty_tree_begins_at_end() {
        let (_dir, mut tree) = fresh_tree();
        assert!(tree.begin().unwrap().is_end());
        assert!(tree.find(&NumKey::of(1)).unwrap().is_none());
        assert!(tree.find_geq(&NumKey::of(1)).unwrap().is_end());
    }

    #[test]
    fn find_hits_only_inserted_keys() {
        let (_dir, mut tree) = fresh_tree();
        for v in [5u64, 3, 9, 1, 7] {
            tree.insert(NumKey::of(v)).unwrap();
        }
        for v in [1u64, 3, 5, 7, 9] {
            let cursor = tree.find(&NumKey::of(v)).unwrap().unwrap();
            assert_eq!(cursor.key().value.get(), v);
        }
        for v in [0u64, 2, 4, 6, 8, 10] {
            assert!(tree.find(&NumKey::of(v)).unwrap().is_none());
        }
    }

    #[test]
    fn ascending_inserts_iterate_in_order() {
        let (_dir, mut tree) = fresh_tree();
        for v in 0..500u64 {
            tree.insert(NumKey::of(v)).unwrap();
        }
        assert_eq!(collect(&mut tree), (0..500).collect::<Vec<_>>());
        check_invariants(&tree);
    }

    #[test]
    fn descending_inserts_iterate_in_order() {
        let (_dir, mut tree) = fresh_tree();
        for v in (0..500u64).rev() {
            tree.insert(NumKey::of(v)).unwrap();
        }
        assert_eq!(collect(&mut tree), (0..500).collect::<Vec<_>>());
        check_invariants(&tree);
    }

    #[test]
    fn interleaved_inserts_iterate_in_order() {
        let (_dir, mut tree) = fresh_tree();
        // Strided order touches every leaf repeatedly between splits.
        for stride in 0..7u64 {
            for v in (stride..700).step_by(7) {
                tree.insert(NumKey::of(v)).unwrap();
            }
        }
        assert_eq!(collect(&mut tree), (0..700).collect::<Vec<_>>());
        check_invariants(&tree);
    }

    #[test]
    fn find_geq_walks_the_upper_half() {
        let (_dir, mut tree) = fresh_tree();
        for v in 0..500u64 {
            tree.insert(NumKey::of(v)).unwrap();
        }
        let mut cursor = tree.find_geq(&NumKey::of(250)).unwrap();
        let mut seen = Vec::new();
        while !cursor.is_end() {
            seen.push(cursor.key().value.get());
            cursor.advance().unwrap();
        }
        assert_eq!(seen, (250..500).collect::<Vec<_>>());
    }

    #[test]
    fn find_geq_lands_past_a_gap() {
        let (_dir, mut tree) = fresh_tree();
        for v in (0..200u64).map(|v| v * 2) {
            tree.insert(NumKey::of(v)).unwrap();
        }
        let cursor = tree.find_geq(&NumKey::of(151)).unwrap();
        assert_eq!(cursor.key().value.get(), 152);

        let cursor = tree.find_geq(&NumKey::of(399)).unwrap();
        assert!(cursor.is_end());
    }

    #[test]
    fn duplicates_keep_insertion_order() {
        let (_dir, mut tree) = fresh_tree();
        for slot in 0..10 {
            tree.insert(NumKey::tagged(42, slot)).unwrap();
        }
        tree.insert(NumKey::of(41)).unwrap();
        tree.insert(NumKey::of(43)).unwrap();

        let mut cursor = tree.find_geq(&NumKey::of(42)).unwrap();
        let mut slots = Vec::new();
        while !cursor.is_end() && cursor.key().value.get() == 42 {
            slots.push(cursor.key().slot.get());
            cursor.advance().unwrap();
        }
        assert_eq!(slots, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn duplicates_survive_splits_in_order() {
        let (_dir, mut tree) = fresh_tree();
        for slot in 0..300 {
            tree.insert(NumKey::tagged(7, slot)).unwrap();
        }
        let mut cursor = tree.find_geq(&NumKey::of(6)).unwrap();
        let mut slots = Vec::new();
        while !cursor.is_end() {
            slots.push(cursor.key().slot.get());
            cursor.advance().unwrap();
        }
        assert_eq!(slots, (0..300).collect::<Vec<_>>());
        check_invariants(&tree);
    }

    #[test]
    fn reopen_preserves_every_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t_idx.bin");
        {
            let pager = Pager::open(&path, true).unwrap();
            let mut tree = BplusTree::new(Rc::new(RefCell::new(pager))).unwrap();
            for v in 0..300u64 {
                tree.insert(NumKey::of(v)).unwrap();
            }
        }
        let pager = Pager::open(&path, false).unwrap();
        let mut tree = BplusTree::new(Rc::new(RefCell::new(pager))).unwrap();
        assert_eq!(collect(&mut tree), (0..300).collect::<Vec<_>>());
        tree.insert(NumKey::of(300)).unwrap();
        assert_eq!(collect(&mut tree).len(), 301);
    }

    #[test]
    fn root_page_never_moves() {
        let (_dir, mut tree) = fresh_tree();
        for v in 0..5000u64 {
            tree.insert(NumKey::of(v)).unwrap();
        }
        assert_eq!(tree.header.root_id(), 1);
        check_invariants(&tree);
    }
}
