//! Primary field index: extents addressed by textual key.
//!
//! Each instance owns a record file of [`Extent`]s and a B+ tree whose
//! [`PrimaryKey`] entries point back into it by slot id. Slot ids are
//! handed out densely in insertion order and never reused.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use eyre::{ensure, Result};
use zerocopy::FromZeros;

use crate::btree::BplusTree;
use crate::records::{Extent, PrimaryKey};
use crate::storage::Pager;

#[derive(Debug)]
pub struct FieldIndex {
    next_id: i64,
    records: Pager,
    tree: BplusTree<PrimaryKey>,
}

impl FieldIndex {
    pub fn open(index_path: &Path, record_path: &Path, create: bool) -> Result<Self> {
        let index_pager = Rc::new(RefCell::new(Pager::open(index_path, create)?));
        let mut records = Pager::open(record_path, create)?;
        let tree = BplusTree::new(index_pager)?;
        let next_id = records.allocate_id::<Extent>()?;
        Ok(Self {
            next_id,
            records,
            tree,
        })
    }

    /// Saves the extent in the next record slot and indexes it under
    /// `text`.
    pub fn insert(&mut self, extent: Extent, text: &str) -> Result<()> {
        self.records.save(self.next_id, &extent)?;
        self.tree.insert(PrimaryKey::new(text, self.next_id))?;
        self.next_id += 1;
        Ok(())
    }

    /// All entries whose key text begins with `prefix`, in key order,
    /// resolved to their extents.
    pub fn find_prefix(&mut self, prefix: &str) -> Result<Vec<(Extent, String)>> {
        let probe = PrimaryKey::new(prefix, -1);
        let mut cursor = self.tree.find_geq(&probe)?;
        let mut hits = Vec::new();
        while !cursor.is_end() {
            let key = *cursor.key();
            if !key.text_bytes().starts_with(prefix.as_bytes()) {
                break;
            }
            let mut extent = Extent::new_zeroed();
            let found = self.records.recover(key.slot(), &mut extent)?;
            ensure!(
                found,
                "index entry '{}' points at missing record slot {}",
                key.text(),
                key.slot()
            );
            hits.push((extent, key.text().to_string()));
            cursor.advance()?;
        }
        Ok(hits)
    }

    /// Leaf-order debugging dump, capped by the tree.
    pub fn print(&mut self) -> Result<()> {
        self.tree.print()
    }
}
