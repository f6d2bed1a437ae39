//! Inverted index over whitespace tokens.
//!
//! Every token occurrence saves one extent slot and one
//! `HashedKey(hash, slot)` tree entry, so a token's posting list is the
//! run of equal-hash entries in the tree. Lookups probe at `hash - 1`
//! (a strictly smaller key cannot be routed past equal separators),
//! skip forward to the target hash, and collect the run.
//!
//! Distinct tokens sharing a hash conflate their postings; fuzzy search
//! is best-effort and the caller shows the referenced source region for
//! the user to judge.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use eyre::{ensure, Result};
use hashbrown::HashSet;
use zerocopy::FromZeros;

use crate::btree::BplusTree;
use crate::records::{token_hash, Extent, HashedKey};
use crate::storage::Pager;

#[derive(Debug)]
pub struct InvertedIndex {
    next_id: i64,
    records: Pager,
    tree: BplusTree<HashedKey>,
}

impl InvertedIndex {
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

    /// Indexes every whitespace token of `text` under `extent`.
    pub fn build(&mut self, text: &str, extent: Extent) -> Result<()> {
        for token in text.split_whitespace() {
            self.records.save(self.next_id, &extent)?;
            self.tree
                .insert(HashedKey::new(token_hash(token), self.next_id))?;
            self.next_id += 1;
        }
        Ok(())
    }

    /// Extents matched by *all* query tokens, ordered by `(pos, len)`.
    pub fn find(&mut self, tokens: &[String]) -> Result<Vec<(Extent, String)>> {
        let mut sets = Vec::with_capacity(tokens.len());
        for token in tokens {
            sets.push(self.postings(token)?);
        }
        let Some(mut matched) = sets.pop() else {
            return Ok(Vec::new());
        };
        for set in &sets {
            matched.retain(|extent| set.contains(extent));
        }

        let mut ordered: Vec<(u32, u32)> = matched.into_iter().collect();
        ordered.sort_unstable();
        Ok(ordered
            .into_iter()
            .map(|(pos, len)| (Extent::new(pos, len), String::new()))
            .collect())
    }

    /// The set of extents indexed under one token's hash.
    fn postings(&mut self, token: &str) -> Result<HashSet<(u32, u32)>> {
        let target = token_hash(token);
        let probe = HashedKey::new(target.wrapping_sub(1), -1);
        let mut cursor = self.tree.find_geq(&probe)?;
        let mut found = HashSet::new();

        while !cursor.is_end() && cursor.key().hash() < target {
            cursor.advance()?;
        }
        while !cursor.is_end() && cursor.key().hash() == target {
            let slot = cursor.key().slot();
            let mut extent = Extent::new_zeroed();
            let present = self.records.recover(slot, &mut extent)?;
            ensure!(present, "posting points at missing record slot {}", slot);
            found.insert((extent.pos(), extent.len()));
            cursor.advance()?;
        }
        Ok(found)
    }
}
