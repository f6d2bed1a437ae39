//! Streaming top-K over author occurrence counts.
//!
//! A dedupe tree maps `hash(name)` to the slot of that author's
//! [`TopKRecord`]; bumping an author rewrites the tally in place.
//! Ranking streams the whole record file once through a min-heap capped
//! at `n` entries, so memory stays bounded no matter how many distinct
//! authors accumulated.
//!
//! Collision policy: one tally per hash bucket is the intent. A
//! colliding name whose stored spelling differs starts its own entry,
//! and later bumps land on whichever entry the tree surfaces first.
//! This is an accepted limitation, not an error.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use std::rc::Rc;

use eyre::{ensure, Result};
use zerocopy::FromZeros;

use crate::btree::BplusTree;
use crate::records::{token_hash, HashedKey, TopKRecord};
use crate::storage::Pager;

#[derive(Debug)]
pub struct TopK {
    next_id: i64,
    records: Pager,
    tree: BplusTree<HashedKey>,
    retained: Vec<TopKRecord>,
}

impl TopK {
    pub fn open(index_path: &Path, record_path: &Path, create: bool) -> Result<Self> {
        let index_pager = Rc::new(RefCell::new(Pager::open(index_path, create)?));
        let mut records = Pager::open(record_path, create)?;
        let tree = BplusTree::new(index_pager)?;
        let next_id = records.allocate_id::<TopKRecord>()?;
        Ok(Self {
            next_id,
            records,
            tree,
            retained: Vec::new(),
        })
    }

    /// Counts one occurrence of `name`. A lookup miss means no prior
    /// entry and starts a fresh tally.
    pub fn bump(&mut self, name: &str) -> Result<()> {
        let hash = token_hash(name);
        let probe = HashedKey::new(hash, -1);

        if let Some(cursor) = self.tree.find(&probe)? {
            let slot = cursor.key().slot();
            let mut tally = TopKRecord::new_zeroed();
            let present = self.records.recover(slot, &mut tally)?;
            ensure!(present, "tally entry points at missing record slot {}", slot);
            if tally.name() == name {
                tally.bump();
                return self.records.save(slot, &tally);
            }
            // Hash collision with a different spelling: own entry.
        }
        self.start_tally(hash, name)
    }

    fn start_tally(&mut self, hash: u64, name: &str) -> Result<()> {
        self.records.save(self.next_id, &TopKRecord::new(1, name))?;
        self.tree.insert(HashedKey::new(hash, self.next_id))?;
        self.next_id += 1;
        Ok(())
    }

    /// Streams the record file, retaining the `n` highest tallies.
    pub fn make_topk(&mut self, n: usize) -> Result<()> {
        let total = self.records.allocate_id::<TopKRecord>()?;
        let mut heap: BinaryHeap<Reverse<TopKRecord>> = BinaryHeap::with_capacity(n + 1);
        for slot in 0..total {
            let mut tally = TopKRecord::new_zeroed();
            let present = self.records.recover(slot, &mut tally)?;
            ensure!(present, "tally record file truncated at slot {}", slot);
            heap.push(Reverse(tally));
            while heap.len() > n {
                heap.pop();
            }
        }
        let mut kept: Vec<TopKRecord> = heap.into_iter().map(|entry| entry.0).collect();
        kept.sort_unstable_by(|a, b| b.cmp(a));
        self.retained = kept;
        Ok(())
    }

    /// The top `k` of the retained tallies, highest count first.
    /// Meaningful for `k` up to the `n` passed to [`TopK::make_topk`].
    pub fn top(&self, k: usize) -> Vec<(String, u32)> {
        self.retained
            .iter()
            .take(k)
            .map(|tally| (tally.name().to_string(), tally.count()))
            .collect()
    }
}
