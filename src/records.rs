//! # On-Disk Record Types
//!
//! The four fixed-size records the engine persists, plus the text
//! normalization and token hashing they depend on. Layouts are pinned
//! little-endian `#[repr(C)]`; the size asserts below are the on-disk
//! contract.
//!
//! | Type         | Size | File                 | Ordered by |
//! |--------------|------|----------------------|------------|
//! | `Extent`     | 8    | `*_rec_*`, `*_ii_rec`| (payload)  |
//! | `PrimaryKey` | 72   | author/title index   | text       |
//! | `HashedKey`  | 16   | inverted/top-K index | hash       |
//! | `TopKRecord` | 68   | `*_topk_rec`         | count      |

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::mem::size_of;

use xxhash_rust::xxh3::xxh3_64;
use zerocopy::little_endian::{I64, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::IndexKey;

/// Fixed width of textual key fields.
pub const KEY_LEN: usize = 64;

/// Longer text is cut here and finished with `...`.
const KEY_TRUNCATE_AT: usize = KEY_LEN - 3;

/// A `(pos, len)` byte range into the ingested source document.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Extent {
    pos: U32,
    len: U32,
}

const _: () = assert!(size_of::<Extent>() == 8);

impl Extent {
    pub fn new(pos: u32, len: u32) -> Self {
        Self {
            pos: U32::new(pos),
            len: U32::new(len),
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos.get()
    }

    pub fn len(&self) -> u32 {
        self.len.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }
}

impl fmt::Debug for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pos.get(), self.len.get())
    }
}

/// Key of the author/title trees: NUL-padded text plus the record slot
/// the entry points at. Only the text participates in ordering.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PrimaryKey {
    text: [u8; KEY_LEN],
    slot: I64,
}

const _: () = assert!(size_of::<PrimaryKey>() == 72);

impl PrimaryKey {
    pub fn new(text: &str, slot: i64) -> Self {
        let clamped = truncate_text(text);
        let bytes = clamped.as_bytes();
        let mut padded = [0u8; KEY_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);
        Self {
            text: padded,
            slot: I64::new(slot),
        }
    }

    /// Text bytes up to the first NUL, the unit of comparison.
    pub fn text_bytes(&self) -> &[u8] {
        let end = self
            .text
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(KEY_LEN);
        &self.text[..end]
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(self.text_bytes()).unwrap_or("")
    }

    pub fn slot(&self) -> i64 {
        self.slot.get()
    }
}

impl fmt::Debug for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimaryKey({:?} @ {})", self.text(), self.slot.get())
    }
}

impl IndexKey for PrimaryKey {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.text_bytes().cmp(other.text_bytes())
    }

    fn render(&self) -> String {
        self.text().to_string()
    }
}

/// Key of the inverted and top-K dedupe trees: a token hash plus the
/// posting slot it points at. Only the hash participates in ordering.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct HashedKey {
    hash: U64,
    slot: I64,
}

const _: () = assert!(size_of::<HashedKey>() == 16);

impl HashedKey {
    pub fn new(hash: u64, slot: i64) -> Self {
        Self {
            hash: U64::new(hash),
            slot: I64::new(slot),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash.get()
    }

    pub fn slot(&self) -> i64 {
        self.slot.get()
    }
}

impl fmt::Debug for HashedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedKey({:#018x} @ {})", self.hash.get(), self.slot.get())
    }
}

impl IndexKey for HashedKey {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.hash.get().cmp(&other.hash.get())
    }

    fn render(&self) -> String {
        format!("{:#018x}", self.hash.get())
    }
}

/// One author tally in the top-K record file, ordered by count.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TopKRecord {
    count: U32,
    name: [u8; KEY_LEN],
}

const _: () = assert!(size_of::<TopKRecord>() == 68);

impl TopKRecord {
    pub fn new(count: u32, name: &str) -> Self {
        let clamped = truncate_text(name);
        let bytes = clamped.as_bytes();
        let mut padded = [0u8; KEY_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);
        Self {
            count: U32::new(count),
            name: padded,
        }
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn bump(&mut self) {
        self.count = U32::new(self.count.get() + 1);
    }

    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(KEY_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

impl fmt::Debug for TopKRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.count.get())
    }
}

impl PartialEq for TopKRecord {
    fn eq(&self, other: &Self) -> bool {
        self.count.get() == other.count.get()
    }
}

impl Eq for TopKRecord {}

impl PartialOrd for TopKRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TopKRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count.get().cmp(&other.count.get())
    }
}

/// Deterministic 64-bit token hash. Any stable hash would do; xxh3 is
/// used for every token and author name in the engine.
pub fn token_hash(token: &str) -> u64 {
    xxh3_64(token.as_bytes())
}

/// Trims surrounding whitespace and clamps the text to [`KEY_LEN`]
/// bytes, replacing the tail with `...` on a UTF-8 boundary.
pub fn truncate_text(text: &str) -> Cow<'_, str> {
    let text = text.trim();
    if text.len() <= KEY_LEN {
        return Cow::Borrowed(text);
    }
    let mut cut = KEY_TRUNCATE_AT;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(format!("{}...", &text[..cut]))
}
