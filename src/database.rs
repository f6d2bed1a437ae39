//! # Database Engine
//!
//! The explicit engine value tying the four index subsystems together.
//! One `Database` owns everything belonging to one named on-disk
//! database; opening acquires all eight files, dropping releases them,
//! and releasing the handles is all the flushing the format requires.
//!
//! ## On-disk layout
//!
//! For a database `N` under base directory `dir`:
//!
//! ```text
//! dir/N/N_idx_title.bin    dir/N/N_rec_title.bin
//! dir/N/N_idx_author.bin   dir/N/N_rec_author.bin
//! dir/N/N_ii_idx.bin       dir/N/N_ii_rec.bin
//! dir/N/N_topk_idx.bin     dir/N/N_topk_rec.bin
//! ```
//!
//! The engine is single-threaded and synchronous: every call returns
//! with its writes handed to the OS or with an error. The
//! one-open-database-at-a-time rule is the CLI's to enforce; the engine
//! does not revalidate it.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::error::DbError;
use crate::index::{Field, FieldIndex, InvertedIndex, TopK};
use crate::ingest::{IngestStats, Ingestor, XmlScanner};
use crate::records::Extent;

/// Base directory used by the CLI when none is given.
pub const DEFAULT_BASE_DIR: &str = "database";

#[derive(Debug)]
pub struct Database {
    name: String,
    pub(crate) author: FieldIndex,
    pub(crate) title: FieldIndex,
    pub(crate) inverted: InvertedIndex,
    pub(crate) topk: TopK,
}

impl Database {
    /// Creates the directory and all eight files of a fresh database.
    pub fn create(base: &Path, name: &str) -> Result<Self> {
        let dir = base.join(name);
        if dir.exists() {
            return Err(DbError::Exists(name.to_string()).into());
        }
        fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("failed to create directory '{}'", dir.display()))?;
        Self::open_files(base, name, true)
    }

    /// Opens an existing database; every file must be present.
    pub fn open(base: &Path, name: &str) -> Result<Self> {
        Self::open_files(base, name, false)
    }

    fn open_files(base: &Path, name: &str, create: bool) -> Result<Self> {
        let dir = base.join(name);
        let file = |suffix: &str| -> PathBuf { dir.join(format!("{}_{}.bin", name, suffix)) };

        let title = FieldIndex::open(&file("idx_title"), &file("rec_title"), create)?;
        let author = FieldIndex::open(&file("idx_author"), &file("rec_author"), create)?;
        let inverted = InvertedIndex::open(&file("ii_idx"), &file("ii_rec"), create)?;
        let topk = TopK::open(&file("topk_idx"), &file("topk_rec"), create)?;

        Ok(Self {
            name: name.to_string(),
            author,
            title,
            inverted,
            topk,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexes `text` under `field`, pointing at `extent`.
    pub fn insert(&mut self, field: Field, extent: Extent, text: &str) -> Result<()> {
        self.field_index(field).insert(extent, text)
    }

    /// Prefix lookup in one field's tree.
    pub fn find(&mut self, field: Field, prefix: &str) -> Result<Vec<(Extent, String)>> {
        if prefix.is_empty() {
            return Err(DbError::EmptyInquiry.into());
        }
        self.field_index(field).find_prefix(prefix)
    }

    /// Fuzzy multi-word lookup: extents matched by every token.
    pub fn search(&mut self, tokens: &[String]) -> Result<Vec<(Extent, String)>> {
        if tokens.is_empty() || tokens.iter().all(|token| token.trim().is_empty()) {
            return Err(DbError::EmptyInquiry.into());
        }
        self.inverted.find(tokens)
    }

    /// The `k` most frequent authors, highest count first.
    pub fn top(&mut self, k: usize) -> Result<Vec<(String, u32)>> {
        self.topk.make_topk(k)?;
        Ok(self.topk.top(k))
    }

    /// Leaf-order debugging dump of one field's tree.
    pub fn select(&mut self, field: Field) -> Result<()> {
        self.field_index(field).print()
    }

    /// Ingests a whole XML document through the scanner and adaptor.
    pub fn ingest_xml(&mut self, path: &Path) -> Result<IngestStats> {
        let source = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read '{}'", path.display()))?;
        let mut scanner = XmlScanner::new(&source);
        let mut ingestor = Ingestor::new(self);
        while let Some(event) = scanner.next_event()? {
            ingestor.handle(&event)?;
        }
        Ok(ingestor.stats())
    }

    /// Releases every file handle. Dropping does the same; this form
    /// surfaces the close in the caller's control flow.
    pub fn close(self) {}

    fn field_index(&mut self, field: Field) -> &mut FieldIndex {
        match field {
            Field::Author => &mut self.author,
            Field::Title => &mut self.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_same_directory() {
        let dir = tempdir().unwrap();
        Database::create(dir.path(), "t1").unwrap().close();

        let db = Database::open(dir.path(), "t1").unwrap();
        assert_eq!(db.name(), "t1");
    }

    #[test]
    fn create_refuses_an_existing_database() {
        let dir = tempdir().unwrap();
        Database::create(dir.path(), "t1").unwrap().close();

        let err = Database::create(dir.path(), "t1").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::Exists("t1".to_string()))
        );
    }

    #[test]
    fn open_missing_database_names_the_first_file() {
        let dir = tempdir().unwrap();
        let err = Database::open(dir.path(), "t2").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::NotExist("t2_idx_title.bin".to_string()))
        );
    }

    #[test]
    fn empty_queries_are_rejected() {
        let dir = tempdir().unwrap();
        let mut db = Database::create(dir.path(), "t1").unwrap();

        let err = db.find(Field::Author, "").unwrap_err();
        assert_eq!(err.downcast_ref::<DbError>(), Some(&DbError::EmptyInquiry));

        let err = db.search(&[]).unwrap_err();
        assert_eq!(err.downcast_ref::<DbError>(), Some(&DbError::EmptyInquiry));
    }

    #[test]
    fn layout_matches_the_documented_file_names() {
        let dir = tempdir().unwrap();
        Database::create(dir.path(), "lib").unwrap().close();
        for suffix in [
            "idx_title",
            "rec_title",
            "idx_author",
            "rec_author",
            "ii_idx",
            "ii_rec",
            "topk_idx",
            "topk_rec",
        ] {
            let path = dir.path().join("lib").join(format!("lib_{}.bin", suffix));
            assert!(path.exists(), "missing {}", path.display());
        }
    }
}
