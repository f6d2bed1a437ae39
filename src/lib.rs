//! # bibdex: Disk-Backed Bibliographic Database
//!
//! bibdex ingests a stream of bibliographic records (author and title
//! text plus the byte extent of each record in its source document) and
//! answers four query families: exact/prefix lookup by author or title,
//! fuzzy multi-word search across all fields, and top-K
//! author-by-frequency ranking.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bibdex::{Database, Field};
//! use std::path::Path;
//!
//! let mut db = Database::create(Path::new("database"), "dblp")?;
//! db.ingest_xml(Path::new("xml/dump.xml"))?;
//!
//! let hits = db.find(Field::Author, "Knu")?;
//! let fuzzy = db.search(&["graph".into(), "algorithm".into()])?;
//! let ranked = db.top(10)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        CLI (bin/bibdex, REPL)       │
//! ├─────────────────────────────────────┤
//! │        Engine (Database)            │
//! ├──────────┬──────────┬───────────────┤
//! │ primary  │ inverted │  top-K ranker │
//! │ indexes  │  index   │               │
//! ├──────────┴──────────┴───────────────┤
//! │        B+ tree (ORDER = 64)         │
//! ├─────────────────────────────────────┤
//! │     fixed-record pager (file I/O)   │
//! └─────────────────────────────────────┘
//! ```
//!
//! Ingestion flows the other way: the XML scanner produces element
//! events, the [`ingest::Ingestor`] turns them into
//! `(field, key, extent)` tuples and routes each into the primary trees,
//! the inverted index, and the author tally.
//!
//! ## Module Overview
//!
//! - [`storage`]: fixed-record pager over a single file
//! - [`btree`]: on-disk B+ tree, cursors, leaf-chain iteration
//! - [`records`]: the pinned-layout record and key types
//! - [`index`]: primary field indexes, inverted index, top-K ranker
//! - [`ingest`]: parser events, ingestion adaptor, XML scanner
//! - [`database`]: the engine value binding one on-disk database
//! - [`cli`]: interactive command line
//!
//! The engine is single-threaded and synchronous throughout; there is no
//! background work, no locking, and no durability machinery beyond
//! closing files.

pub mod btree;
pub mod cli;
pub mod database;
pub mod error;
pub mod index;
pub mod ingest;
pub mod records;
pub mod storage;

pub use database::{Database, DEFAULT_BASE_DIR};
pub use error::DbError;
pub use index::Field;
pub use records::Extent;
