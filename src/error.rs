//! # Error Taxonomy
//!
//! Typed errors for everything the engine can refuse to do. These are
//! carried inside `eyre::Report` like any other error; callers that need
//! to branch on a specific failure (the CLI's "create it now?" flow, the
//! corrupt-file removal offer) recover the variant with
//! `report.downcast_ref::<DbError>()`.
//!
//! Short reads inside index files are deliberately *not* part of this
//! taxonomy: a truncated node is a corrupted index and surfaces as a
//! plain fatal report.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    /// An index or record file was missing when opening without `create`.
    /// Carries the file name so the caller can offer to create the database.
    #[error("database file '{0}' does not exist")]
    NotExist(String),

    /// The file is present but could not be opened or read. Carries the
    /// file name so the caller can offer to delete the corrupted pair.
    #[error("could not open database file '{0}'")]
    OpeningError(String),

    #[error("no open database")]
    NotOpen,

    #[error("database '{0}' already exists")]
    Exists(String),

    #[error("database '{0}' is already open")]
    AnotherOpen(String),

    #[error("expected {expected} argument(s), but got {got}")]
    InvalidArgumentCount {
        expected: usize,
        got: usize,
        usage: &'static str,
    },

    #[error("query must not be empty")]
    EmptyInquiry,
}

impl DbError {
    /// Usage hint for errors that carry one.
    pub fn usage(&self) -> Option<&'static str> {
        match self {
            DbError::InvalidArgumentCount { usage, .. } => Some(usage),
            _ => None,
        }
    }
}
