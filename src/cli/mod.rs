//! # Interactive Command Line
//!
//! A small REPL over the engine, in the spirit of the classic database
//! shells:
//!
//! | Command | Description |
//! |---|---|
//! | `create NAME` | create a database and open it |
//! | `open NAME` | open an existing database |
//! | `read FILE` | ingest an XML document into the open database |
//! | `find (author\|title) PREFIX` | prefix lookup |
//! | `search WORD...` | fuzzy multi-word lookup |
//! | `top N` | most frequent authors |
//! | `select (author\|title)` | leaf-order index dump (debugging) |
//! | `whoami` | name of the open database |
//! | `close` | close the open database |
//! | `help` | command summary |
//! | `exit` | leave |
//!
//! At most one database is open at a time; `open`/`create` while one is
//! live is refused. A failed `open` drops into an interactive recovery
//! flow: a missing database offers creation, a corrupt file offers
//! removal of the affected index/record pair.

mod commands;
mod repl;

pub use commands::{tokenize, Session};
pub use repl::Repl;
