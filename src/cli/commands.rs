//! Command parsing and execution against a [`Session`].
//!
//! A `Session` carries what the REPL needs between lines: the base
//! directory, the open database (if any), and the path of the last
//! ingested source document so matches can be shown as text snippets.
//! Every command returns its output as a string; interactive recovery
//! (the create/remove prompts) stays in the REPL, which inspects the
//! typed error behind a failed `open`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;

use eyre::Result;

use crate::database::Database;
use crate::error::DbError;
use crate::index::Field;
use crate::records::Extent;

/// Splits a command line into words, honoring double-quoted arguments.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in input.chars() {
        match ch {
            '"' => {
                if quoted {
                    words.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            ch if ch.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn parse_field(word: &str) -> Option<Field> {
    match word {
        "author" => Some(Field::Author),
        "title" => Some(Field::Title),
        _ => None,
    }
}

pub struct Session {
    base: PathBuf,
    db: Option<Database>,
    source: Option<PathBuf>,
}

impl Session {
    pub fn new(base: PathBuf) -> Self {
        Self {
            base,
            db: None,
            source: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    pub fn create(&mut self, args: &[String]) -> Result<String> {
        self.refuse_second_open()?;
        let name = single_name(args, "create [name]")?;
        self.db = Some(Database::create(&self.base, name)?);
        Ok(format!("Database {} is open.", name))
    }

    pub fn open(&mut self, args: &[String]) -> Result<String> {
        self.refuse_second_open()?;
        let name = single_name(args, "open [name]")?;
        self.db = Some(Database::open(&self.base, name)?);
        Ok(format!("Database {} is open.", name))
    }

    pub fn close(&mut self) -> String {
        match self.db.take() {
            Some(db) => {
                let name = db.name().to_string();
                db.close();
                format!("Database {} is closed.", name)
            }
            None => "No open database.".to_string(),
        }
    }

    pub fn read(&mut self, args: &[String]) -> Result<String> {
        if args.len() != 1 {
            return Err(DbError::InvalidArgumentCount {
                expected: 1,
                got: args.len(),
                usage: "read [file]",
            }
            .into());
        }
        let path = PathBuf::from(&args[0]);
        let db = self.require_open()?;
        let started = Instant::now();
        let stats = db.ingest_xml(&path)?;
        self.source = Some(path);
        Ok(format!(
            "READ OK, {} record(s), {} key(s) ({} ms)",
            stats.records,
            stats.keys,
            started.elapsed().as_millis()
        ))
    }

    pub fn find(&mut self, args: &[String]) -> Result<String> {
        if args.len() > 2 {
            return Err(DbError::InvalidArgumentCount {
                expected: 2,
                got: args.len(),
                usage: "find [title|author] [keyword]",
            }
            .into());
        }
        if args.len() < 2 || args[1].is_empty() {
            return Err(DbError::EmptyInquiry.into());
        }
        let Some(field) = parse_field(&args[0]) else {
            return Err(DbError::InvalidArgumentCount {
                expected: 2,
                got: args.len(),
                usage: "find [title|author] [keyword]",
            }
            .into());
        };
        let db = self.require_open()?;
        let started = Instant::now();
        let matches = db.find(field, &args[1])?;
        let mut out = self.render_matches(&matches);
        out.push_str(&format!(
            "FIND OK, {} record(s) ({} ms)",
            matches.len(),
            started.elapsed().as_millis()
        ));
        Ok(out)
    }

    pub fn search(&mut self, args: &[String]) -> Result<String> {
        let db = self.require_open()?;
        let started = Instant::now();
        let matches = db.search(args)?;
        let mut out = format!("Search for {}:\n", args.join(" + "));
        out.push_str(&self.render_matches(&matches));
        out.push_str(&format!(
            "SEARCH OK, {} record(s) ({} ms)",
            matches.len(),
            started.elapsed().as_millis()
        ));
        Ok(out)
    }

    pub fn top(&mut self, args: &[String]) -> Result<String> {
        let count = single_name(args, "top [number]")?
            .parse::<usize>()
            .map_err(|_| DbError::InvalidArgumentCount {
                expected: 1,
                got: args.len(),
                usage: "top [number]",
            })?;
        let db = self.require_open()?;
        let ranked = db.top(count)?;
        let mut out = String::new();
        for (rank, (name, hits)) in ranked.iter().enumerate() {
            out.push_str(&format!("{:>5} {} ({})\n", format!("[{}] ", rank + 1), name, hits));
        }
        Ok(out)
    }

    pub fn select(&mut self, args: &[String]) -> Result<String> {
        let field = single_name(args, "select [title|author]")
            .ok()
            .and_then(|word| parse_field(word))
            .ok_or(DbError::InvalidArgumentCount {
                expected: 1,
                got: args.len(),
                usage: "select [title|author]",
            })?;
        let db = self.require_open()?;
        db.select(field)?;
        Ok("SELECT OK".to_string())
    }

    pub fn whoami(&mut self) -> Result<String> {
        let db = self.require_open()?;
        Ok(format!("Who am I? Database {}!", db.name()))
    }

    pub fn help(&self) -> String {
        r#"bibdex commands:

  create [name]                  Create a database and open it
  open [name]                    Open an existing database
  read [file]                    Ingest an XML document
  find [title|author] [keyword]  Prefix lookup in one field
  search [keyword...]            Fuzzy multi-word lookup
  top [number]                   Most frequent authors
  select [title|author]          Leaf-order index dump (first 64 entries)
  whoami                         Name of the open database
  close                          Close the open database
  exit                           Leave

Quote multi-word keywords: find title "graph theory""#
            .to_string()
    }

    /// Removes the index/record file pair that `file_name` belongs to.
    /// Used by the REPL's corrupt-database recovery flow.
    pub fn remove_pair(&self, name: &str, file_name: &str) -> Result<String> {
        let dir = self.base.join(name);
        let mut removed = Vec::new();
        for sibling in pair_of(file_name) {
            let path = dir.join(&sibling);
            if path.exists() {
                std::fs::remove_file(&path)?;
                removed.push(sibling);
            }
        }
        if removed.is_empty() {
            Ok("Nothing to remove.".to_string())
        } else {
            Ok(format!("Removed {}.", removed.join(", ")))
        }
    }

    fn require_open(&mut self) -> Result<&mut Database> {
        self.db.as_mut().ok_or_else(|| DbError::NotOpen.into())
    }

    fn refuse_second_open(&self) -> Result<()> {
        if let Some(db) = &self.db {
            return Err(DbError::AnotherOpen(db.name().to_string()).into());
        }
        Ok(())
    }

    /// Numbered match listing; shows the referenced source region when a
    /// document has been ingested this session.
    fn render_matches(&self, matches: &[(Extent, String)]) -> String {
        let mut out = String::new();
        for (rank, (extent, text)) in matches.iter().enumerate() {
            out.push_str(&format!("{:>5} ", format!("[{}] ", rank + 1)));
            match self.snippet(extent) {
                Some(snippet) => out.push_str(snippet.trim()),
                None if !text.is_empty() => {
                    out.push_str(&format!("{} ({}, {})", text, extent.pos(), extent.len()))
                }
                None => out.push_str(&format!("({}, {})", extent.pos(), extent.len())),
            }
            out.push('\n');
        }
        out
    }

    fn snippet(&self, extent: &Extent) -> Option<String> {
        let source = self.source.as_ref()?;
        read_region(source, extent).ok()
    }
}

fn read_region(path: &Path, extent: &Extent) -> Result<String> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(extent.pos() as u64))?;
    let mut buffer = vec![0u8; extent.len() as usize];
    file.read_exact(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn single_name<'a>(args: &'a [String], usage: &'static str) -> Result<&'a str> {
    if args.len() != 1 {
        return Err(DbError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
            usage,
        }
        .into());
    }
    Ok(&args[0])
}

fn pair_of(file_name: &str) -> Vec<String> {
    for (a, b) in [
        ("_idx_title", "_rec_title"),
        ("_idx_author", "_rec_author"),
        ("_ii_idx", "_ii_rec"),
        ("_topk_idx", "_topk_rec"),
    ] {
        if file_name.contains(a) {
            return vec![file_name.to_string(), file_name.replace(a, b)];
        }
        if file_name.contains(b) {
            return vec![file_name.replace(b, a), file_name.to_string()];
        }
    }
    vec![file_name.to_string()]
}
