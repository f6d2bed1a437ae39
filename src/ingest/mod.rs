//! # Ingestion
//!
//! Turns a stream of element-level parser events into index writes. The
//! [`Ingestor`] is the adaptor between whatever produces
//! [`ParseEvent`]s (the bundled [`xml::XmlScanner`], or a test feeding
//! events by hand) and the primary, inverted, and top-K indexes.
//!
//! ## Record boundaries
//!
//! Element depth is tracked across events; the document root sits at
//! depth 1 and each bibliographic record is a direct child. When a
//! record element closes (depth returns to 1), the byte range since the
//! previous record's end becomes the extent stored for every key the
//! record produced.
//!
//! ## Field values
//!
//! Character data accumulates per element. Closing an `author` or
//! `title` element splits the buffer on `" - "` and `"; "` greedily
//! left-to-right (combined author strings are common in the wild),
//! clamps each piece to the 64-byte key width, and queues it. At the
//! record boundary every queued author goes into the author tree, the
//! inverted index, and the top-K tally; every queued title goes into the
//! title tree and the inverted index.

pub mod xml;

use eyre::Result;
use smallvec::SmallVec;

use crate::database::Database;
use crate::records::{truncate_text, Extent};

pub use xml::{ParseEvent, XmlScanner};

const AUTHOR_ELEMENT: &str = "author";
const TITLE_ELEMENT: &str = "title";

/// Value separators within one author/title element.
const SEPARATORS: [&str; 2] = [" - ", "; "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Author,
    Title,
    Other,
}

fn field_of(element: &str) -> FieldState {
    match element {
        AUTHOR_ELEMENT => FieldState::Author,
        TITLE_ELEMENT => FieldState::Title,
        _ => FieldState::Other,
    }
}

/// Counters reported back to the caller after a full event stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub records: u64,
    pub keys: u64,
}

pub struct Ingestor<'db> {
    db: &'db mut Database,
    state: FieldState,
    text: String,
    depth: i64,
    prev_end: u32,
    authors: SmallVec<[String; 4]>,
    titles: SmallVec<[String; 2]>,
    stats: IngestStats,
}

impl<'db> Ingestor<'db> {
    pub fn new(db: &'db mut Database) -> Self {
        Self {
            db,
            state: FieldState::Other,
            text: String::new(),
            depth: 0,
            prev_end: 0,
            authors: SmallVec::new(),
            titles: SmallVec::new(),
            stats: IngestStats::default(),
        }
    }

    pub fn handle(&mut self, event: &ParseEvent<'_>) -> Result<()> {
        match event {
            ParseEvent::Start { name, offset } => {
                self.depth += 1;
                if self.depth == 1 {
                    // First record extent starts right after the root tag.
                    self.prev_end = *offset;
                }
                self.text.clear();
                self.state = field_of(name);
            }
            ParseEvent::Text { text } => {
                if self.state != FieldState::Other {
                    self.text.push_str(text);
                }
            }
            ParseEvent::End { name, offset } => {
                self.state = field_of(name);
                self.depth -= 1;
                if self.state != FieldState::Other {
                    self.queue_field_values();
                }
                if self.depth == 1 {
                    self.close_record(*offset)?;
                }
            }
        }
        Ok(())
    }

    /// Totals accumulated so far.
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    fn queue_field_values(&mut self) {
        let buffer = std::mem::take(&mut self.text);
        match self.state {
            FieldState::Author => {
                for piece in split_values(&buffer) {
                    if !piece.is_empty() {
                        self.authors.push(piece);
                    }
                }
            }
            FieldState::Title => {
                for piece in split_values(&buffer) {
                    if !piece.is_empty() {
                        self.titles.push(piece);
                    }
                }
            }
            FieldState::Other => {}
        }
    }

    fn close_record(&mut self, end: u32) -> Result<()> {
        let extent = Extent::new(self.prev_end, end.saturating_sub(self.prev_end));

        for author in self.authors.drain(..) {
            self.db.author.insert(extent, &author)?;
            self.db.inverted.build(&author, extent)?;
            self.db.topk.bump(&author)?;
            self.stats.keys += 1;
        }
        for title in self.titles.drain(..) {
            self.db.title.insert(extent, &title)?;
            self.db.inverted.build(&title, extent)?;
            self.stats.keys += 1;
        }

        self.prev_end = end;
        self.stats.records += 1;
        Ok(())
    }
}

/// Splits on the value separators greedily left-to-right, clamping each
/// piece to key width.
fn split_values(buffer: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = buffer;
    loop {
        let cut = SEPARATORS
            .iter()
            .filter_map(|sep| rest.find(sep).map(|at| (at, sep.len())))
            .min();
        match cut {
            Some((at, sep_len)) => {
                pieces.push(truncate_text(&rest[..at]).into_owned());
                rest = &rest[at + sep_len..];
            }
            None => {
                pieces.push(truncate_text(rest).into_owned());
                return pieces;
            }
        }
    }
}
