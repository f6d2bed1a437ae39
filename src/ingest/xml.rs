//! Streaming XML event scanner.
//!
//! A byte-cursor tokenizer over an in-memory document that yields the
//! element events the [`Ingestor`](super::Ingestor) consumes. Each tag
//! event carries the absolute byte offset one past its closing `>`,
//! which is what record-extent computation needs.
//!
//! This is not a validating parser. It understands exactly what
//! bibliographic dumps contain: the XML declaration, comments, a
//! DOCTYPE line, open/close/empty-element tags with attributes, and
//! character data with the predefined entities plus numeric character
//! references. Anything structurally broken (an unterminated tag or
//! comment) is an error; unknown entities pass through literally.

use std::borrow::Cow;

use eyre::{bail, Result};

#[derive(Debug, PartialEq)]
pub enum ParseEvent<'a> {
    /// `offset` is one past the `>` of the open tag.
    Start { name: &'a str, offset: u32 },
    Text { text: Cow<'a, str> },
    /// `offset` is one past the `>` of the close tag.
    End { name: &'a str, offset: u32 },
}

pub struct XmlScanner<'a> {
    src: &'a str,
    pos: usize,
    /// Close event queued by a self-closing tag.
    pending_end: Option<(&'a str, u32)>,
}

impl<'a> XmlScanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending_end: None,
        }
    }

    /// Next event, or `None` at end of input.
    pub fn next_event(&mut self) -> Result<Option<ParseEvent<'a>>> {
        if let Some((name, offset)) = self.pending_end.take() {
            return Ok(Some(ParseEvent::End { name, offset }));
        }

        let bytes = self.src.as_bytes();
        loop {
            if self.pos >= bytes.len() {
                return Ok(None);
            }
            if bytes[self.pos] != b'<' {
                return Ok(Some(self.scan_text()));
            }
            let rest = &self.src[self.pos..];
            if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">", "declaration")?;
            } else if rest.starts_with("</") {
                return Ok(Some(self.scan_close_tag()?));
            } else {
                return Ok(Some(self.scan_open_tag()?));
            }
        }
    }

    fn scan_text(&mut self) -> ParseEvent<'a> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] != b'<' {
            self.pos += 1;
        }
        ParseEvent::Text {
            text: decode_entities(&self.src[start..self.pos]),
        }
    }

    fn scan_open_tag(&mut self) -> Result<ParseEvent<'a>> {
        let name_start = self.pos + 1;
        let name = self.scan_name(name_start)?;

        let bytes = self.src.as_bytes();
        let mut at = name_start + name.len();
        let mut quote: Option<u8> = None;
        while at < bytes.len() {
            match (quote, bytes[at]) {
                (Some(open), byte) if byte == open => quote = None,
                (Some(_), _) => {}
                (None, b'"') | (None, b'\'') => quote = Some(bytes[at]),
                (None, b'>') => {
                    let self_closing = bytes[at - 1] == b'/';
                    self.pos = at + 1;
                    let offset = self.pos as u32;
                    if self_closing {
                        self.pending_end = Some((name, offset));
                    }
                    return Ok(ParseEvent::Start { name, offset });
                }
                (None, _) => {}
            }
            at += 1;
        }
        bail!("unterminated tag '<{}' at byte {}", name, self.pos);
    }

    fn scan_close_tag(&mut self) -> Result<ParseEvent<'a>> {
        let name_start = self.pos + 2;
        let name = self.scan_name(name_start)?;

        let bytes = self.src.as_bytes();
        let mut at = name_start + name.len();
        while at < bytes.len() && bytes[at] != b'>' {
            at += 1;
        }
        if at == bytes.len() {
            bail!("unterminated close tag '</{}' at byte {}", name, self.pos);
        }
        self.pos = at + 1;
        Ok(ParseEvent::End {
            name,
            offset: self.pos as u32,
        })
    }

    fn scan_name(&self, start: usize) -> Result<&'a str> {
        let bytes = self.src.as_bytes();
        let mut end = start;
        while end < bytes.len() && is_name_byte(bytes[end]) {
            end += 1;
        }
        if end == start {
            bail!("malformed tag at byte {}", self.pos);
        }
        Ok(&self.src[start..end])
    }

    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<()> {
        match self.src[self.pos..].find(terminator) {
            Some(found) => {
                self.pos += found + terminator.len();
                Ok(())
            }
            None => bail!("unterminated {} at byte {}", what, self.pos),
        }
    }
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.' | b':')
}

/// Decodes the predefined entities and numeric character references.
/// Unknown entities are kept verbatim rather than rejected.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let entity = &rest[amp..];
        match entity.find(';') {
            Some(semi) => {
                match decode_entity(&entity[1..semi]) {
                    Some(ch) => decoded.push(ch),
                    None => decoded.push_str(&entity[..=semi]),
                }
                rest = &entity[semi + 1..];
            }
            None => {
                decoded.push_str(entity);
                rest = "";
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

fn decode_entity(body: &str) -> Option<char> {
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = body.strip_prefix("#x").map_or_else(
                || body.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()),
                |h| u32::from_str_radix(h, 16).ok(),
            )?;
            char::from_u32(code)
        }
    }
}
