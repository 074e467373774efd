//! IEC 61162-450 datagram framing.
//!
//! Every datagram carries exactly one sentence:
//!
//! ```text
//! +--------+------+--------------------------------+------+----------+-------+
//! | UdPbC\0|  \   | s:<source>,n:<count>*<HH>       |  \   | sentence | CR LF |
//! +--------+------+--------------------------------+------+----------+-------+
//!   6 bytes         tag block, HH = XOR of content
//! ```

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{NmeaError, Result};

/// Magic header at the start of every datagram.
pub const DATAGRAM_HEADER: [u8; 6] = *b"UdPbC\0";

/// Size of the magic header in bytes.
pub const HEADER_SIZE: usize = DATAGRAM_HEADER.len();

/// Tag block delimiter.
pub const TAG_DELIMITER: u8 = b'\\';

/// Highest line count emitted before wrapping back to 1.
pub const MAX_LINE_COUNT: u16 = 999;

/// Default maximum datagram size.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 4096;

/// XOR-fold of every byte in `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Reject source ids that would corrupt the tag block.
pub fn validate_source_id(source_id: &str) -> Result<()> {
    let bad = |c: char| matches!(c, '\\' | ',' | '*' | ':' | '\r' | '\n');
    if source_id.is_empty() || source_id.contains(bad) {
        return Err(NmeaError::InvalidSourceId(source_id.to_string()));
    }
    Ok(())
}

/// The `s:` / `n:` tag block in front of a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBlock {
    /// Source identifier of the talker.
    pub source_id: String,
    /// Per-source line count.
    pub line_count: u16,
}

impl TagBlock {
    /// Create a new tag block.
    pub fn new(source_id: impl Into<String>, line_count: u16) -> Self {
        Self {
            source_id: source_id.into(),
            line_count,
        }
    }

    /// Tag block content without the checksum field.
    pub fn content(&self) -> String {
        format!("s:{},n:{}", self.source_id, self.line_count)
    }

    /// Checksum over [`content`](Self::content).
    pub fn checksum(&self) -> u8 {
        checksum(self.content().as_bytes())
    }

    /// Full tag block text, `content*HH`.
    pub fn encode(&self) -> String {
        let content = self.content();
        let cs = checksum(content.as_bytes());
        format!("{content}*{cs:02X}")
    }

    /// Parse and verify a tag block (the text between the two delimiters).
    ///
    /// Fields other than `s` and `n` are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let (content, cs) = text
            .rsplit_once('*')
            .ok_or_else(|| NmeaError::malformed("missing checksum field"))?;

        if cs.len() != 2 {
            return Err(NmeaError::malformed(format!("bad checksum field {cs:?}")));
        }
        let actual = u8::from_str_radix(cs, 16)
            .map_err(|_| NmeaError::malformed(format!("bad checksum field {cs:?}")))?;
        let expected = checksum(content.as_bytes());
        if expected != actual {
            return Err(NmeaError::ChecksumMismatch { expected, actual });
        }

        let mut source_id = None;
        let mut line_count = None;

        for field in content.split(',') {
            match field.split_once(':') {
                Some(("s", value)) => source_id = Some(value),
                Some(("n", value)) => {
                    let n = value
                        .parse::<u16>()
                        .map_err(|_| NmeaError::malformed(format!("bad line count {value:?}")))?;
                    line_count = Some(n);
                }
                Some(_) => {}
                None => return Err(NmeaError::malformed(format!("bad field {field:?}"))),
            }
        }

        let source_id = source_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NmeaError::malformed("missing source id"))?;
        let line_count = line_count.ok_or_else(|| NmeaError::malformed("missing line count"))?;

        Ok(Self::new(source_id, line_count))
    }
}

/// A sentence together with its tag block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSentence {
    /// Tag block.
    pub tag: TagBlock,
    /// Sentence text, without the trailing CR LF.
    pub sentence: String,
}

impl TaggedSentence {
    /// Create a new tagged sentence.
    pub fn new(source_id: impl Into<String>, line_count: u16, sentence: impl Into<String>) -> Self {
        Self {
            tag: TagBlock::new(source_id, line_count),
            sentence: sentence.into(),
        }
    }

    /// Source identifier.
    pub fn source_id(&self) -> &str {
        &self.tag.source_id
    }

    /// Line count.
    pub fn line_count(&self) -> u16 {
        self.tag.line_count
    }

    /// Write the full datagram into a buffer.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&DATAGRAM_HEADER);
        buf.put_u8(TAG_DELIMITER);
        buf.put_slice(self.tag.encode().as_bytes());
        buf.put_u8(TAG_DELIMITER);
        buf.put_slice(self.sentence.as_bytes());
        buf.put_slice(b"\r\n");
    }

    /// Serialize to a datagram.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 32 + self.sentence.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Parse a datagram.
    ///
    /// Returns [`NmeaError::BadHeader`] for foreign traffic, and a
    /// checksum-class error for a corrupt tag block.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE || data[..HEADER_SIZE] != DATAGRAM_HEADER {
            return Err(NmeaError::BadHeader);
        }

        let body = data[HEADER_SIZE..]
            .strip_prefix(&[TAG_DELIMITER])
            .ok_or_else(|| NmeaError::malformed("missing tag block"))?;
        let end = body
            .iter()
            .position(|&b| b == TAG_DELIMITER)
            .ok_or_else(|| NmeaError::malformed("unterminated tag block"))?;

        let tag = std::str::from_utf8(&body[..end])
            .map_err(|_| NmeaError::malformed("tag block is not ASCII"))?;
        let tag = TagBlock::parse(tag)?;

        let sentence = &body[end + 1..];
        let len = sentence
            .iter()
            .rposition(|&b| b != b'\r' && b != b'\n')
            .map_or(0, |i| i + 1);
        let sentence = decode_sentence(&sentence[..len]);

        Ok(Self { tag, sentence })
    }
}

/// Sentence bytes as text.
///
/// Valid UTF-8 is taken as is. Anything else is read as Latin-1, one char
/// per byte, so talkers sending e.g. `0xB0` for a degree sign lose nothing.
/// Re-encoding such a sentence produces UTF-8, not the original bytes.
fn decode_sentence(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Per-source rolling line counters.
///
/// Counters start at 1 and wrap from 999 back to 1.
#[derive(Debug, Clone, Default)]
pub struct SourceCounters {
    counters: HashMap<String, u16>,
}

impl SourceCounters {
    /// Create an empty counter table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset a source's counter to 1.
    pub fn register(&mut self, source_id: &str) {
        self.counters.insert(source_id.to_string(), 1);
    }

    /// Take the current value for a source and advance it.
    pub fn next(&mut self, source_id: &str) -> u16 {
        let counter = self.counters.entry(source_id.to_string()).or_insert(1);
        let current = *counter;
        *counter = if current >= MAX_LINE_COUNT { 1 } else { current + 1 };
        current
    }

    /// Build the next datagram for a source and advance its count.
    ///
    /// The count is left untouched if the datagram would exceed `max_size`.
    pub fn encode_next(
        &mut self,
        source_id: &str,
        sentence: &str,
        max_size: usize,
    ) -> Result<Bytes> {
        validate_source_id(source_id)?;

        let line_count = self.peek(source_id).unwrap_or(1);
        let datagram = TaggedSentence::new(source_id, line_count, sentence).to_bytes();
        if datagram.len() > max_size {
            return Err(NmeaError::SentenceTooLarge {
                size: datagram.len(),
                max: max_size,
            });
        }

        self.next(source_id);
        Ok(datagram)
    }

    /// Value the next send for this source will use.
    pub fn peek(&self, source_id: &str) -> Option<u16> {
        self.counters.get(source_id).copied()
    }

    /// Number of known sources.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check if no source has been seen.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
