//! Bounded-memory row batching.
//!
//! [`ChunkedRows`] reads its source `chunk_size` bytes at a time and hands out
//! the complete rows found in each read as a [`RowBatch`]. A row that spans a
//! chunk boundary is held back until its terminator arrives, so callers never
//! see a truncated row and memory use stays flat however large the input is.

use std::io::{self, Read};

use thiserror::Error;

/// 50 KiB, the default read size per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024;

/// A single delimited field. The exact text is always retained.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Field(String);

/// Opportunistic typed view of a field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Empty,
    Boolean(bool),
    Number(f64),
    Text(&'a str),
}

impl Field {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn value(&self) -> FieldValue<'_> {
        let text = self.0.as_str();
        let trimmed = text.trim();
        if text.is_empty() {
            return FieldValue::Empty;
        }
        match trimmed {
            "true" | "TRUE" => return FieldValue::Boolean(true),
            "false" | "FALSE" => return FieldValue::Boolean(false),
            _ => {}
        }
        // `f64::from_str` also takes "inf" and "NaN"; only plain numerals count.
        let numeric_start = trimmed
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        if numeric_start
            && let Ok(number) = trimmed.parse::<f64>()
            && number.is_finite()
        {
            return FieldValue::Number(number);
        }
        FieldValue::Text(text)
    }

    /// True when the field is kept as text rather than a number, boolean, or empty.
    pub fn is_text(&self) -> bool {
        matches!(self.value(), FieldValue::Text(_))
    }
}

impl From<&str> for Field {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// The fields of one input line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawRow {
    fields: Vec<Field>,
}

impl RawRow {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Split a line on `delimiter`, honouring double-quoted fields.
    pub fn parse(line: &str, delimiter: u8) -> Result<Self, RowError> {
        split_fields(line, char::from(delimiter)).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Complete rows produced from one or more chunk reads.
#[derive(Clone, Debug)]
pub struct RowBatch {
    /// Index of the last chunk read for this batch (0-based).
    pub index: usize,
    /// 1-based line number of the first row.
    pub first_line: u64,
    pub rows: Vec<RawRow>,
    /// Total bytes read from the source so far, including this batch.
    pub bytes_consumed: u64,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RowError {
    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("I/O error after {bytes_read} bytes")]
    Io {
        bytes_read: u64,
        #[source]
        source: io::Error,
    },
    #[error("chunk {chunk}, line {line}: {kind}")]
    Malformed {
        chunk: usize,
        line: u64,
        #[source]
        kind: RowError,
    },
}

/// Iterator of [`RowBatch`]es over a byte source.
///
/// Fused after the first error or once the source is exhausted. Not seekable:
/// to parse again, build a new one over a fresh source.
pub struct ChunkedRows<R> {
    inner: R,
    delimiter: u8,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    chunk_index: usize,
    line: u64,
    bytes_consumed: u64,
    done: bool,
}

impl<R> ChunkedRows<R>
where
    R: Read,
{
    pub fn new(inner: R, delimiter: u8) -> Self {
        Self::with_chunk_size(inner, delimiter, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(inner: R, delimiter: u8, chunk_size: usize) -> Self {
        Self {
            inner,
            delimiter,
            chunk: vec![0; chunk_size.max(1)],
            pending: Vec::new(),
            chunk_index: 0,
            line: 0,
            bytes_consumed: 0,
            done: false,
        }
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    fn fill_chunk(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.chunk.len() {
            match self.inner.read(&mut self.chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn fail(&mut self, error: ChunkError) -> Option<Result<RowBatch, ChunkError>> {
        self.done = true;
        self.pending.clear();
        Some(Err(error))
    }
}

impl<R> Iterator for ChunkedRows<R>
where
    R: Read,
{
    type Item = Result<RowBatch, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first_line = self.line + 1;
        let mut rows = Vec::new();

        while rows.is_empty() {
            let read = match self.fill_chunk() {
                Ok(read) => read,
                Err(source) => {
                    let bytes_read = self.bytes_consumed;
                    return self.fail(ChunkError::Io { bytes_read, source });
                }
            };

            if read == 0 {
                self.done = true;
                if !self.pending.is_empty() {
                    self.line += 1;
                    match parse_line(&self.pending, self.line, self.delimiter) {
                        Ok(row) => rows.push(row),
                        Err(kind) => {
                            let (chunk, line) = (self.chunk_index.saturating_sub(1), self.line);
                            return self.fail(ChunkError::Malformed { chunk, line, kind });
                        }
                    }
                    self.pending.clear();
                }
                break;
            }

            self.chunk_index += 1;
            self.bytes_consumed += read as u64;

            let data = &self.chunk[..read];
            let mut start = 0;
            while let Some(offset) = data[start..].iter().position(|&b| b == b'\n') {
                let end = start + offset;
                self.pending.extend_from_slice(&data[start..end]);
                self.line += 1;
                match parse_line(&self.pending, self.line, self.delimiter) {
                    Ok(row) => rows.push(row),
                    Err(kind) => {
                        self.done = true;
                        self.pending.clear();
                        return Some(Err(ChunkError::Malformed {
                            chunk: self.chunk_index - 1,
                            line: self.line,
                            kind,
                        }));
                    }
                }
                self.pending.clear();
                start = end + 1;
            }
            self.pending.extend_from_slice(&data[start..]);
        }

        if rows.is_empty() {
            return None;
        }

        Some(Ok(RowBatch {
            index: self.chunk_index.saturating_sub(1),
            first_line,
            rows,
            bytes_consumed: self.bytes_consumed,
        }))
    }
}

/// Invalid UTF-8 is replaced with U+FFFD rather than failing the row.
fn parse_line(bytes: &[u8], line: u64, delimiter: u8) -> Result<RawRow, RowError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let decoded = String::from_utf8_lossy(bytes);
    let mut text = decoded.as_ref();
    if line == 1 {
        text = text.strip_prefix('\u{feff}').unwrap_or(text);
    }
    RawRow::parse(text, delimiter)
}

fn split_fields(line: &str, delimiter: char) -> Result<Vec<Field>, RowError> {
    let mut fields = Vec::new();
    let mut rest = line;

    loop {
        let Some(quoted) = rest.strip_prefix('"') else {
            match rest.find(delimiter) {
                Some(idx) => {
                    fields.push(Field::from(&rest[..idx]));
                    rest = &rest[idx + 1..];
                    continue;
                }
                None => {
                    fields.push(Field::from(rest));
                    return Ok(fields);
                }
            }
        };

        let mut value = String::new();
        let mut close = None;
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '"' {
                value.push(c);
            } else if chars.peek().is_some_and(|&(_, next)| next == '"') {
                value.push('"');
                chars.next();
            } else {
                close = Some(idx + 1);
                break;
            }
        }
        let close = close.ok_or(RowError::UnterminatedQuote)?;

        // Anything between the closing quote and the next delimiter is kept verbatim.
        let after = &quoted[close..];
        match after.find(delimiter) {
            Some(idx) => {
                value.push_str(&after[..idx]);
                fields.push(Field(value));
                rest = &after[idx + 1..];
            }
            None => {
                value.push_str(after);
                fields.push(Field(value));
                return Ok(fields);
            }
        }
    }
}
