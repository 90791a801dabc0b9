use std::io::{BufRead, ErrorKind};
use std::ops::Range;

use crate::error::SortError;

/// The column names of a file, read once from its first line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    line: String,
    columns: Vec<String>,
}

impl Header {
    /// Parse a header line without its line terminator. Quoted column names are unquoted.
    pub fn parse(line: String, field_separator: char) -> Header {
        let columns = match split_fields(&line, field_separator) {
            Some(fields) => {
                fields.into_iter()
                    .map(|field| field.value(&line).to_string())
                    .collect()
            }
            None => {
                vec![line.clone()]
            }
        };
        Header {
            line,
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The header line exactly as it was read
    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    /// Position of the first column with exactly this name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

/// A data row. The line is kept verbatim and only the key field is located, so rows pass
/// through the sort without being re-encoded.
///
/// Fields may be quoted with '"' so they can contain the separator, doubled quotes or line
/// breaks. The key of a quoted field is its unquoted value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    line: String,
    key: Range<usize>,
    unquoted_key: Option<String>,
}

impl Record {
    /// Parse a data line without its line terminator.
    ///
    /// # Arguments
    /// * `line_number` - position of the line in its file, used for error reporting
    /// * `columns` - number of fields every row must have
    /// * `key_index` - zero based position of the key field
    pub fn parse(
        line: String,
        line_number: usize,
        columns: usize,
        key_index: usize,
        field_separator: char,
    ) -> Result<Record, SortError> {
        let fields = split_fields(&line, field_separator)
            .ok_or(SortError::UnterminatedQuote { line: line_number })?;
        let found = fields.len();
        if found != columns {
            return Err(
                SortError::MalformedRow {
                    line: line_number,
                    expected: columns,
                    found,
                }
            );
        }

        match fields.into_iter().nth(key_index) {
            Some(field) => {
                Ok(
                    Record {
                        line,
                        key: field.range,
                        unquoted_key: field.unquoted,
                    }
                )
            }
            None => {
                Err(
                    SortError::KeyOutOfRange {
                        index: key_index as i64,
                        columns,
                    }
                )
            }
        }
    }

    pub fn key(&self) -> &str {
        match &self.unquoted_key {
            Some(key) => {
                key.as_str()
            }
            None => {
                &self.line[self.key.clone()]
            }
        }
    }

    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    pub fn into_line(self) -> String {
        self.line
    }
}

/// Location of one field in a line. `unquoted` holds the value of a quoted field.
pub(crate) struct FieldSpan {
    range: Range<usize>,
    unquoted: Option<String>,
}

impl FieldSpan {
    fn value<'a>(&'a self, line: &'a str) -> &'a str {
        match &self.unquoted {
            Some(value) => {
                value.as_str()
            }
            None => {
                &line[self.range.clone()]
            }
        }
    }
}

/// Split a line into fields. A field starting with '"' runs to the matching closing quote,
/// "" inside it stands for one quote, and anything after the closing quote up to the next
/// separator is kept as is. Quotes inside an unquoted field are plain characters.
/// Returns None when a quoted field is not closed, meaning the row continues on the next line.
pub(crate) fn split_fields(line: &str, field_separator: char) -> Option<Vec<FieldSpan>> {
    let mut fields = Vec::new();
    let mut chars = line.char_indices().peekable();
    let mut start = 0;
    loop {
        let mut unquoted = None;
        if let Some((_, '"')) = chars.peek() {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                if c == '"' {
                    if let Some((_, '"')) = chars.peek() {
                        chars.next();
                        value.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    value.push(c);
                }
            }
            if !closed {
                return None;
            }
            unquoted = Some(value);
        }

        let mut end = line.len();
        let mut more = false;
        for (i, c) in chars.by_ref() {
            if c == field_separator {
                end = i;
                more = true;
                break;
            }
            if let Some(value) = unquoted.as_mut() {
                value.push(c);
            }
        }

        fields.push(
            FieldSpan {
                range: start..end,
                unquoted,
            }
        );
        if !more {
            return Some(fields);
        }
        start = end + field_separator.len_utf8();
    }
}

/// Read one line, stripping the terminator and a preceding '\r' when the terminator is '\n'.
/// Returns None at end of input.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, endl: char) -> std::io::Result<Option<String>> {
    let terminator = endl as u8;
    let mut buffer = Vec::new();
    if reader.read_until(terminator, &mut buffer)? == 0 {
        return Ok(None);
    }

    if buffer.last() == Some(&terminator) {
        buffer.pop();
        if endl == '\n' && buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
    }

    String::from_utf8(buffer)
        .map(Some)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
}
