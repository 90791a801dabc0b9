use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::SortError;
use crate::record::{Header, read_line, Record, split_fields};

/// Reads the header and then data records, in arrival order, from a delimited file.
///
/// The header is consumed on construction. Records are validated against the header field
/// count; the first failure ends the iteration.
pub struct RecordSource<R: BufRead> {
    reader: R,
    path: PathBuf,
    header: Header,
    field_separator: char,
    endl: char,
    key_index: usize,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    line_number: usize,
    done: bool,
}

impl RecordSource<BufReader<File>> {
    pub fn open(path: &Path, field_separator: char, endl: char) -> Result<RecordSource<BufReader<File>>, SortError> {
        let file = File::open(path)
            .map_err(|e| SortError::storage(path, e))?;
        RecordSource::new(BufReader::new(file), path, field_separator, endl)
    }
}

impl<R: BufRead> RecordSource<R> {
    /// Create a source over `reader`. `path` is only used to report errors.
    pub fn new(mut reader: R, path: impl Into<PathBuf>, field_separator: char, endl: char) -> Result<RecordSource<R>, SortError> {
        let path = path.into();
        let row = read_row(&mut reader, field_separator, endl)
            .map_err(|e| SortError::storage(&path, e))?;
        match row {
            None => {
                Err(SortError::MissingHeader { path })
            }
            Some((line, lines)) => {
                Ok(
                    RecordSource {
                        reader,
                        path,
                        header: Header::parse(line, field_separator),
                        field_separator,
                        endl,
                        key_index: 0,
                        ignore_empty: false,
                        ignore_lines: None,
                        line_number: lines,
                        done: false,
                    }
                )
            }
        }
    }

    /// Position of the key field in produced records. Defaults to the first column.
    pub fn with_key_index(mut self, key_index: usize) -> RecordSource<R> {
        self.key_index = key_index;
        self
    }

    /// Skip blank data lines
    pub fn with_ignore_empty(mut self, ignore_empty: bool) -> RecordSource<R> {
        self.ignore_empty = ignore_empty;
        self
    }

    /// Skip data lines matching the regex
    pub fn with_ignore_lines(mut self, ignore_lines: Option<Regex>) -> RecordSource<R> {
        self.ignore_lines = ignore_lines;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub(crate) fn next_record(&mut self) -> Result<Option<Record>, SortError> {
        loop {
            let row = read_row(&mut self.reader, self.field_separator, self.endl)
                .map_err(|e| SortError::storage(&self.path, e))?;
            let (line, lines) = match row {
                None => {
                    return Ok(None);
                }
                Some(row) => {
                    row
                }
            };
            let line_number = self.line_number + 1;
            self.line_number += lines;

            if self.ignore_empty && line.trim().is_empty() {
                continue;
            }

            if let Some(r) = &self.ignore_lines {
                if r.is_match(line.trim()) {
                    continue;
                }
            }

            let record = Record::parse(
                line,
                line_number,
                self.header.len(),
                self.key_index,
                self.field_separator,
            )?;
            return Ok(Some(record));
        }
    }
}

/// Read one row and the number of physical lines it spans. A quoted field left open at the
/// end of a line continues on the next one, joined with `endl`. At the end of the input the
/// row is returned as is and fails to parse.
fn read_row<R: BufRead>(reader: &mut R, field_separator: char, endl: char) -> std::io::Result<Option<(String, usize)>> {
    let mut row = match read_line(reader, endl)? {
        None => {
            return Ok(None);
        }
        Some(line) => {
            line
        }
    };
    let mut lines = 1;
    while split_fields(&row, field_separator).is_none() {
        match read_line(reader, endl)? {
            None => {
                break;
            }
            Some(line) => {
                row.push(endl);
                row.push_str(&line);
                lines += 1;
            }
        }
    }
    Ok(Some((row, lines)))
}

impl<R: BufRead> Iterator for RecordSource<R> {
    type Item = Result<Record, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => {
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(anyhow::Error::new(e).context(format!("path: {}", self.path.display()))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use regex::Regex;

    use crate::error::SortError;
    use crate::record_source::RecordSource;

    #[test]
    fn test_header_and_records() -> Result<(), anyhow::Error> {
        let source = RecordSource::new(Cursor::new("id,name\n2,two\n1,one\n"), "memory", ',', '\n')?
            .with_key_index(1);
        assert_eq!(source.header().columns(), &["id".to_string(), "name".to_string()]);
        let keys: Vec<String> = source
            .map(|record| record.map(|r| r.key().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(keys, vec!["two".to_string(), "one".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_header() {
        let result = RecordSource::new(Cursor::new(""), "memory", ',', '\n');
        assert!(matches!(result, Err(SortError::MissingHeader { .. })));
    }

    #[test]
    fn test_header_only() -> Result<(), anyhow::Error> {
        let mut source = RecordSource::new(Cursor::new("id,name\n"), "memory", ',', '\n')?;
        assert!(source.next().is_none());
        Ok(())
    }

    #[test]
    fn test_malformed_row_stops_iteration() -> Result<(), anyhow::Error> {
        let mut source = RecordSource::new(Cursor::new("id,name\n1,one\n2\n3,three\n"), "memory", ',', '\n')?;
        assert!(source.next().unwrap().is_ok());
        let error = source.next().unwrap().unwrap_err();
        match error.downcast_ref::<SortError>() {
            Some(SortError::MalformedRow { line, expected, found }) => {
                assert_eq!(*line, 3);
                assert_eq!(*expected, 2);
                assert_eq!(*found, 1);
            }
            other => {
                panic!("unexpected error: {:?}", other)
            }
        }
        assert!(source.next().is_none());
        Ok(())
    }

    #[test]
    fn test_ignore_rules() -> Result<(), anyhow::Error> {
        let source = RecordSource::new(Cursor::new("id,name\n\n# comment\n1,one\n"), "memory", ',', '\n')?
            .with_ignore_empty(true)
            .with_ignore_lines(Some(Regex::new("^#")?));
        let lines: Vec<String> = source
            .map(|record| record.map(|r| r.into_line()))
            .collect::<Result<_, _>>()?;
        assert_eq!(lines, vec!["1,one".to_string()]);
        Ok(())
    }

    #[test]
    fn test_quoted_field_spans_lines() -> Result<(), anyhow::Error> {
        let input = "id,note\n1,\"first\nsecond\"\n2,\"a, b\"\n3,x\n";
        let source = RecordSource::new(Cursor::new(input), "memory", ',', '\n')?
            .with_key_index(1);
        let records: Vec<(String, String)> = source
            .map(|record| record.map(|r| (r.key().to_string(), r.into_line())))
            .collect::<Result<_, _>>()?;
        assert_eq!(
            records,
            vec![
                ("first\nsecond".to_string(), "1,\"first\nsecond\"".to_string()),
                ("a, b".to_string(), "2,\"a, b\"".to_string()),
                ("x".to_string(), "3,x".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unterminated_quote_at_end() -> Result<(), anyhow::Error> {
        let mut source = RecordSource::new(Cursor::new("id,name\n1,one\n2,\"two\n3,three\n"), "memory", ',', '\n')?;
        assert!(source.next().unwrap().is_ok());
        let error = source.next().unwrap().unwrap_err();
        assert!(matches!(error.downcast_ref::<SortError>(), Some(SortError::UnterminatedQuote { line: 3 })));
        assert!(source.next().is_none());
        Ok(())
    }
}
