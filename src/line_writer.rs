use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::SortError;

/// Buffered line oriented writer that reports failures as [SortError::Storage] against the
/// path it writes to.
pub struct LineWriter<W: Write> {
    writer: BufWriter<W>,
    path: PathBuf,
    endl: char,
    lines: usize,
}

impl<W: Write> LineWriter<W> {
    pub fn new(inner: W, path: impl Into<PathBuf>, endl: char) -> LineWriter<W> {
        LineWriter {
            writer: BufWriter::new(inner),
            path: path.into(),
            endl,
            lines: 0,
        }
    }

    /// Write the line followed by the line terminator
    pub fn write_line(&mut self, line: &str) -> Result<(), SortError> {
        let mut endl = [0_u8; 4];
        let endl = self.endl.encode_utf8(&mut endl);
        self.writer.write_all(line.as_bytes())
            .map_err(|e| SortError::storage(&self.path, e))?;
        self.writer.write_all(endl.as_bytes())
            .map_err(|e| SortError::storage(&self.path, e))?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush buffered lines and return the underlying writer
    pub fn into_inner(self) -> Result<W, SortError> {
        let path = self.path;
        self.writer.into_inner()
            .map_err(|e| SortError::storage(path, e.into_error()))
    }
}
