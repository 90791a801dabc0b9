use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

use crate::error::SortError;
use crate::line_writer::LineWriter;
use crate::record::{Header, Record};

/// A sorted run: the shared header followed by sorted data lines in a temporary file.
///
/// The run owns its file. Dropping the run deletes the file, [Run::delete] does the same and
/// reports failures.
#[derive(Debug)]
pub struct Run {
    path: TempPath,
    rows: usize,
}

impl Run {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows, not counting the header
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn delete(self) -> Result<(), SortError> {
        let path = self.path.to_path_buf();
        self.path.close()
            .map_err(|e| SortError::storage(path, e))
    }
}

/// Delete every run, even if some deletions fail. The first failure is returned.
pub fn delete_runs(runs: Vec<Run>) -> Result<(), SortError> {
    let mut result = Ok(());
    for run in runs {
        let path = run.path().to_path_buf();
        if let Err(e) = run.delete() {
            log::warn!("Failed to delete run {}: {}", path.display(), e);
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Where and in which format runs are stored
#[derive(Clone, Debug)]
pub struct RunStorage {
    tmp: PathBuf,
    prefix: String,
    suffix: String,
    field_separator: char,
    endl: char,
}

impl RunStorage {
    /// Runs in `tmp` named `run-*.csv`, fields separated by ',' and lines terminated by '\n'
    pub fn new(tmp: PathBuf) -> RunStorage {
        RunStorage {
            tmp,
            prefix: "run-".to_string(),
            suffix: ".csv".to_string(),
            field_separator: ',',
            endl: '\n',
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> RunStorage {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> RunStorage {
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_field_separator(mut self, field_separator: char) -> RunStorage {
        self.field_separator = field_separator;
        self
    }

    pub fn with_endl(mut self, endl: char) -> RunStorage {
        self.endl = endl;
        self
    }

    pub fn tmp(&self) -> &Path {
        self.tmp.as_path()
    }

    pub fn field_separator(&self) -> char {
        self.field_separator
    }

    pub fn endl(&self) -> char {
        self.endl
    }

    /// Create a new empty run file
    pub fn create(&self) -> Result<RunWriter, SortError> {
        let file = Builder::new()
            .prefix(&self.prefix)
            .suffix(&self.suffix)
            .tempfile_in(&self.tmp)
            .map_err(|e| SortError::storage(&self.tmp, e))?;
        let (file, path) = file.into_parts();
        Ok(
            RunWriter {
                writer: LineWriter::new(file, path.to_path_buf(), self.endl),
                path,
            }
        )
    }
}

/// Writes a run. The file is deleted if the writer is dropped before [RunWriter::finish].
pub struct RunWriter {
    writer: LineWriter<File>,
    path: TempPath,
}

impl RunWriter {
    pub fn write_header(&mut self, header: &Header) -> Result<(), SortError> {
        self.writer.write_line(header.line())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), SortError> {
        self.writer.write_line(record.line())
    }

    pub(crate) fn sink(&mut self) -> &mut LineWriter<File> {
        &mut self.writer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file for writing
    pub fn finish(self) -> Result<Run, SortError> {
        let RunWriter { writer, path } = self;
        let rows = writer.lines().saturating_sub(1);
        writer.into_inner()?;
        Ok(
            Run {
                path,
                rows,
            }
        )
    }
}
