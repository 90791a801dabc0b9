use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the sort.
///
/// Public operations return [anyhow::Error]; the root cause is always one of these variants and
/// can be recovered with `error.downcast_ref::<SortError>()`.
#[derive(Error, Debug)]
pub enum SortError {
    /// The key names a column that is not present in the header
    #[error("unknown column: {name}, header: {header:?}")]
    UnknownColumn {
        name: String,
        header: Vec<String>,
    },
    /// The key position is outside of the header
    #[error("key position {index} is out of range, the header has {columns} columns")]
    KeyOutOfRange {
        index: i64,
        columns: usize,
    },
    /// A data row does not have the same number of fields as the header
    #[error("malformed row at line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    /// A quoted field is still open at the end of the input
    #[error("unterminated quoted field starting at line {line}")]
    UnterminatedQuote {
        line: usize,
    },
    /// Failure to create, write, read or delete a run or the output
    #[error("storage error, path: {}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The input does not even contain a header line
    #[error("missing header, path: {}", .path.display())]
    MissingHeader {
        path: PathBuf,
    },
    /// Files handed to the merge do not share the same header
    #[error("header mismatch, path: {}", .path.display())]
    RunHeaderMismatch {
        path: PathBuf,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("canceled")]
    Canceled,
}

impl SortError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> SortError {
        SortError::Storage {
            path: path.into(),
            source,
        }
    }
}
