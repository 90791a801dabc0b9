use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::SortError;
use crate::key_spec::SortKey;
use crate::record::{Header, Record};
use crate::record_source::RecordSource;

/// Read cursor over a sorted file taking part in a merge. Holds only the current head record
/// and a read buffer.
pub(crate) struct UnmergedRun<'a> {
    index: usize,
    source: RecordSource<BufReader<File>>,
    head: Option<Record>,
    sort_key: &'a SortKey,
}

impl<'a> UnmergedRun<'a> {
    pub(crate) fn open(
        index: usize,
        path: &Path,
        sort_key: &'a SortKey,
        field_separator: char,
        endl: char,
    ) -> Result<UnmergedRun<'a>, SortError> {
        let mut source = RecordSource::open(path, field_separator, endl)?
            .with_key_index(sort_key.index());
        let head = source.next_record()?;
        Ok(
            UnmergedRun {
                index,
                source,
                head,
                sort_key,
            }
        )
    }

    pub(crate) fn header(&self) -> &Header {
        self.source.header()
    }

    pub(crate) fn path(&self) -> &Path {
        self.source.path()
    }

    pub(crate) fn has_head(&self) -> bool {
        self.head.is_some()
    }

    /// Return the current head and read the next record in its place
    pub(crate) fn advance(&mut self) -> Result<Option<Record>, SortError> {
        let next = if self.head.is_some() {
            self.source.next_record()?
        } else {
            None
        };
        Ok(std::mem::replace(&mut self.head, next))
    }
}

impl Eq for UnmergedRun<'_> {}

impl PartialEq<Self> for UnmergedRun<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for UnmergedRun<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnmergedRun<'_> {
    // Greater means "goes first" so the BinaryHeap (Max Heap) pops the next record to emit.
    // Equal keys go to the run with the lower index.
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.head, &other.head) {
            (None, None) => {
                Ordering::Equal
            }
            (None, Some(_)) => {
                Ordering::Less
            }
            (Some(_), None) => {
                Ordering::Greater
            }
            (Some(head), Some(other_head)) => {
                self.sort_key.compare_records(other_head, head)
                    .then_with(|| other.index.cmp(&self.index))
            }
        }
    }
}
