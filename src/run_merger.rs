use std::collections::BinaryHeap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use crate::cancellation::Cancellation;
use crate::error::SortError;
use crate::key_spec::SortKey;
use crate::line_writer::LineWriter;
use crate::record::Header;
use crate::run::{delete_runs, Run, RunStorage};
use crate::unmerged_run::UnmergedRun;

const CANCELLATION_CHECK_INTERVAL: usize = 1024;

/// K-way merge of sorted runs.
///
/// The current head of every open run sits in a binary heap, so selecting the next record
/// costs O(log k). Records with equal keys are emitted in run order, which makes the merge of
/// runs created from consecutive batches a stable sort of the original input.
pub struct RunMerger<'a> {
    sort_key: &'a SortKey,
    storage: &'a RunStorage,
    cancellation: Cancellation,
}

impl<'a> RunMerger<'a> {
    pub fn new(sort_key: &'a SortKey, storage: &'a RunStorage) -> RunMerger<'a> {
        RunMerger {
            sort_key,
            storage,
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> RunMerger<'a> {
        self.cancellation = cancellation;
        self
    }

    /// Merge `runs` into `output` and return the number of data rows written.
    ///
    /// The header is written once: `header` if given, otherwise the header of the first run.
    /// With no runs and no header nothing is written. Run files are closed but not deleted.
    pub fn merge<W: Write>(&self, runs: &[Run], header: Option<&Header>, output: &mut LineWriter<W>) -> Result<usize, anyhow::Error> {
        let paths: Vec<&Path> = runs.iter().map(Run::path).collect();
        self.merge_paths(&paths, header, output)
    }

    /// Merge already sorted files sharing the same header
    pub fn merge_files<W: Write>(&self, files: &[PathBuf], header: Option<&Header>, output: &mut LineWriter<W>) -> Result<usize, anyhow::Error> {
        let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
        self.merge_paths(&paths, header, output)
    }

    /// Merge consecutive groups of at most `fan_in` runs into intermediate runs until no more
    /// than `fan_in` runs remain. Returns the remaining runs and the number of passes. Merged
    /// runs are deleted as soon as their group is written.
    pub fn reduce(&self, runs: Vec<Run>, header: &Header, fan_in: usize) -> Result<(Vec<Run>, usize), anyhow::Error> {
        let fan_in = fan_in.max(2);
        let mut runs = runs;
        let mut passes = 0;
        while runs.len() > fan_in {
            passes += 1;
            log::info!("Start merge pass {}, runs: {}, fan in: {}", passes, runs.len(), fan_in);
            let mut merged = Vec::with_capacity(runs.len() / fan_in + 1);
            let mut pending = runs.into_iter();
            loop {
                let group: Vec<Run> = pending.by_ref().take(fan_in).collect();
                if group.is_empty() {
                    break;
                }

                if group.len() == 1 {
                    merged.extend(group);
                    continue;
                }

                let mut writer = self.storage.create()?;
                let rows = self.merge(&group, Some(header), writer.sink())?;
                let run = writer.finish()?;
                log::debug!("Merged {} runs into {}, rows: {}", group.len(), run.path().display(), rows);
                merged.push(run);
                delete_runs(group)?;
            }
            runs = merged;
            log::info!("Finish merge pass {}, runs: {}", passes, runs.len());
        }
        Ok((runs, passes))
    }

    fn merge_paths<W: Write>(&self, paths: &[&Path], header: Option<&Header>, output: &mut LineWriter<W>) -> Result<usize, anyhow::Error> {
        log::info!("Merging {} sorted files", paths.len());
        let mut expected = header.map(|header| header.line().to_string());
        if let Some(line) = &expected {
            output.write_line(line)?;
        }

        let mut frontier: BinaryHeap<UnmergedRun> = BinaryHeap::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let run = UnmergedRun::open(
                index,
                path,
                self.sort_key,
                self.storage.field_separator(),
                self.storage.endl(),
            )?;

            if expected.is_none() {
                output.write_line(run.header().line())?;
                expected = Some(run.header().line().to_string());
            } else if expected.as_deref() != Some(run.header().line()) {
                return Err(SortError::RunHeaderMismatch { path: run.path().to_path_buf() }.into());
            }

            if run.has_head() {
                frontier.push(run);
            }
        }

        let mut merged: usize = 0;
        while let Some(mut current) = frontier.pop() {
            // keep draining the current run while its head still goes before every other head
            loop {
                if merged % CANCELLATION_CHECK_INTERVAL == 0 {
                    self.cancellation.check()?;
                }

                let record = current.advance()?
                    .ok_or_else(|| anyhow!("Run without a head in merge frontier: {}", current.path().display()))?;
                output.write_line(record.line())?;
                merged += 1;

                if !current.has_head() {
                    break;
                }

                let next_goes_first = frontier.peek()
                    .map_or(false, |next| *next > current);
                if next_goes_first {
                    frontier.push(current);
                    break;
                }
            }
        }

        log::info!("Finished merging sorted files, merged length: {} rows", merged);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::cancellation::Cancellation;
    use crate::error::SortError;
    use crate::key_spec::SortKey;
    use crate::line_writer::LineWriter;
    use crate::order::Order;
    use crate::record::Header;
    use crate::record_source::RecordSource;
    use crate::run::{Run, RunStorage};
    use crate::run_builder::RunBuilder;
    use crate::run_merger::RunMerger;

    fn build(storage: &RunStorage, input: &str, sort_key: &SortKey, batch_size: usize) -> Result<(Header, Vec<Run>), anyhow::Error> {
        let source = RecordSource::new(Cursor::new(input.to_string()), "memory", ',', '\n')?
            .with_key_index(sort_key.index());
        let header = source.header().clone();
        let runs = RunBuilder::new(&header, sort_key, storage, batch_size).build(source)?;
        Ok((header, runs))
    }

    fn merge_to_string(merger: &RunMerger, runs: &[Run], header: Option<&Header>) -> Result<String, anyhow::Error> {
        let mut output = LineWriter::new(Vec::new(), "memory", '\n');
        merger.merge(runs, header, &mut output)?;
        Ok(String::from_utf8(output.into_inner()?)?)
    }

    #[test]
    fn test_merge_ascending() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let (header, runs) = build(&storage, "id\n5\n3\n4\n1\n2\n", &sort_key, 2)?;
        assert_eq!(runs.len(), 3);
        let merger = RunMerger::new(&sort_key, &storage);
        assert_eq!(merge_to_string(&merger, &runs, Some(&header))?, "id\n1\n2\n3\n4\n5\n");
        // the header is taken from the first run when not given
        assert_eq!(merge_to_string(&merger, &runs, None)?, "id\n1\n2\n3\n4\n5\n");
        Ok(())
    }

    #[test]
    fn test_merge_descending() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Desc);
        let (header, runs) = build(&storage, "id\n5\n3\n4\n1\n2\n", &sort_key, 2)?;
        let merger = RunMerger::new(&sort_key, &storage);
        assert_eq!(merge_to_string(&merger, &runs, Some(&header))?, "id\n5\n4\n3\n2\n1\n");
        Ok(())
    }

    #[test]
    fn test_ties_follow_run_order() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let (header, runs) = build(&storage, "k,v\nb,1\na,2\nb,3\na,4\nb,5\na,6\n", &sort_key, 2)?;
        let merger = RunMerger::new(&sort_key, &storage);
        assert_eq!(
            merge_to_string(&merger, &runs, Some(&header))?,
            "k,v\na,2\na,4\na,6\nb,1\nb,3\nb,5\n"
        );
        Ok(())
    }

    #[test]
    fn test_no_runs() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let merger = RunMerger::new(&sort_key, &storage);
        assert_eq!(merge_to_string(&merger, &[], None)?, "");
        let header = Header::parse("id,name".to_string(), ',');
        assert_eq!(merge_to_string(&merger, &[], Some(&header))?, "id,name\n");
        Ok(())
    }

    #[test]
    fn test_merge_does_not_delete_runs() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let (header, runs) = build(&storage, "id\n2\n1\n", &sort_key, 1)?;
        let merger = RunMerger::new(&sort_key, &storage);
        merge_to_string(&merger, &runs, Some(&header))?;
        assert!(runs.iter().all(|run| run.path().exists()));
        Ok(())
    }

    #[test]
    fn test_header_mismatch() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let first = tmp.path().join("a.csv");
        let second = tmp.path().join("b.csv");
        fs::write(&first, "id,name\n1,a\n")?;
        fs::write(&second, "name,id\nb,2\n")?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let merger = RunMerger::new(&sort_key, &storage);
        let mut output = LineWriter::new(Vec::new(), "memory", '\n');
        let files: Vec<PathBuf> = vec![first, second];
        let error = merger.merge_files(&files, None, &mut output).unwrap_err();
        assert!(matches!(error.downcast_ref::<SortError>(), Some(SortError::RunHeaderMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_reduce() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let (header, runs) = build(&storage, "id\n9\n8\n7\n6\n5\n4\n3\n2\n1\n", &sort_key, 1)?;
        assert_eq!(runs.len(), 9);
        let merger = RunMerger::new(&sort_key, &storage);
        let (runs, passes) = merger.reduce(runs, &header, 2)?;
        assert_eq!(passes, 3);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs.iter().map(Run::rows).sum::<usize>(), 9);
        assert_eq!(fs::read_dir(tmp.path())?.count(), 2);
        assert_eq!(merge_to_string(&merger, &runs, Some(&header))?, "id\n1\n2\n3\n4\n5\n6\n7\n8\n9\n");
        Ok(())
    }

    #[test]
    fn test_canceled_merge() -> Result<(), anyhow::Error> {
        let tmp = TempDir::new()?;
        let storage = RunStorage::new(tmp.path().to_path_buf());
        let sort_key = SortKey::new(0, Order::Asc);
        let (header, runs) = build(&storage, "id\n2\n1\n", &sort_key, 1)?;
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let merger = RunMerger::new(&sort_key, &storage).with_cancellation(cancellation);
        let error = merge_to_string(&merger, &runs, Some(&header)).unwrap_err();
        assert!(matches!(error.downcast_ref::<SortError>(), Some(SortError::Canceled)));
        Ok(())
    }
}
