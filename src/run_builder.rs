use anyhow::Context;

use crate::cancellation::Cancellation;
use crate::key_spec::SortKey;
use crate::record::{Header, Record};
use crate::run::{Run, RunStorage};

/// Splits a record stream into sorted runs of at most `batch_size` records.
///
/// Peak memory is one batch. Each batch is sorted with a stable sort, so records with equal
/// keys keep their arrival order within a run.
pub struct RunBuilder<'a> {
    header: &'a Header,
    sort_key: &'a SortKey,
    storage: &'a RunStorage,
    batch_size: usize,
    cancellation: Cancellation,
}

impl<'a> RunBuilder<'a> {
    pub fn new(header: &'a Header, sort_key: &'a SortKey, storage: &'a RunStorage, batch_size: usize) -> RunBuilder<'a> {
        RunBuilder {
            header,
            sort_key,
            storage,
            batch_size: batch_size.max(1),
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> RunBuilder<'a> {
        self.cancellation = cancellation;
        self
    }

    /// Consume `records` and return the runs in the order they were created. An empty stream
    /// yields no runs. On error every run created so far is deleted.
    pub fn build<I>(&self, records: I) -> Result<Vec<Run>, anyhow::Error>
        where I: IntoIterator<Item=Result<Record, anyhow::Error>> {
        log::info!("Start building runs, batch size: {}", self.batch_size);
        let mut runs = Vec::new();
        // grows with the records actually read, batch_size may exceed the input by far
        let mut batch = Vec::new();
        for record in records {
            batch.push(record?);
            if batch.len() >= self.batch_size {
                self.cancellation.check()?;
                runs.push(self.write_sorted_batch(&mut batch)?);
            }
        }

        if !batch.is_empty() {
            self.cancellation.check()?;
            runs.push(self.write_sorted_batch(&mut batch)?);
        }

        log::info!(
            "Finish building runs, runs: {}, rows: {}",
            runs.len(),
            runs.iter().map(Run::rows).sum::<usize>()
        );
        Ok(runs)
    }

    fn write_sorted_batch(&self, batch: &mut Vec<Record>) -> Result<Run, anyhow::Error> {
        batch.sort_by(|a, b| self.sort_key.compare_records(a, b));

        let mut writer = self.storage.create()?;
        writer.write_header(self.header)?;
        for record in batch.drain(..) {
            writer.write_record(&record)?;
        }
        let path = writer.path().to_path_buf();
        let run = writer.finish()
            .with_context(|| format!("run: {}", path.display()))?;
        log::debug!("Wrote run {}, rows: {}", run.path().display(), run.rows());
        Ok(run)
    }
}
