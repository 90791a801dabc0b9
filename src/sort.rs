use std::cmp::{max, min, Ordering};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use regex::Regex;
use rlimit::{getrlimit, Resource, setrlimit};
use tempfile::{Builder, NamedTempFile};

use crate::cancellation::Cancellation;
use crate::comparator::{KeyComparator, Lexicographic};
use crate::config::Config;
use crate::error::SortError;
use crate::key_spec::{KeySpec, SortKey};
use crate::line_writer::LineWriter;
use crate::order::Order;
use crate::record::Record;
use crate::record_source::RecordSource;
use crate::run::{delete_runs, Run};
use crate::run_builder::RunBuilder;
use crate::run_merger::RunMerger;

/// Outcome of a successful sort or merge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSummary {
    rows: usize,
    runs: usize,
    merge_passes: usize,
}

impl SortSummary {
    /// Number of data rows written to the output
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of sorted runs created from the input, or the number of merged files
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Number of intermediate merge passes needed to respect the open files limit
    pub fn merge_passes(&self) -> usize {
        self.merge_passes
    }
}

/// Sort a delimited file with a header row by one key column
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use csv_external_sort::key_spec::KeySpec;
/// use csv_external_sort::order::Order;
/// use csv_external_sort::sort::Sort;
///
/// fn sort_by_id(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut csv_sort = Sort::new(input, output, KeySpec::from("id"));
///     // rows held in memory at once, each batch becomes one sorted run
///     csv_sort.with_batch_size(10_000);
///     csv_sort.with_order(Order::Desc);
///     // for large files it is recommended to provide a dedicated directory for the runs
///     csv_sort.with_tmp_dir(tmp);
///     csv_sort.sort()?;
///     Ok(())
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    output: PathBuf,
    key: KeySpec,
    tmp: PathBuf,
    field_separator: char,
    endl: char,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    batch_size: usize,
    files: usize,
    order: Order,
    comparator: Arc<dyn KeyComparator>,
    cancellation: Cancellation,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * intermediate runs are created in std::env::temp_dir()
    /// * the field separator is ','
    /// * keys are compared lexicographically in ascending order
    /// * 1000 rows are sorted in memory per run
    /// * at most 1024 runs are merged at once
    /// * empty lines are not ignored and no ignore regex is set
    /// * lines end with '\n'
    pub fn new(input: PathBuf, output: PathBuf, key: KeySpec) -> Sort {
        Sort {
            input,
            output,
            key,
            tmp: std::env::temp_dir(),
            field_separator: ',',
            endl: '\n',
            ignore_empty: false,
            ignore_lines: None,
            batch_size: 1000,
            files: 1024,
            order: Order::Asc,
            comparator: Arc::new(Lexicographic),
            cancellation: Cancellation::new(),
        }
    }

    /// Set directory for intermediate runs. By default use std::env::temp_dir()
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the field separator. The default is ','
    pub fn with_field_separator(&mut self, field_separator: char) {
        self.field_separator = field_separator
    }

    /// Set line ending char, must be ASCII. A '\r' before '\n' is dropped when reading.
    pub fn with_endl(&mut self, endl: char) {
        self.endl = endl
    }

    /// Set the number of rows sorted in memory and written to each run. The default is 1000.
    pub fn with_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
    }

    /// Set the maximum number of runs merged at once. When there are more runs they are
    /// merged in consecutive groups first. The default is 1024.
    pub fn with_intermediate_files(&mut self, files: usize) {
        self.files = files;
    }

    /// Set [Order]
    pub fn with_order(&mut self, order: Order) {
        self.order = order
    }

    pub fn with_ascending(&mut self, ascending: bool) {
        self.order = Order::from_ascending(ascending)
    }

    /// Replace the default lexicographic key comparison
    pub fn with_comparator(&mut self, comparator: impl KeyComparator + 'static) {
        self.comparator = Arc::new(comparator)
    }

    /// Direct the algorithm to ignore empty lines. The default is false
    pub fn with_ignore_empty(&mut self, ignore_empty: bool) {
        self.ignore_empty = ignore_empty;
    }

    /// Each data line matching the regex will be ignored and will not appear in the output.
    pub fn with_ignore_lines(&mut self, r: Regex) {
        self.ignore_lines = Some(r)
    }

    /// Stop the sort when the token is canceled
    pub fn with_cancellation(&mut self, cancellation: Cancellation) {
        self.cancellation = cancellation
    }

    /// Sort the input into the output.
    ///
    /// The output is replaced only when the sort succeeds. Intermediate runs are removed
    /// whether the sort succeeds or not.
    pub fn sort(&self) -> Result<SortSummary, anyhow::Error> {
        let config = self.create_config()?;
        Self::with_rlimits(config.files(), || Self::internal_sort(&self.input, &self.output, &self.key, &config))
    }

    /// Check whether the input is already sorted by the key
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let config = self.create_config()?;
        let source = Self::open_source(&self.input, &config)?;
        let index = self.key.resolve(source.header())?;
        let sort_key = Self::sort_key(index, &config);

        let mut previous: Option<Record> = None;
        for record in source.with_key_index(index) {
            let record = record?;
            if let Some(previous) = &previous {
                if sort_key.compare_records(previous, &record) == Ordering::Greater {
                    log::info!("Not sorted, '{}' is followed by '{}'", previous.key(), record.key());
                    return Ok(false);
                }
            }
            previous = Some(record);
        }
        Ok(true)
    }

    /// Merge files that are already sorted by the key into the output. All files must have
    /// the header of the first one. The input files are left in place.
    pub fn merge(&self, inputs: Vec<PathBuf>) -> Result<SortSummary, anyhow::Error> {
        let config = self.create_config()?;
        let first = inputs.first()
            .ok_or_else(|| SortError::InvalidConfig("no files to merge".to_string()))?;
        let header = Self::open_source(first, &config)?.header().clone();
        let index = self.key.resolve(&header)?;
        let sort_key = Self::sort_key(index, &config);
        let storage = config.run_storage();
        let merger = RunMerger::new(&sort_key, &storage)
            .with_cancellation(config.cancellation().clone());

        let rows = Self::with_rlimits(
            max(config.files(), inputs.len()),
            || Self::write_output(&self.output, config.endl(), |writer| merger.merge_files(&inputs, Some(&header), writer)),
        )?;
        Ok(
            SortSummary {
                rows,
                runs: inputs.len(),
                merge_passes: 0,
            }
        )
    }

    fn create_config(&self) -> Result<Config, SortError> {
        if self.batch_size == 0 {
            return Err(SortError::InvalidConfig("batch size must be greater than zero".to_string()));
        }

        if self.files < 2 {
            return Err(SortError::InvalidConfig(format!("at least 2 intermediate files are required, got {}", self.files)));
        }

        if !self.endl.is_ascii() {
            return Err(SortError::InvalidConfig(format!("line ending must be ASCII, got {:?}", self.endl)));
        }

        if self.field_separator == '"' || self.endl == '"' {
            return Err(SortError::InvalidConfig("'\"' is reserved for quoting fields".to_string()));
        }

        if self.field_separator == self.endl {
            return Err(SortError::InvalidConfig("field separator and line ending must differ".to_string()));
        }

        Ok(
            Config::new(
                self.tmp.clone(),
                "run-".to_string(),
                ".csv".to_string(),
                self.field_separator,
                self.endl,
                self.ignore_empty,
                self.ignore_lines.clone(),
                self.batch_size,
                self.files,
                self.order,
                self.comparator.clone(),
                self.cancellation.clone(),
            )
        )
    }

    fn sort_key(index: usize, config: &Config) -> SortKey {
        SortKey::new(index, config.order())
            .with_comparator(config.comparator().clone())
    }

    fn open_source(path: &Path, config: &Config) -> Result<RecordSource<BufReader<File>>, SortError> {
        Ok(
            RecordSource::open(path, config.field_separator(), config.endl())?
                .with_ignore_empty(config.ignore_empty())
                .with_ignore_lines(config.ignore_lines().clone())
        )
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    /// Raise the open files limit to accommodate `files` open runs while `f` runs
    fn with_rlimits<T, F>(files: usize, f: F) -> Result<T, anyhow::Error>
        where F: FnOnce() -> Result<T, anyhow::Error> {
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = min(max((files as u64).saturating_add(256), current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = f();
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let restored = Self::set_rlimits(current_soft, current_hard);
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Write to a temporary file next to the output and rename it over the output once
    /// `merge` succeeds. On failure the temporary file is removed.
    fn write_output<F>(output: &Path, endl: char, merge: F) -> Result<usize, anyhow::Error>
        where F: FnOnce(&mut LineWriter<NamedTempFile>) -> Result<usize, anyhow::Error> {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.to_path_buf()
            }
            _ => {
                PathBuf::from(".")
            }
        };
        let file = Builder::new()
            .prefix(".sorting-")
            .suffix(".partial")
            .tempfile_in(&dir)
            .map_err(|e| SortError::storage(&dir, e))?;
        let path = file.path().to_path_buf();
        let mut writer = LineWriter::new(file, path, endl);
        let merged = merge(&mut writer)?;
        let file = writer.into_inner()?;
        file.persist(output)
            .map_err(|e| SortError::storage(output, e.error))?;
        Ok(merged)
    }

    fn internal_sort(input: &Path, output: &Path, key: &KeySpec, config: &Config) -> Result<SortSummary, anyhow::Error> {
        log::info!("Start external sort, input: {}, key: {}", input.display(), key);
        let source = Self::open_source(input, config)?;
        let header = source.header().clone();
        let index = key.resolve(&header)?;
        let sort_key = Self::sort_key(index, config);
        let storage = config.run_storage();

        let runs = RunBuilder::new(&header, &sort_key, &storage, config.batch_size())
            .with_cancellation(config.cancellation().clone())
            .build(source.with_key_index(index))?;
        let rows: usize = runs.iter().map(Run::rows).sum();
        let run_count = runs.len();

        let merger = RunMerger::new(&sort_key, &storage)
            .with_cancellation(config.cancellation().clone());
        let (runs, merge_passes) = merger.reduce(runs, &header, config.files())?;

        let merged = Self::write_output(
            output,
            config.endl(),
            |writer| {
                let merged = merger.merge(&runs, Some(&header), writer)?;
                if merged != rows {
                    return Err(anyhow!("Merged {} rows, but {} rows were written to runs", merged, rows));
                }
                Ok(merged)
            },
        );
        log::info!("Removing {} intermediate runs", runs.len());
        let removed = delete_runs(runs);
        let merged = merged
            .with_context(|| format!("output: {}", output.display()))?;
        removed?;

        log::info!(
            "Finish external sort, rows: {}, runs: {}, merge passes: {}",
            merged,
            run_count,
            merge_passes
        );
        Ok(
            SortSummary {
                rows: merged,
                runs: run_count,
                merge_passes,
            }
        )
    }
}
