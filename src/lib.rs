//! This crate sorts delimited text files with a header row, for example CSV or TSV, by one key
//! column, even when the file is much larger than the available memory.
//!
//! The sort runs in two phases. The input is read in batches of a fixed number of rows, each
//! batch is sorted in memory and written as a sorted run to a temporary file together with the
//! header. The runs are then combined by a k-way merge that keeps the current row of every run
//! in a binary heap. Peak memory is bounded by the batch size, not by the size of the input.
//!
//! Keys are compared as plain strings unless a [comparator::KeyComparator] is supplied, so
//! "10" sorts before "2". Rows with equal keys keep their input order. Rows are written to the
//! output exactly as they were read.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use csv_external_sort::key_spec::KeySpec;
//! use csv_external_sort::sort::Sort;
//!
//! fn sort_by_name(input: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
//!     // the key is a column name or a zero based column position, "0" is the first column
//!     let mut csv_sort = Sort::new(input, output, KeySpec::from("name"));
//!     csv_sort.with_batch_size(100_000);
//!     let summary = csv_sort.sort()?;
//!     log::info!("sorted {} rows using {} runs", summary.rows(), summary.runs());
//!     Ok(())
//! }
//! ```
//!
//! The phases are also available separately: [run_builder::RunBuilder] produces a list of
//! [run::Run]s from any record stream and [run_merger::RunMerger] merges them.

pub(crate) mod config;
pub(crate) mod unmerged_run;

pub mod cancellation;
pub mod comparator;
pub mod error;
pub mod key_spec;
pub mod line_writer;
pub mod order;
pub mod record;
pub mod record_source;
pub mod run;
pub mod run_builder;
pub mod run_merger;
pub mod sort;
