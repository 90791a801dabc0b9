use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;

use crate::cancellation::Cancellation;
use crate::comparator::KeyComparator;
use crate::order::Order;
use crate::run::RunStorage;

#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
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

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        field_separator: char,
        endl: char,
        ignore_empty: bool,
        ignore_lines: Option<Regex>,
        batch_size: usize,
        files: usize,
        order: Order,
        comparator: Arc<dyn KeyComparator>,
        cancellation: Cancellation,
    ) -> Config {
        Config {
            tmp,
            tmp_prefix,
            tmp_suffix,
            field_separator,
            endl,
            ignore_empty,
            ignore_lines,
            batch_size,
            files,
            order,
            comparator,
            cancellation,
        }
    }

    pub(crate) fn field_separator(&self) -> char {
        self.field_separator
    }

    pub(crate) fn endl(&self) -> char {
        self.endl
    }

    pub(crate) fn ignore_empty(&self) -> bool {
        self.ignore_empty
    }

    pub(crate) fn ignore_lines(&self) -> &Option<Regex> {
        &self.ignore_lines
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub(crate) fn files(&self) -> usize {
        self.files
    }

    pub(crate) fn order(&self) -> Order {
        self.order
    }

    pub(crate) fn comparator(&self) -> &Arc<dyn KeyComparator> {
        &self.comparator
    }

    pub(crate) fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub(crate) fn run_storage(&self) -> RunStorage {
        RunStorage::new(self.tmp.clone())
            .with_prefix(&self.tmp_prefix)
            .with_suffix(&self.tmp_suffix)
            .with_field_separator(self.field_separator)
            .with_endl(self.endl)
    }
}
