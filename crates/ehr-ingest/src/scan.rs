//! Lazy source scans.
//!
//! A [`TableScanner`] turns a file path into a Polars `LazyFrame` without
//! reading the data. Evaluation is deferred until the unified event relation
//! is collected, so tables larger than memory can be projected and joined
//! before anything is materialized.

use std::path::Path;

use polars::prelude::*;

use crate::error::{IngestError, Result};

/// Builds lazy scans over source files.
pub trait TableScanner {
    /// Returns a lazy scan of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be planned (e.g. unreadable header).
    fn scan(&self, path: &Path) -> Result<LazyFrame>;
}

impl<T: TableScanner + ?Sized> TableScanner for Box<T> {
    fn scan(&self, path: &Path) -> Result<LazyFrame> {
        (**self).scan(path)
    }
}

/// Delimited-text scanner.
///
/// Every column is read as text so identifiers such as ICD codes keep their
/// leading zeros; typed parsing happens in the event projection.
#[derive(Debug, Clone)]
pub struct CsvScanner {
    separator: u8,
    low_memory: bool,
}

impl Default for CsvScanner {
    fn default() -> Self {
        Self {
            separator: b',',
            low_memory: false,
        }
    }
}

impl CsvScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field separator (default `,`).
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Low memory mode - trades performance for memory efficiency.
    pub fn with_low_memory(mut self, enabled: bool) -> Self {
        self.low_memory = enabled;
        self
    }
}

impl TableScanner for CsvScanner {
    fn scan(&self, path: &Path) -> Result<LazyFrame> {
        let path_str = path.to_string_lossy();
        let pl_path = PlPath::new(&path_str);
        LazyCsvReader::new(pl_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_separator(self.separator)
            .with_low_memory(self.low_memory)
            .finish()
            .map_err(|e| IngestError::Scan {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}
