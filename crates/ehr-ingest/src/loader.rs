//! Per-table event loading.
//!
//! [`TableLoader::load_table`] turns one configured source table into a lazy
//! relation with the canonical event layout:
//!
//! | column                 | value                                         |
//! |------------------------|-----------------------------------------------|
//! | `patient_id`           | patient column cast to text                   |
//! | `event_type`           | the table name                                |
//! | `timestamp`            | parsed `%Y-%m-%d %H:%M:%S`, null when invalid |
//! | `<table>/<attribute>`  | one text column per declared attribute        |
//!
//! Joins declared on the table are applied to the raw scan first, in order,
//! so attributes may name columns pulled from auxiliary files.

use std::path::{Path, PathBuf};

use ehr_model::{
    DatasetConfig, EVENT_TYPE, EventSchema, JoinConfig, JoinHow, PATIENT_ID, TIMESTAMP,
    TIMESTAMP_FORMAT, TableConfig, namespaced_column,
};
use polars::prelude::*;

use crate::error::{IngestError, Result};
use crate::scan::{CsvScanner, TableScanner};

const FAILURES_COLUMN: &str = "timestamp_parse_failures";

/// Dtype of the canonical `timestamp` column.
pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Microseconds, None)
}

/// Lenient timestamp parse of a text column.
///
/// Values that do not match [`TIMESTAMP_FORMAT`] become null instead of
/// failing the query.
pub fn parse_timestamp(column: &str) -> Expr {
    col(column).cast(DataType::String).str().strptime(
        timestamp_dtype(),
        StrptimeOptions {
            format: Some(TIMESTAMP_FORMAT.into()),
            strict: false,
            exact: true,
            cache: true,
        },
        lit("raise"),
    )
}

fn join_args(how: JoinHow) -> JoinArgs {
    match how {
        JoinHow::Left => JoinArgs::new(JoinType::Left),
        JoinHow::Inner => JoinArgs::new(JoinType::Inner),
        JoinHow::Right => JoinArgs::new(JoinType::Right),
        JoinHow::Full => {
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns)
        }
    }
}

fn join_projection(join: &JoinConfig) -> Vec<Expr> {
    std::iter::once(join.on.as_str())
        .chain(join.columns.iter().map(String::as_str))
        .map(col)
        .collect()
}

fn event_projection(table_name: &str, table: &TableConfig) -> Vec<Expr> {
    let timestamp = match table.timestamp.as_deref() {
        Some(column) => parse_timestamp(column),
        None => lit(NULL).cast(timestamp_dtype()),
    };
    let mut exprs = vec![
        col(table.patient_id.as_str())
            .cast(DataType::String)
            .alias(PATIENT_ID),
        lit(table_name).alias(EVENT_TYPE),
        timestamp.alias(TIMESTAMP),
    ];
    exprs.extend(table.attributes.iter().map(|attribute| {
        col(attribute.as_str())
            .cast(DataType::String)
            .alias(namespaced_column(table_name, attribute))
    }));
    exprs
}

/// Loads configured tables from a dataset root as lazy event relations.
pub struct TableLoader {
    root: PathBuf,
    config: DatasetConfig,
    scanner: Box<dyn TableScanner>,
}

impl TableLoader {
    /// Create a loader that scans CSV files under `root`.
    pub fn new(root: impl Into<PathBuf>, config: DatasetConfig) -> Self {
        Self {
            root: root.into(),
            config,
            scanner: Box::new(CsvScanner::default()),
        }
    }

    /// Replace the scanner used for source and join files.
    pub fn with_scanner(mut self, scanner: impl TableScanner + 'static) -> Self {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Schema description of a configured table.
    pub fn table(&self, table_name: &str) -> Result<&TableConfig> {
        self.config
            .get(table_name)
            .ok_or_else(|| IngestError::TableNotFound {
                table: table_name.to_string(),
            })
    }

    /// Output columns of [`load_table`](Self::load_table), without touching the filesystem.
    pub fn event_schema(&self, table_name: &str) -> Result<EventSchema> {
        let table = self.table(table_name)?;
        Ok(EventSchema::for_table(table_name, &table.attributes))
    }

    /// Build the lazy event relation of one table.
    ///
    /// # Errors
    ///
    /// - [`IngestError::TableNotFound`] if the table is not configured
    /// - [`IngestError::MissingFile`] / [`IngestError::MissingJoinFile`] if a
    ///   source or join file does not exist under the root
    pub fn load_table(&self, table_name: &str) -> Result<LazyFrame> {
        let table = self.table(table_name)?;
        let frame = self.source_frame(table_name, table)?;
        Ok(frame.select(event_projection(table_name, table)))
    }

    /// Count rows whose timestamp is present but does not parse.
    ///
    /// Runs a separate evaluation over the table source; intended for
    /// diagnostics, not for the load path.
    pub fn timestamp_parse_failures(&self, table_name: &str) -> Result<usize> {
        let table = self.table(table_name)?;
        let Some(column) = table.timestamp.as_deref() else {
            return Ok(0);
        };
        let failed = col(column)
            .is_not_null()
            .and(parse_timestamp(column).is_null());
        let counted = self
            .source_frame(table_name, table)?
            .select([failed.cast(DataType::UInt64).sum().alias(FAILURES_COLUMN)])
            .collect()?;
        let total = counted
            .column(FAILURES_COLUMN)?
            .cast(&DataType::UInt64)?
            .u64()?
            .get(0)
            .unwrap_or(0);
        Ok(usize::try_from(total).unwrap_or(usize::MAX))
    }

    /// Raw scan of a table with its joins applied.
    ///
    /// Rows whose patient id is null or blank are dropped.
    fn source_frame(&self, table_name: &str, table: &TableConfig) -> Result<LazyFrame> {
        let path = self.root.join(&table.file_path);
        if !path.is_file() {
            return Err(IngestError::MissingFile {
                table: table_name.to_string(),
                path,
            });
        }
        tracing::debug!(table = table_name, path = %path.display(), "Scanning table");
        let mut frame = self.scanner.scan(&path)?;

        for join in &table.join {
            let join_path = self.root.join(&join.file_path);
            if !join_path.is_file() {
                return Err(IngestError::MissingJoinFile {
                    table: table_name.to_string(),
                    path: join_path,
                });
            }
            tracing::debug!(
                table = table_name,
                path = %join_path.display(),
                on = %join.on,
                how = %join.how,
                "Joining auxiliary table"
            );
            let auxiliary = self.scanner.scan(&join_path)?.select(join_projection(join));
            let key = [col(join.on.as_str())];
            frame = frame.join(auxiliary, key.clone(), key, join_args(join.how));
        }

        let patient = || col(table.patient_id.as_str()).cast(DataType::String);
        let has_patient = patient()
            .is_not_null()
            .and(patient().str().strip_chars(lit(NULL)).neq(lit("")));
        Ok(frame.filter(has_patient))
    }
}
