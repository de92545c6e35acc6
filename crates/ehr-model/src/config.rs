//! Table schema descriptors.
//!
//! A dataset configuration maps each table name to a [`TableConfig`] that
//! describes where the source file lives (relative to the dataset root), which
//! columns carry the patient identifier and the event timestamp, which columns
//! become event attributes, and which auxiliary files are joined in first.
//!
//! ```yaml
//! diagnoses:
//!   file_path: DIAGNOSES_ICD.csv
//!   patient_id: subject_id
//!   timestamp: charttime
//!   attributes: [icd9_code]
//!   join:
//!     - file_path: D_ICD_DIAGNOSES.csv
//!       "on": icd9_code
//!       columns: [long_title]
//!       how: left
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Join strategy for an auxiliary table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    /// Keep every base row; unmatched auxiliary columns are null.
    #[default]
    Left,
    /// Keep only rows whose key exists on both sides.
    Inner,
    /// Keep every auxiliary row.
    Right,
    /// Keep rows from both sides. `outer` is accepted as an alias.
    #[serde(alias = "outer")]
    Full,
}

impl JoinHow {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinHow::Left => "left",
            JoinHow::Inner => "inner",
            JoinHow::Right => "right",
            JoinHow::Full => "full",
        }
    }
}

impl fmt::Display for JoinHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinHow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(JoinHow::Left),
            "inner" => Ok(JoinHow::Inner),
            "right" => Ok(JoinHow::Right),
            "full" | "outer" => Ok(JoinHow::Full),
            _ => Err(format!("Unknown join type: {s}")),
        }
    }
}

/// An auxiliary file joined into a table before projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Path of the auxiliary file, relative to the dataset root.
    pub file_path: String,
    /// Key column shared by the base table and the auxiliary file.
    pub on: String,
    /// Auxiliary columns pulled into the base table, in order.
    pub columns: Vec<String>,
    #[serde(default)]
    pub how: JoinHow,
}

impl JoinConfig {
    pub fn new(
        file_path: impl Into<String>,
        on: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            on: on.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            how: JoinHow::default(),
        }
    }

    pub fn with_how(mut self, how: JoinHow) -> Self {
        self.how = how;
        self
    }
}

/// Schema description of one source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Path of the source file, relative to the dataset root.
    pub file_path: String,
    /// Column holding the patient identifier.
    pub patient_id: String,
    /// Column holding the event time. Events carry no time when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Columns exported as `<table>/<attribute>` event attributes.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Auxiliary joins, applied in declaration order.
    #[serde(default)]
    pub join: Vec<JoinConfig>,
}

impl TableConfig {
    pub fn new(file_path: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            patient_id: patient_id.into(),
            timestamp: None,
            attributes: Vec::new(),
            join: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp = Some(column.into());
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_join(mut self, join: JoinConfig) -> Self {
        self.join.push(join);
        self
    }
}

/// Mapping from table name to its schema description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetConfig {
    tables: BTreeMap<String, TableConfig>,
}

impl DatasetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table description.
    pub fn with_table(mut self, name: impl Into<String>, table: TableConfig) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableConfig)> + '_ {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
