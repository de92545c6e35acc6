//! The canonical event relation contract.
//!
//! Every source table is projected onto the same leading columns
//! ([`PATIENT_ID`], [`EVENT_TYPE`], [`TIMESTAMP`]) followed by its attribute
//! columns, each named `"<table>/<attribute>"`. Downstream task code selects
//! attributes by that literal name, so the naming convention is part of the
//! public contract.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const PATIENT_ID: &str = "patient_id";
pub const EVENT_TYPE: &str = "event_type";
pub const TIMESTAMP: &str = "timestamp";

/// Leading columns shared by every event relation, in output order.
pub const BASE_COLUMNS: [&str; 3] = [PATIENT_ID, EVENT_TYPE, TIMESTAMP];

/// Separator between table name and attribute name.
pub const ATTRIBUTE_SEPARATOR: char = '/';

/// Format applied when parsing source timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column name of `attribute` in the namespace of `table`.
pub fn namespaced_column(table: &str, attribute: &str) -> String {
    format!("{table}{ATTRIBUTE_SEPARATOR}{attribute}")
}

/// The attribute name of `column` if it lies in the namespace of `table`.
///
/// Matching is anchored on the full table name, so tables and attributes may
/// both contain the separator.
pub fn namespaced_attribute<'a>(column: &'a str, table: &str) -> Option<&'a str> {
    column
        .strip_prefix(table)?
        .strip_prefix(ATTRIBUTE_SEPARATOR)
        .filter(|attribute| !attribute.is_empty())
}

/// Ordered column set of an event relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchema {
    columns: Vec<String>,
}

impl EventSchema {
    /// Columns produced by loading `table` with the given attributes.
    pub fn for_table(table: &str, attributes: &[String]) -> Self {
        let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        columns.extend(
            attributes
                .iter()
                .map(|attribute| namespaced_column(table, attribute)),
        );
        Self { columns }
    }

    /// Union of several schemas: base columns first, then attribute columns in
    /// first-seen order without duplicates.
    pub fn union<'a>(schemas: impl IntoIterator<Item = &'a EventSchema>) -> Self {
        let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        for schema in schemas {
            for column in schema.attribute_columns() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn attribute_columns(&self) -> &[String] {
        &self.columns[BASE_COLUMNS.len()..]
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Typed view of one canonical event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Non-null attributes of the event's own table, keyed by bare attribute name.
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, timestamp: Option<NaiveDateTime>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
