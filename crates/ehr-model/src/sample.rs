//! Task samples and their declared schemas.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Semantic type of a sample field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Ordered list of codes, e.g. diagnosis codes of one visit.
    Sequence,
    /// List of code lists, e.g. codes grouped per visit.
    NestedSequence,
    Binary,
    Multiclass,
    Multilabel,
    Regression,
    Text,
    Timestamp,
    /// Passed through untouched.
    Raw,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Sequence => "sequence",
            FieldKind::NestedSequence => "nested_sequence",
            FieldKind::Binary => "binary",
            FieldKind::Multiclass => "multiclass",
            FieldKind::Multilabel => "multilabel",
            FieldKind::Regression => "regression",
            FieldKind::Text => "text",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Raw => "raw",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from field name to semantic type.
pub type FieldSchema = BTreeMap<String, FieldKind>;

/// One value of a sample field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Codes(Vec<String>),
    NestedCodes(Vec<Vec<String>>),
    Timestamp(NaiveDateTime),
}

impl SampleValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_codes(&self) -> Option<&[String]> {
        match self {
            SampleValue::Codes(codes) => Some(codes),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SampleValue::Null)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        SampleValue::Text(value)
    }
}

impl From<bool> for SampleValue {
    fn from(value: bool) -> Self {
        SampleValue::Bool(value)
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        SampleValue::Integer(value)
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Float(value)
    }
}

impl From<Vec<String>> for SampleValue {
    fn from(value: Vec<String>) -> Self {
        SampleValue::Codes(value)
    }
}

impl From<Vec<Vec<String>>> for SampleValue {
    fn from(value: Vec<Vec<String>>) -> Self {
        SampleValue::NestedCodes(value)
    }
}

impl From<NaiveDateTime> for SampleValue {
    fn from(value: NaiveDateTime) -> Self {
        SampleValue::Timestamp(value)
    }
}

impl<T: Into<SampleValue>> From<Option<T>> for SampleValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SampleValue::Null, Into::into)
    }
}

/// A flat record emitted by a task for one patient.
pub type Sample = BTreeMap<String, SampleValue>;
