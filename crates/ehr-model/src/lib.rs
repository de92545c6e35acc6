//! Clinical event data model.
//!
//! Table and join descriptors read from dataset configuration, the column
//! contract of the unified event relation, and the sample and field-schema
//! types produced by tasks. This crate does not depend on Polars.

pub mod config;
pub mod event;
pub mod sample;

pub use config::{DatasetConfig, JoinConfig, JoinHow, TableConfig};
pub use event::{
    ATTRIBUTE_SEPARATOR, BASE_COLUMNS, EVENT_TYPE, Event, EventSchema, PATIENT_ID, TIMESTAMP,
    TIMESTAMP_FORMAT, namespaced_attribute, namespaced_column,
};
pub use sample::{FieldKind, FieldSchema, Sample, SampleValue};
