//! Shared utilities for the clinical event crates.
//!
//! Polars cell and column helpers used when turning materialized event frames
//! back into typed Rust values.

pub mod frame;

pub use frame::{column_datetimes, column_strings, micros_to_datetime};
