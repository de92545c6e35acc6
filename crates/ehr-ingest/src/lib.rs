//! Clinical table ingestion.
//!
//! This crate resolves dataset configurations and turns each configured source
//! table into a lazily-evaluated Polars relation in the canonical event layout
//! (`patient_id`, `event_type`, `timestamp`, `<table>/<attribute>`).
//!
//! # Example
//!
//! ```ignore
//! use ehr_ingest::{TableLoader, load_config};
//!
//! let config = load_config("configs/mimic3.yaml")?;
//! let loader = TableLoader::new("/data/mimiciii/1.4", config);
//!
//! // Nothing is read until the frame is collected.
//! let diagnoses = loader.load_table("diagnoses_icd")?;
//! ```

mod config;
mod error;
mod loader;
mod scan;

// === Error Types ===
pub use error::{IngestError, Result};

// === Configuration ===
pub use config::{load_config, parse_config};

// === Scanning ===
pub use scan::{CsvScanner, TableScanner};

// === Table Loading ===
pub use loader::{TableLoader, parse_timestamp, timestamp_dtype};
