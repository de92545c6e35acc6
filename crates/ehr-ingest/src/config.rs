//! Configuration resolution.
//!
//! Configurations are YAML documents mapping table names to table schema
//! descriptions. Two layouts are accepted: the flat mapping, and a versioned
//! document with the mapping nested under `tables`:
//!
//! ```yaml
//! version: "1.4"
//! tables:
//!   diagnoses:
//!     file_path: DIAGNOSES_ICD.csv
//!     patient_id: subject_id
//!     attributes: [icd9_code]
//! ```

use std::path::{Path, PathBuf};

use ehr_model::DatasetConfig;
use serde_yaml::Value;

use crate::error::{IngestError, Result};

const INLINE_SOURCE: &str = "<inline>";
const TABLES_KEY: &str = "tables";

/// Load a dataset configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<DatasetConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_document(&content, path)?;
    tracing::debug!(
        path = %path.display(),
        tables = config.len(),
        "Loaded dataset configuration"
    );
    Ok(config)
}

/// Parse a dataset configuration from YAML text.
pub fn parse_config(content: &str) -> Result<DatasetConfig> {
    parse_document(content, Path::new(INLINE_SOURCE))
}

fn parse_document(content: &str, path: &Path) -> Result<DatasetConfig> {
    let malformed = |message: String| IngestError::ConfigParse {
        path: PathBuf::from(path),
        message,
    };
    let document: Value = serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?;
    let tables = match nested_tables(&document) {
        Some(tables) => {
            if let Some(version) = document.get("version") {
                tracing::debug!(version = ?version, "Versioned configuration document");
            }
            tables.clone()
        }
        None => document,
    };
    serde_yaml::from_value(tables).map_err(|e| malformed(e.to_string()))
}

/// The `tables` mapping of a versioned document, if this is one.
///
/// A flat configuration may itself contain a table named `tables`; that entry
/// carries a `file_path` and is not treated as a nested mapping.
fn nested_tables(document: &Value) -> Option<&Value> {
    let tables = document.get(TABLES_KEY)?;
    let mapping = tables.as_mapping()?;
    if mapping.contains_key("file_path") {
        return None;
    }
    Some(tables)
}
