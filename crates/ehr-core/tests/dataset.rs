//! Tests for dataset construction, materialization and patient access.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ehr_common::column_strings;
use ehr_core::{BaseDataset, DEFAULT_DATASET_NAME, DatasetError};
use ehr_ingest::{CsvScanner, IngestError, TableScanner};
use ehr_model::{DatasetConfig, JoinConfig, TableConfig};
use polars::prelude::*;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}

fn fixture_root() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    write(
        dir.path(),
        "dx.csv",
        "pid,ts,code\n\
         P1,2020-01-01 10:00:00,428.0\n\
         P1,not-a-date,401.9\n\
         P2,2021-03-04 05:06:07,V45.81\n",
    );
    write(
        dir.path(),
        "px.csv",
        "subject,charttime,icd9\n\
         P2,2021-03-05 00:00:00,3961\n\
         P3,2022-01-01 00:00:00,8856\n",
    );
    write(
        dir.path(),
        "codes.csv",
        "code,description\n428.0,Congestive heart failure\n",
    );
    dir
}

fn diagnoses() -> TableConfig {
    TableConfig::new("dx.csv", "pid")
        .with_timestamp("ts")
        .with_attributes(["code"])
}

fn procedures() -> TableConfig {
    TableConfig::new("px.csv", "subject")
        .with_timestamp("charttime")
        .with_attributes(["icd9"])
}

fn config() -> DatasetConfig {
    DatasetConfig::new()
        .with_table("diagnoses", diagnoses())
        .with_table("procedures", procedures())
}

fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    column_strings(df.column(column).expect("column exists")).expect("read strings")
}

#[derive(Clone, Default)]
struct CountingScanner {
    inner: CsvScanner,
    calls: Arc<AtomicUsize>,
}

impl TableScanner for CountingScanner {
    fn scan(&self, path: &Path) -> ehr_ingest::Result<LazyFrame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.scan(path)
    }
}

#[test]
fn diagnoses_end_to_end() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .table("diagnoses")
        .build()
        .expect("build dataset");

    assert_eq!(dataset.unique_patient_ids().unwrap(), &["P1", "P2"]);

    let patient = dataset.get_patient("P1").expect("P1 exists");
    assert_eq!(patient.patient_id(), "P1");
    assert_eq!(patient.len(), 2);
    let events = patient.events(None).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.event_type == "diagnoses"));
    let mut codes: Vec<&str> = events.iter().filter_map(|e| e.attribute("code")).collect();
    codes.sort_unstable();
    assert_eq!(codes, vec!["401.9", "428.0"]);
    // The malformed timestamp is absent, the valid one is kept.
    assert_eq!(events.iter().filter(|e| e.timestamp.is_none()).count(), 1);
}

#[test]
fn unknown_patient_is_not_found() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .table("diagnoses")
        .build()
        .unwrap();

    let err = dataset.get_patient("P999").expect_err("P999 is unknown");
    assert!(matches!(err, DatasetError::PatientNotFound { ref patient_id } if patient_id == "P999"));
}

#[test]
fn get_patient_is_idempotent() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .build()
        .unwrap();

    let first = dataset.get_patient("P2").unwrap();
    let second = dataset.get_patient("P2").unwrap();
    assert_eq!(first.len(), second.len());
    assert!(first.data().equals_missing(second.data()));
    assert_eq!(first.events(None).unwrap(), second.events(None).unwrap());
}

#[test]
fn materialization_is_memoized() {
    let root = fixture_root();
    let scanner = CountingScanner::default();
    let calls = Arc::clone(&scanner.calls);
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .scanner(scanner)
        .build()
        .unwrap();

    let planned = calls.load(Ordering::SeqCst);
    assert_eq!(planned, 2);
    assert!(!dataset.is_materialized());

    let first: *const DataFrame = dataset.collected_relation().unwrap();
    assert!(dataset.is_materialized());

    // Sources are gone; every later access must come from the cache.
    fs::remove_file(root.path().join("dx.csv")).unwrap();
    fs::remove_file(root.path().join("px.csv")).unwrap();

    let second: *const DataFrame = dataset.collected_relation().unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(dataset.unique_patient_ids().unwrap().len(), 3);
    assert_eq!(dataset.get_patient("P3").unwrap().len(), 1);
    assert_eq!(dataset.iter_patients().unwrap().count(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), planned);
}

#[test]
fn disjoint_tables_union_columns() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .build()
        .unwrap();
    let df = dataset.collected_relation().unwrap();

    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "patient_id",
            "event_type",
            "timestamp",
            "diagnoses/code",
            "procedures/icd9"
        ]
    );
    assert_eq!(df.height(), 5);

    let types = strings(df, "event_type");
    let codes = strings(df, "diagnoses/code");
    let icd9 = strings(df, "procedures/icd9");
    for row in 0..df.height() {
        match types[row].as_deref() {
            Some("diagnoses") => {
                assert!(codes[row].is_some());
                assert_eq!(icd9[row], None);
            }
            Some("procedures") => {
                assert_eq!(codes[row], None);
                assert!(icd9[row].is_some());
            }
            other => panic!("unexpected event type {other:?}"),
        }
    }
}

#[test]
fn join_scenario_from_yaml_config() {
    let root = fixture_root();
    write(
        root.path(),
        "config.yaml",
        r#"
diagnoses:
  file_path: dx.csv
  patient_id: pid
  timestamp: ts
  attributes: [code, description]
  join:
    - file_path: codes.csv
      "on": code
      columns: [description]
      how: left
"#,
    );
    let dataset = BaseDataset::new(
        root.path(),
        ["diagnoses"],
        Some("mimic3-demo"),
        root.path().join("config.yaml"),
    )
    .expect("build dataset");
    assert_eq!(dataset.name(), "mimic3-demo");

    let patient = dataset.get_patient("P1").unwrap();
    let events = patient.events(Some("diagnoses")).unwrap();
    assert_eq!(events.len(), 2);
    for event in events {
        match event.attribute("code") {
            Some("428.0") => {
                assert_eq!(event.attribute("description"), Some("Congestive heart failure"));
            }
            Some("401.9") => assert_eq!(event.attribute("description"), None),
            other => panic!("unexpected code {other:?}"),
        }
    }
}

#[test]
fn missing_file_surfaces_at_construction() {
    let root = TempDir::new().unwrap();
    let err = BaseDataset::builder(root.path(), config())
        .table("diagnoses")
        .build()
        .expect_err("dx.csv is missing");
    assert!(matches!(
        err,
        DatasetError::Ingest(IngestError::MissingFile { .. })
    ));
}

#[test]
fn missing_join_file_surfaces_at_construction() {
    let root = fixture_root();
    let config = DatasetConfig::new().with_table(
        "diagnoses",
        diagnoses().with_join(JoinConfig::new("icd9.csv", "code", ["description"])),
    );
    let err = BaseDataset::builder(root.path(), config)
        .table("diagnoses")
        .build()
        .expect_err("icd9.csv is missing");
    assert!(matches!(
        err,
        DatasetError::Ingest(IngestError::MissingJoinFile { .. })
    ));
}

#[test]
fn unknown_table_is_a_schema_error() {
    let root = fixture_root();
    let err = BaseDataset::builder(root.path(), config())
        .table("labevents")
        .build()
        .expect_err("labevents is not configured");
    assert!(matches!(
        err,
        DatasetError::Ingest(IngestError::TableNotFound { ref table }) if table == "labevents"
    ));
}

#[test]
fn empty_table_list_is_rejected() {
    let root = fixture_root();
    let err = BaseDataset::builder(root.path(), config())
        .build()
        .expect_err("no tables");
    assert!(matches!(err, DatasetError::NoTables));
}

#[test]
fn iter_patients_in_first_seen_order() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["procedures", "diagnoses"])
        .build()
        .unwrap();

    let patients: Vec<_> = dataset.iter_patients().unwrap().collect();
    let ids: Vec<&str> = patients.iter().map(|p| p.patient_id()).collect();
    assert_eq!(ids, vec!["P2", "P3", "P1"]);

    let total: usize = patients.iter().map(|p| p.len()).sum();
    assert_eq!(total, dataset.collected_relation().unwrap().height());
    assert_eq!(patients[0].event_types().unwrap(), vec!["procedures", "diagnoses"]);
}

#[test]
fn stats_summary() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .name("demo")
        .build()
        .unwrap();

    let stats = dataset.stats().unwrap();
    assert_eq!(stats.patients, 3);
    assert_eq!(stats.events, 5);
    insta::assert_snapshot!(stats.to_string(), @r"
    Dataset: demo
    Number of patients: 3
    Number of events: 5
    Events by type:
      diagnoses: 3
      procedures: 2
    ");

    let table = stats.to_table().to_string();
    assert!(table.contains("TOTAL"));
    assert!(table.contains("procedures"));
}

#[test]
fn default_dataset_name() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .table("procedures")
        .build()
        .unwrap();
    assert_eq!(dataset.name(), DEFAULT_DATASET_NAME);
    assert_eq!(dataset.tables(), &["procedures"]);
}

#[test]
fn timestamp_failures_are_counted_per_table() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .build()
        .unwrap();

    let failures = dataset.timestamp_parse_failures().unwrap();
    assert_eq!(failures["diagnoses"], 1);
    assert_eq!(failures["procedures"], 0);
}

#[test]
fn patient_time_window() {
    let root = fixture_root();
    let dataset = BaseDataset::builder(root.path(), config())
        .tables(["diagnoses", "procedures"])
        .build()
        .unwrap();
    let patient = dataset.get_patient("P2").unwrap();

    let start = chrono::NaiveDate::from_ymd_opt(2021, 3, 5)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let window = patient.filter_events(None, Some(start), None).unwrap();
    assert_eq!(strings(&window, "event_type"), vec![Some("procedures".to_string())]);

    let sorted = patient.sorted_by_time().unwrap();
    let types: Vec<String> = sorted
        .events(None)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, vec!["diagnoses", "procedures"]);
}

#[test]
fn blank_patient_ids_are_not_patients() {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "dx.csv",
        "pid,ts,code\n\
         P1,2020-01-01 10:00:00,428.0\n\
         \" \t\",2020-01-02 10:00:00,401.9\n\
         ,2020-01-03 10:00:00,V45.81\n",
    );
    let dataset = BaseDataset::builder(root.path(), config())
        .table("diagnoses")
        .build()
        .unwrap();

    assert_eq!(dataset.collected_relation().unwrap().height(), 1);
    assert_eq!(dataset.unique_patient_ids().unwrap(), &["P1"]);
    let ids: Vec<String> = dataset
        .iter_patients()
        .unwrap()
        .map(|p| p.patient_id().to_string())
        .collect();
    assert_eq!(ids, vec!["P1"]);
    assert_eq!(dataset.stats().unwrap().patients, 1);
    assert!(matches!(
        dataset.get_patient(" \t"),
        Err(DatasetError::PatientNotFound { .. })
    ));
}
