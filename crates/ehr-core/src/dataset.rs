//! The base dataset: a lazily built, once-materialized event relation with
//! patient views and task application.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use ehr_common::column_strings;
use ehr_ingest::{TableLoader, TableScanner, load_config};
use ehr_model::{DatasetConfig, EVENT_TYPE, PATIENT_ID};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::error::{DatasetError, Result};
use crate::logging::redact_value;
use crate::patient::{Patient, PatientIter};
use crate::task::{SampleDataset, Task};
use crate::unify::load_data;

/// Name used when none is given.
pub const DEFAULT_DATASET_NAME: &str = "BaseDataset";

const PROGRESS_TEMPLATE: &str = "{msg} [{bar:40}] {pos}/{len} ({elapsed})";

/// A clinical dataset assembled from configured source tables.
///
/// The unified lazy relation is built on construction, so configuration and
/// missing-file errors surface immediately. It is evaluated at most once, on
/// the first call that needs data.
pub struct BaseDataset {
    name: String,
    tables: Vec<String>,
    loader: TableLoader,
    global_event_df: LazyFrame,
    collected: OnceCell<DataFrame>,
    unique_patient_ids: OnceCell<Vec<String>>,
    default_task: Option<Box<dyn Task>>,
    show_progress: bool,
}

impl fmt::Debug for BaseDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseDataset")
            .field("name", &self.name)
            .field("root", &self.loader.root())
            .field("tables", &self.tables)
            .field("materialized", &self.is_materialized())
            .finish_non_exhaustive()
    }
}

impl BaseDataset {
    /// Load `tables` from `root` as described by the YAML file at `config_path`.
    pub fn new<S: Into<String>>(
        root: impl Into<PathBuf>,
        tables: impl IntoIterator<Item = S>,
        dataset_name: Option<&str>,
        config_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let config = load_config(config_path)?;
        let mut builder = Self::builder(root, config).tables(tables);
        if let Some(name) = dataset_name {
            builder = builder.name(name);
        }
        builder.build()
    }

    pub fn builder(root: impl Into<PathBuf>, config: DatasetConfig) -> DatasetBuilder {
        DatasetBuilder::new(root, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        self.loader.root()
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn config(&self) -> &DatasetConfig {
        self.loader.config()
    }

    /// The unified relation, unevaluated.
    pub fn global_event_df(&self) -> &LazyFrame {
        &self.global_event_df
    }

    pub fn default_task(&self) -> Option<&dyn Task> {
        self.default_task.as_deref()
    }

    /// Whether the relation has been evaluated.
    pub fn is_materialized(&self) -> bool {
        self.collected.get().is_some()
    }

    /// The evaluated relation. The first call evaluates; later calls return
    /// the same frame.
    pub fn collected_relation(&self) -> Result<&DataFrame> {
        if let Some(df) = self.collected.get() {
            return Ok(df);
        }
        let span = info_span!("materialize", dataset = %self.name);
        let _guard = span.enter();
        let df = self.global_event_df.clone().collect()?;
        info!(
            rows = df.height(),
            columns = df.width(),
            "Materialized event relation"
        );
        Ok(self.collected.get_or_init(|| df))
    }

    /// Distinct patient identifiers, sorted.
    pub fn unique_patient_ids(&self) -> Result<&[String]> {
        if let Some(ids) = self.unique_patient_ids.get() {
            return Ok(ids.as_slice());
        }
        let df = self.collected_relation()?;
        let ids: BTreeSet<String> = df
            .column(PATIENT_ID)?
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        let ids = self.unique_patient_ids.get_or_init(|| ids.into_iter().collect());
        Ok(ids.as_slice())
    }

    /// All events of one patient.
    ///
    /// # Errors
    ///
    /// [`DatasetError::PatientNotFound`] when the id does not occur.
    pub fn get_patient(&self, patient_id: &str) -> Result<Patient> {
        let known = self
            .unique_patient_ids()?
            .binary_search_by(|id| id.as_str().cmp(patient_id))
            .is_ok();
        if !known {
            return Err(DatasetError::PatientNotFound {
                patient_id: patient_id.to_string(),
            });
        }
        let data = self
            .collected_relation()?
            .clone()
            .lazy()
            .filter(col(PATIENT_ID).eq(lit(patient_id)))
            .collect()?;
        debug!(
            patient = redact_value(patient_id),
            events = data.height(),
            "Extracted patient"
        );
        Ok(Patient::new(patient_id, data))
    }

    /// Every patient, in order of first appearance in the relation.
    pub fn iter_patients(&self) -> Result<PatientIter> {
        let df = self.collected_relation()?;
        if df.height() == 0 {
            return Ok(PatientIter::new(Vec::new()));
        }
        let patients = df
            .partition_by_stable([PATIENT_ID], true)?
            .into_iter()
            .map(|part| -> Result<Patient> {
                let patient_id = part
                    .column(PATIENT_ID)?
                    .str()?
                    .get(0)
                    .map(str::to_string)
                    .unwrap_or_default();
                Ok(Patient::new(patient_id, part))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PatientIter::new(patients))
    }

    /// Patient, event and per-type counts. Also logged at info level.
    pub fn stats(&self) -> Result<DatasetStats> {
        let patients = self.unique_patient_ids()?.len();
        let df = self.collected_relation()?;
        let mut events_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for event_type in column_strings(df.column(EVENT_TYPE)?)?.into_iter().flatten() {
            *events_by_type.entry(event_type).or_default() += 1;
        }
        let stats = DatasetStats {
            dataset_name: self.name.clone(),
            patients,
            events: df.height(),
            events_by_type,
        };
        info!(
            dataset = %stats.dataset_name,
            patients = stats.patients,
            events = stats.events,
            "Dataset statistics"
        );
        Ok(stats)
    }

    /// Rows per table whose timestamp is present but unparseable.
    ///
    /// Each table is evaluated separately; non-zero counts are logged as warnings.
    pub fn timestamp_parse_failures(&self) -> Result<BTreeMap<String, usize>> {
        let mut failures = BTreeMap::new();
        for table in &self.tables {
            if failures.contains_key(table) {
                continue;
            }
            let count = self.loader.timestamp_parse_failures(table)?;
            if count > 0 {
                warn!(
                    table = %table,
                    rows = count,
                    "Timestamps did not match the expected format and were set to null"
                );
            }
            failures.insert(table.clone(), count);
        }
        Ok(failures)
    }

    /// Apply `task` (or the default task) to every patient and pool the samples.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::NoDefaultTask`] if `task` is `None` and no default is set
    /// - [`DatasetError::Task`] if the task fails for a patient
    /// - [`DatasetError::SampleMissingField`] if a sample lacks a declared field
    pub fn set_task(&self, task: Option<&dyn Task>) -> Result<SampleDataset> {
        let task = match task.or(self.default_task.as_deref()) {
            Some(task) => task,
            None => {
                return Err(DatasetError::NoDefaultTask {
                    dataset: self.name.clone(),
                });
            }
        };
        let span = info_span!("set_task", dataset = %self.name, task = %task.task_name());
        let _guard = span.enter();
        info!("Setting task for {} base dataset", self.name);

        let patients = self.iter_patients()?;
        let progress = self.progress_bar(patients.len(), task.task_name());
        let mut samples = Vec::new();
        for patient in patients {
            let produced = task.call(&patient).map_err(|source| {
                warn!(
                    patient = redact_value(patient.patient_id()),
                    "Task failed for patient"
                );
                DatasetError::Task {
                    task: task.task_name().to_string(),
                    patient_id: patient.patient_id().to_string(),
                    source,
                }
            })?;
            samples.extend(produced);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let dataset = SampleDataset::new(
            samples,
            task.input_schema().clone(),
            task.output_schema().clone(),
            self.name.as_str(),
            task.task_name(),
        )?;
        info!(samples = dataset.len(), "Generated samples");
        Ok(dataset)
    }

    fn progress_bar(&self, patients: usize, task_name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(u64::try_from(patients).unwrap_or(u64::MAX));
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(format!("Generating samples for {task_name}"));
        bar
    }
}

/// Builder for [`BaseDataset`].
pub struct DatasetBuilder {
    root: PathBuf,
    config: DatasetConfig,
    tables: Vec<String>,
    name: Option<String>,
    scanner: Option<Box<dyn TableScanner>>,
    default_task: Option<Box<dyn Task>>,
    show_progress: bool,
}

impl DatasetBuilder {
    pub fn new(root: impl Into<PathBuf>, config: DatasetConfig) -> Self {
        Self {
            root: root.into(),
            config,
            tables: Vec::new(),
            name: None,
            scanner: None,
            default_task: None,
            show_progress: true,
        }
    }

    /// Tables to load, in concatenation order.
    pub fn tables<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    /// Dataset name (default [`DEFAULT_DATASET_NAME`]).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Scanner for source and join files (default CSV).
    pub fn scanner(mut self, scanner: impl TableScanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    /// Task applied by `set_task(None)`.
    pub fn default_task(mut self, task: impl Task + 'static) -> Self {
        self.default_task = Some(Box::new(task));
        self
    }

    /// Show a progress bar while applying tasks (default on).
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Build the unified lazy relation and the dataset around it.
    ///
    /// # Errors
    ///
    /// [`DatasetError::NoTables`] for an empty table list, otherwise any
    /// configuration or missing-file error of the requested tables.
    pub fn build(self) -> Result<BaseDataset> {
        let name = self
            .name
            .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string());
        info!(
            "Initializing {} dataset from {}",
            name,
            self.root.display()
        );
        let mut loader = TableLoader::new(self.root, self.config);
        if let Some(scanner) = self.scanner {
            loader = loader.with_scanner(scanner);
        }
        let global_event_df = load_data(&loader, &self.tables)?;
        Ok(BaseDataset {
            name,
            tables: self.tables,
            loader,
            global_event_df,
            collected: OnceCell::new(),
            unique_patient_ids: OnceCell::new(),
            default_task: self.default_task,
            show_progress: self.show_progress,
        })
    }
}

/// Summary counts of a materialized dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetStats {
    pub dataset_name: String,
    pub patients: usize,
    pub events: usize,
    pub events_by_type: BTreeMap<String, usize>,
}

impl DatasetStats {
    /// Per-event-type counts as a terminal table with a total row.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Event type").add_attribute(Attribute::Bold),
                Cell::new("Events").add_attribute(Attribute::Bold),
            ]);
        for (event_type, count) in &self.events_by_type {
            table.add_row(vec![Cell::new(event_type), Cell::new(count)]);
        }
        table.add_row(vec![
            Cell::new("TOTAL")
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new(self.events).add_attribute(Attribute::Bold),
        ]);
        if let Some(column) = table.column_mut(1) {
            column.set_cell_alignment(CellAlignment::Right);
        }
        table
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.dataset_name)?;
        writeln!(f, "Number of patients: {}", self.patients)?;
        write!(f, "Number of events: {}", self.events)?;
        if !self.events_by_type.is_empty() {
            write!(f, "\nEvents by type:")?;
            for (event_type, count) in &self.events_by_type {
                write!(f, "\n  {event_type}: {count}")?;
            }
        }
        Ok(())
    }
}
