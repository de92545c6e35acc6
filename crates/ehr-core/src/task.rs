//! Tasks and the sample datasets they produce.
//!
//! A [`Task`] maps one [`Patient`] to zero or more labeled samples and
//! declares the input and output fields those samples carry. Task logic is
//! supplied by the caller; [`BaseDataset::set_task`](crate::BaseDataset::set_task)
//! only drives it over every patient and pools the results.

use std::collections::BTreeMap;

use ehr_model::{FieldKind, FieldSchema, PATIENT_ID, Sample, SampleValue};

use crate::error::{DatasetError, Result};
use crate::patient::Patient;

/// A sample-generation task.
pub trait Task {
    /// Name used in logs, errors and the resulting [`SampleDataset`].
    fn task_name(&self) -> &str;

    /// Fields consumed by a model.
    fn input_schema(&self) -> &FieldSchema;

    /// Label fields.
    fn output_schema(&self) -> &FieldSchema;

    /// Produce the samples of one patient.
    fn call(&self, patient: &Patient) -> anyhow::Result<Vec<Sample>>;
}

/// A [`Task`] built from a closure.
///
/// ```ignore
/// let task = FnTask::new("diagnosis_count", |patient: &Patient| {
///     let mut sample = Sample::new();
///     sample.insert("patient_id".into(), patient.patient_id().into());
///     sample.insert("count".into(), (patient.len() as i64).into());
///     Ok(vec![sample])
/// })
/// .with_input("patient_id", FieldKind::Text)
/// .with_output("count", FieldKind::Regression);
/// ```
pub struct FnTask<F> {
    name: String,
    input_schema: FieldSchema,
    output_schema: FieldSchema,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(&Patient) -> anyhow::Result<Vec<Sample>>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            input_schema: FieldSchema::new(),
            output_schema: FieldSchema::new(),
            func,
        }
    }

    pub fn with_input(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.input_schema.insert(field.into(), kind);
        self
    }

    pub fn with_output(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.output_schema.insert(field.into(), kind);
        self
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(&Patient) -> anyhow::Result<Vec<Sample>>,
{
    fn task_name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &FieldSchema {
        &self.input_schema
    }

    fn output_schema(&self) -> &FieldSchema {
        &self.output_schema
    }

    fn call(&self, patient: &Patient) -> anyhow::Result<Vec<Sample>> {
        (self.func)(patient)
    }
}

/// Samples pooled from every patient, with the schemas of the task that made them.
#[derive(Debug, Clone)]
pub struct SampleDataset {
    samples: Vec<Sample>,
    input_schema: FieldSchema,
    output_schema: FieldSchema,
    dataset_name: String,
    task_name: String,
    patient_to_index: BTreeMap<String, Vec<usize>>,
}

impl SampleDataset {
    /// Wrap `samples`, checking that each carries every declared field.
    ///
    /// # Errors
    ///
    /// [`DatasetError::SampleMissingField`] for the first sample lacking an
    /// input or output field.
    pub fn new(
        samples: Vec<Sample>,
        input_schema: FieldSchema,
        output_schema: FieldSchema,
        dataset_name: impl Into<String>,
        task_name: impl Into<String>,
    ) -> Result<Self> {
        let task_name = task_name.into();
        let mut patient_to_index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, sample) in samples.iter().enumerate() {
            for field in input_schema.keys().chain(output_schema.keys()) {
                if !sample.contains_key(field) {
                    return Err(DatasetError::SampleMissingField {
                        task: task_name,
                        field: field.clone(),
                        index,
                    });
                }
            }
            if let Some(patient_id) = sample.get(PATIENT_ID).and_then(SampleValue::as_text) {
                patient_to_index
                    .entry(patient_id.to_string())
                    .or_default()
                    .push(index);
            }
        }
        Ok(Self {
            samples,
            input_schema,
            output_schema,
            dataset_name: dataset_name.into(),
            task_name,
            patient_to_index,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn input_schema(&self) -> &FieldSchema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &FieldSchema {
        &self.output_schema
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Sample positions per patient, for samples with a text `patient_id` field.
    pub fn patient_to_index(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.patient_to_index
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

impl<'a> IntoIterator for &'a SampleDataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
