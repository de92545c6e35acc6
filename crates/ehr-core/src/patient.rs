//! Per-patient views over the materialized event relation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use ehr_common::{column_datetimes, column_strings};
use ehr_model::{EVENT_TYPE, Event, TIMESTAMP, namespaced_attribute};
use polars::prelude::*;

use crate::error::Result;

/// The events of one patient.
///
/// Holds a slice of the dataset's collected relation with the unified column
/// layout. Rows keep relation order unless [`sorted_by_time`](Self::sorted_by_time)
/// is used.
#[derive(Debug, Clone)]
pub struct Patient {
    patient_id: String,
    data: DataFrame,
}

impl Patient {
    pub fn new(patient_id: impl Into<String>, data: DataFrame) -> Self {
        Self {
            patient_id: patient_id.into(),
            data,
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// The patient's rows in the unified event layout.
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Distinct event types in first-seen order.
    pub fn event_types(&self) -> Result<Vec<String>> {
        let mut seen: Vec<String> = Vec::new();
        for value in column_strings(self.data.column(EVENT_TYPE)?)?
            .into_iter()
            .flatten()
        {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Ok(seen)
    }

    /// Typed events, optionally restricted to one event type.
    ///
    /// Each event carries the non-null attributes of its own table, keyed by
    /// bare attribute name.
    pub fn events(&self, event_type: Option<&str>) -> Result<Vec<Event>> {
        let types = column_strings(self.data.column(EVENT_TYPE)?)?;
        let timestamps = column_datetimes(self.data.column(TIMESTAMP)?)?;
        let kinds: BTreeSet<&str> = types
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|kind| event_type.is_none_or(|wanted| wanted == *kind))
            .collect();

        // Each attribute column belongs to the longest event type that prefixes it.
        let mut attributes: BTreeMap<&str, Vec<(String, Vec<Option<String>>)>> = BTreeMap::new();
        for column in self.data.get_columns() {
            let name = column.name().as_str();
            let owner = kinds
                .iter()
                .filter_map(|kind| namespaced_attribute(name, kind).map(|attr| (*kind, attr)))
                .max_by_key(|(kind, _)| kind.len());
            if let Some((kind, attribute)) = owner {
                attributes
                    .entry(kind)
                    .or_default()
                    .push((attribute.to_string(), column_strings(column)?));
            }
        }

        let mut events = Vec::new();
        for (row, kind) in types.iter().enumerate() {
            let Some(kind) = kind.as_deref().filter(|kind| kinds.contains(kind)) else {
                continue;
            };
            let mut event = Event::new(kind, timestamps.get(row).copied().flatten());
            for (attribute, values) in attributes.get(kind).into_iter().flatten() {
                if let Some(Some(value)) = values.get(row) {
                    event = event.with_attribute(attribute.as_str(), value.as_str());
                }
            }
            events.push(event);
        }
        Ok(events)
    }

    /// Rows of one event type (or all) within an inclusive time window.
    ///
    /// When either bound is given, rows without a timestamp are excluded.
    pub fn filter_events(
        &self,
        event_type: Option<&str>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<DataFrame> {
        let micros = || col(TIMESTAMP).cast(DataType::Int64);
        let mut predicates = Vec::new();
        if let Some(kind) = event_type {
            predicates.push(col(EVENT_TYPE).eq(lit(kind)));
        }
        if let Some(start) = start {
            predicates.push(micros().gt_eq(lit(start.and_utc().timestamp_micros())));
        }
        if let Some(end) = end {
            predicates.push(micros().lt_eq(lit(end.and_utc().timestamp_micros())));
        }
        let Some(predicate) = predicates.into_iter().reduce(Expr::and) else {
            return Ok(self.data.clone());
        };
        Ok(self.data.clone().lazy().filter(predicate).collect()?)
    }

    /// A copy with rows ordered by timestamp; ties keep their order, nulls last.
    pub fn sorted_by_time(&self) -> Result<Patient> {
        let sorted = self
            .data
            .clone()
            .lazy()
            .sort(
                [TIMESTAMP],
                SortMultipleOptions::default()
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            )
            .collect()?;
        Ok(Patient::new(self.patient_id.clone(), sorted))
    }
}

/// Single-pass iterator over the patients of a dataset.
#[derive(Debug)]
pub struct PatientIter {
    inner: std::vec::IntoIter<Patient>,
}

impl PatientIter {
    pub(crate) fn new(patients: Vec<Patient>) -> Self {
        Self {
            inner: patients.into_iter(),
        }
    }
}

impl Iterator for PatientIter {
    type Item = Patient;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for PatientIter {}
