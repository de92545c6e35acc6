//! Schema-union concatenation of per-table event relations.

use ehr_ingest::TableLoader;
use ehr_model::EventSchema;
use polars::prelude::*;

use crate::error::{DatasetError, Result};

/// Load `tables` and row-concatenate them into one lazy event relation.
///
/// The output columns are the union of every table's columns: the base
/// columns first, then attribute columns in first-seen table order. Cells of
/// columns a table does not produce are null. Nothing is evaluated.
///
/// # Errors
///
/// [`DatasetError::NoTables`] for an empty list, otherwise the first loading
/// error of any table.
pub fn load_data<S: AsRef<str>>(loader: &TableLoader, tables: &[S]) -> Result<LazyFrame> {
    if tables.is_empty() {
        return Err(DatasetError::NoTables);
    }
    let schemas = tables
        .iter()
        .map(|table| loader.event_schema(table.as_ref()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let union = EventSchema::union(&schemas);

    let mut frames = Vec::with_capacity(tables.len());
    for (table, schema) in tables.iter().zip(&schemas) {
        let frame = loader.load_table(table.as_ref())?;
        frames.push(align_to(frame, schema, &union));
    }
    tracing::debug!(
        tables = frames.len(),
        columns = union.width(),
        "Unified event relation"
    );
    Ok(concat(frames, UnionArgs::default())?)
}

fn align_to(frame: LazyFrame, schema: &EventSchema, union: &EventSchema) -> LazyFrame {
    let exprs: Vec<Expr> = union
        .columns()
        .iter()
        .map(|name| {
            if schema.contains(name) {
                col(name.as_str())
            } else {
                lit(NULL).cast(DataType::String).alias(name.as_str())
            }
        })
        .collect();
    frame.select(exprs)
}
