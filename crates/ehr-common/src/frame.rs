//! Polars cell and column conversions.
//!
//! Event frames carry text attributes and a microsecond `Datetime` timestamp.
//! These helpers read them back as `String` and `NaiveDateTime` values.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

/// Converts microseconds since the Unix epoch to a naive date-time.
pub fn micros_to_datetime(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Reads a column as optional text values, one per row.
///
/// Non-text columns are cast to text first. Nulls and blank cells are `None`.
pub fn column_strings(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|value| value.filter(|v| !v.trim().is_empty()).map(str::to_string))
        .collect())
}

/// Reads a `Datetime` column as optional naive date-times, one per row.
///
/// An all-null column of `Null` dtype yields `None` for every row.
pub fn column_datetimes(column: &Column) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let unit = match column.dtype() {
        DataType::Datetime(unit, _) => *unit,
        DataType::Null => return Ok(vec![None; column.len()]),
        other => {
            return Err(PolarsError::SchemaMismatch(
                format!(
                    "expected datetime column '{}', found {other}",
                    column.name()
                )
                .into(),
            ));
        }
    };
    let physical = column.cast(&DataType::Int64)?;
    let values = physical
        .i64()?
        .into_iter()
        .map(|value| {
            value.and_then(|v| match unit {
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v).naive_utc()),
                TimeUnit::Microseconds => micros_to_datetime(v),
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v).map(|dt| dt.naive_utc()),
            })
        })
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_micros_to_datetime() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("valid date");
        let micros = expected.and_utc().timestamp_micros();
        assert_eq!(micros_to_datetime(micros), Some(expected));
    }

    #[test]
    fn test_column_strings_blank_is_none() {
        let column = Column::new("dx/code".into(), [Some("428.0"), None, Some(" ")]);
        let values = column_strings(&column).expect("read strings");
        assert_eq!(values, vec![Some("428.0".to_string()), None, None]);
    }

    #[test]
    fn test_column_strings_non_text() {
        let column = Column::new("dose".into(), [Some(2.5f64), None]);
        let values = column_strings(&column).expect("read strings");
        assert_eq!(values, vec![Some("2.5".to_string()), None]);

        let column = Column::new("seq".into(), [100i64, 20]);
        let values = column_strings(&column).expect("read strings");
        assert_eq!(values, vec![Some("100".to_string()), Some("20".to_string())]);
    }

    #[test]
    fn test_column_datetimes_reads_micros() {
        let expected = NaiveDate::from_ymd_opt(2021, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date");
        let micros = expected.and_utc().timestamp_micros();
        let column = Column::new("timestamp".into(), [Some(micros), None])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .expect("cast to datetime");
        let values = column_datetimes(&column).expect("read datetimes");
        assert_eq!(values, vec![Some(expected), None]);
    }

    #[test]
    fn test_column_datetimes_rejects_text() {
        let column = Column::new("timestamp".into(), ["2020-01-01"]);
        assert!(column_datetimes(&column).is_err());
    }
}
