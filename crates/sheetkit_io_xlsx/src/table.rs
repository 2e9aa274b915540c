//! Table sources accepted by bulk ingestion.

use std::io::Cursor;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader, TimeUnit};

use crate::error::ExcelWriterResult;
use crate::spec::EnumCellValue;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const N_DAYS_FROM_CE_UNIX_EPOCH: i32 = 719_163;

/// Tabular source: ordered column names plus records in the same column order.
pub trait TableSource {
    /// Column names, used as the destination header.
    fn column_names(&self) -> Vec<String>;

    /// Records, each holding one value per column.
    fn records(&self) -> ExcelWriterResult<Vec<Vec<EnumCellValue>>>;
}

/// Owned in-memory table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    pub columns: Vec<String>,
    pub records: Vec<Vec<EnumCellValue>>,
}

impl SpecTable {
    pub fn new(columns: Vec<String>, records: Vec<Vec<EnumCellValue>>) -> Self {
        Self { columns, records }
    }
}

impl TableSource for SpecTable {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn records(&self) -> ExcelWriterResult<Vec<Vec<EnumCellValue>>> {
        Ok(self.records.clone())
    }
}

impl TableSource for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    fn records(&self) -> ExcelWriterResult<Vec<Vec<EnumCellValue>>> {
        let l_cols = self.get_columns();
        let mut l_records = Vec::with_capacity(self.height());
        for n_idx_row in 0..self.height() {
            let mut l_record = Vec::with_capacity(l_cols.len());
            for col in l_cols {
                l_record.push(derive_cell_value_from_any_value(col.get(n_idx_row)?));
            }
            l_records.push(l_record);
        }
        Ok(l_records)
    }
}

/// Decode a Polars IPC payload into a dataframe.
pub fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> ExcelWriterResult<DataFrame> {
    Ok(IpcReader::new(Cursor::new(v_ipc_df)).finish()?)
}

/// Map one Polars scalar onto the writer's cell model.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::Blank,
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::String(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::UInt64(val) => i64::try_from(val)
            .map_or_else(|_| EnumCellValue::Text(val.to_string()), EnumCellValue::Integer),
        AnyValue::Int8(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int16(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int32(val) => EnumCellValue::Integer(val as i64),
        AnyValue::Int64(val) => EnumCellValue::Integer(val),
        AnyValue::Int128(val) => i64::try_from(val)
            .map_or_else(|_| EnumCellValue::Text(val.to_string()), EnumCellValue::Integer),
        AnyValue::Float32(val) => EnumCellValue::Real(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Real(val),
        AnyValue::Date(n_days) => derive_date_from_unix_days(n_days)
            .map_or_else(|| EnumCellValue::Text(value.to_string()), EnumCellValue::Date),
        AnyValue::Datetime(n_ticks, time_unit, _) => {
            derive_timestamp_from_unix_ticks(n_ticks, time_unit)
                .map_or_else(|| EnumCellValue::Text(value.to_string()), EnumCellValue::Timestamp)
        }
        _ => EnumCellValue::Text(value.to_string()),
    }
}

fn derive_date_from_unix_days(n_days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(n_days.checked_add(N_DAYS_FROM_CE_UNIX_EPOCH)?)
}

fn derive_timestamp_from_unix_ticks(n_ticks: i64, time_unit: TimeUnit) -> Option<NaiveDateTime> {
    let n_ticks_per_second: i64 = match time_unit {
        TimeUnit::Nanoseconds => 1_000_000_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Milliseconds => 1_000,
    };
    let n_nanos_per_tick = 1_000_000_000 / n_ticks_per_second;

    let n_secs = n_ticks.div_euclid(n_ticks_per_second);
    let n_nanos = n_ticks.rem_euclid(n_ticks_per_second) * n_nanos_per_tick;
    DateTime::from_timestamp(n_secs, u32::try_from(n_nanos).ok()?).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use polars::df;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_dataframe_records_follow_column_order() {
        let df = df!(
            "id" => [1i64, 2],
            "amount" => [2.5f64, 3.0],
            "label" => ["a", "b"]
        )
        .expect("valid dataframe");

        assert_eq!(
            TableSource::column_names(&df),
            vec!["id", "amount", "label"]
        );
        assert_eq!(
            TableSource::records(&df).expect("readable records"),
            vec![
                vec![
                    EnumCellValue::Integer(1),
                    EnumCellValue::Real(2.5),
                    EnumCellValue::Text("a".to_string())
                ],
                vec![
                    EnumCellValue::Integer(2),
                    EnumCellValue::Real(3.0),
                    EnumCellValue::Text("b".to_string())
                ],
            ]
        );
    }

    #[test]
    fn test_any_value_mapping() {
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Null),
            EnumCellValue::Blank
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::UInt64(u64::MAX)),
            EnumCellValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Boolean(true)),
            EnumCellValue::Boolean(true)
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Date(19_723)),
            EnumCellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"))
        );
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::Datetime(
                1_704_112_200_000,
                TimeUnit::Milliseconds,
                None
            )),
            EnumCellValue::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .and_then(|d| d.and_hms_opt(12, 30, 0))
                    .expect("valid timestamp")
            )
        );
    }

    #[test]
    fn test_negative_ticks_round_toward_past() {
        assert_eq!(
            derive_timestamp_from_unix_ticks(-1, TimeUnit::Milliseconds),
            NaiveDate::from_ymd_opt(1969, 12, 31).and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
        );
    }

    #[test]
    fn test_invalid_ipc_payload_is_table_error() {
        assert!(matches!(
            derive_dataframe_from_ipc_bytes(b"not an ipc payload"),
            Err(crate::error::ExcelWriterError::Table(_))
        ));
    }
}
