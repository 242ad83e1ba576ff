//! Decoding spreadsheet serial day numbers into timestamps.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::table::{Column, Table};
use crate::types::{DataType, Value};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Spreadsheet date system a serial number is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExcelDateSystem {
    /// Windows default. Day 0 is 1899-12-30: serial 1 is 1899-12-31 and every serial from 61
    /// on lands where the spreadsheet's phantom 1900-02-29 puts it.
    #[default]
    V1900,
    /// Classic Mac default. Day 0 is 1904-01-01.
    V1904,
}

impl ExcelDateSystem {
    fn origin(self) -> Option<NaiveDateTime> {
        let date = match self {
            Self::V1900 => NaiveDate::from_ymd_opt(1899, 12, 30)?,
            Self::V1904 => NaiveDate::from_ymd_opt(1904, 1, 1)?,
        };
        date.and_hms_opt(0, 0, 0)
    }

    /// Decode one serial; the fractional part is a time of day, rounded to the millisecond.
    ///
    /// Returns `None` for negative, non-finite or out-of-range serials.
    pub fn decode(self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 {
            return None;
        }
        let millis = (serial * MILLIS_PER_DAY).round();
        if millis > i64::MAX as f64 {
            return None;
        }
        let delta = TimeDelta::try_milliseconds(millis as i64)?;
        self.origin()?.checked_add_signed(delta)
    }
}

fn serial_of(value: &Value) -> Option<f64> {
    match value {
        Value::Int64(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::Utf8(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Replace `column` with a datetime column decoded from 1900-system serial numbers.
///
/// Cells that are null, negative, non-numeric or out of range become null; they never fail the
/// whole column.
pub fn convert_excel_date(table: &Table, column: &str) -> TransformResult<Table> {
    convert_excel_date_with(table, column, ExcelDateSystem::V1900)
}

/// Like [`convert_excel_date`], for an explicit [`ExcelDateSystem`].
pub fn convert_excel_date_with(
    table: &Table,
    column: &str,
    system: ExcelDateSystem,
) -> TransformResult<Table> {
    let source = table
        .column(column)
        .map_err(|_| TransformError::column_not_found("convert_excel_date", column))?;

    let values: Vec<Value> = source
        .values()
        .iter()
        .map(|v| {
            serial_of(v)
                .and_then(|s| system.decode(s))
                .map_or(Value::Null, Value::Datetime)
        })
        .collect();
    let decoded = values.iter().filter(|v| !v.is_null()).count();

    let out = table.with_column(
        "convert_excel_date",
        column,
        Column::from_parts(DataType::Datetime, values),
    )?;
    debug!(
        column,
        ?system,
        decoded,
        missing = out.row_count() - decoded,
        "convert_excel_date"
    );
    Ok(out)
}
