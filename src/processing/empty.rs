//! Dropping fully-missing rows and columns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransformResult;
use crate::table::Table;

/// Which axes [`remove_empty`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyAxis {
    /// Drop only rows whose cells are all null.
    Rows,
    /// Drop only columns whose cells are all null.
    Columns,
    /// Drop both (default).
    #[default]
    Both,
}

impl EmptyAxis {
    fn rows(self) -> bool {
        matches!(self, Self::Rows | Self::Both)
    }

    fn columns(self) -> bool {
        matches!(self, Self::Columns | Self::Both)
    }
}

/// Remove rows and/or columns in which every cell is [`crate::types::Value::Null`].
///
/// Emptiness on both axes is judged against the input table, so the result does not depend on
/// which axis is processed first. Only the null tag counts as missing; `NaN` and `""` do not.
pub fn remove_empty(table: &Table, axis: EmptyAxis) -> TransformResult<Table> {
    let keep_rows: Vec<usize> = if axis.rows() {
        table
            .rows()
            .filter(|row| row.values().iter().any(|v| !v.is_null()))
            .map(|row| row.index())
            .collect()
    } else {
        (0..table.row_count()).collect()
    };

    let keep_cols: Vec<usize> = table
        .columns()
        .enumerate()
        .filter(|(_, (_, col))| !(axis.columns() && col.is_all_null()))
        .map(|(i, _)| i)
        .collect();

    let out = table.select_positions(&keep_cols).take_rows(&keep_rows);
    debug!(
        rows_in = table.row_count(),
        rows_out = out.row_count(),
        columns_in = table.column_count(),
        columns_out = out.column_count(),
        "remove_empty"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{remove_empty, EmptyAxis};
    use crate::table::{Column, Table};

    fn sample() -> Table {
        Table::new(vec![
            ("a", Column::int64([Some(1), None, Some(3)])),
            ("b", Column::int64([Some(4), None, Some(6)])),
            ("c", Column::float64([None, None, None])),
        ])
        .unwrap()
    }

    #[test]
    fn drops_empty_rows_and_columns() {
        let out = remove_empty(&sample(), EmptyAxis::Both).unwrap();
        let expected = Table::new(vec![
            ("a", Column::int64([Some(1), Some(3)])),
            ("b", Column::int64([Some(4), Some(6)])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn single_axis_modes() {
        let rows_only = remove_empty(&sample(), EmptyAxis::Rows).unwrap();
        assert_eq!(rows_only.row_count(), 2);
        assert_eq!(rows_only.column_names(), vec!["a", "b", "c"]);

        let cols_only = remove_empty(&sample(), EmptyAxis::Columns).unwrap();
        assert_eq!(cols_only.row_count(), 3);
        assert_eq!(cols_only.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn nan_is_not_missing() {
        let t = Table::new(vec![("x", Column::float64([Some(f64::NAN), None]))]).unwrap();
        let out = remove_empty(&t, EmptyAxis::Both).unwrap();
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn untouched_columns_are_shared_when_no_rows_drop() {
        let t = sample();
        let out = remove_empty(&t, EmptyAxis::Columns).unwrap();
        assert!(out.shares_column(&t, "a"));
    }

    #[test]
    fn axis_deserializes_from_lowercase() {
        let axis: EmptyAxis = serde_json::from_str("\"columns\"").unwrap();
        assert_eq!(axis, EmptyAxis::Columns);
    }
}
