//! Data-quality summaries of a table, for logging between pipeline steps.

use serde::Serialize;
use tracing::{info, warn};

use crate::processing::dupes::group_rows;
use crate::table::Table;
use crate::types::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: DataType,
    /// Number of null cells.
    pub missing: usize,
}

/// Shape, per-column missing counts and duplicate rows of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    /// Rows that repeat an earlier row exactly (the first occurrence is not counted).
    pub duplicate_rows: usize,
}

impl TableProfile {
    pub fn missing_total(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }

    /// Columns with at least one missing cell.
    pub fn columns_with_missing(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.missing > 0)
    }

    /// Emit the profile as `tracing` events, tagged with the pipeline `step` that produced the
    /// table.
    pub fn log(&self, step: &str) {
        info!(
            step,
            rows = self.row_count,
            columns = self.column_count,
            missing = self.missing_total(),
            "table profile"
        );
        for col in self.columns_with_missing() {
            let share = if self.row_count == 0 {
                0.0
            } else {
                col.missing as f64 * 100.0 / self.row_count as f64
            };
            warn!(
                step,
                column = %col.name,
                missing = col.missing,
                "missing values ({share:.1}%)"
            );
        }
        if self.duplicate_rows > 0 {
            warn!(step, duplicate_rows = self.duplicate_rows, "duplicated rows");
        }
    }
}

/// Profile `table`. Nulls compare equal when counting duplicate rows.
pub fn profile(table: &Table) -> TableProfile {
    let positions: Vec<usize> = (0..table.column_count()).collect();
    let duplicate_rows = group_rows(table, &positions)
        .iter()
        .map(|g| g.len() - 1)
        .sum();

    TableProfile {
        row_count: table.row_count(),
        column_count: table.column_count(),
        columns: table
            .columns()
            .map(|(name, col)| ColumnProfile {
                name: name.to_string(),
                data_type: col.data_type(),
                missing: col.null_count(),
            })
            .collect(),
        duplicate_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::profile;
    use crate::table::{Column, Table};
    use crate::types::DataType;

    #[test]
    fn counts_shape_missing_and_duplicates() {
        let t = Table::new(vec![
            ("a", Column::int64([Some(1), Some(1), None, Some(1)])),
            ("b", Column::utf8([Some("x"), Some("x"), None, Some("x")])),
        ])
        .unwrap();
        let p = profile(&t);
        assert_eq!(p.row_count, 4);
        assert_eq!(p.column_count, 2);
        assert_eq!(p.columns[0].data_type, DataType::Int64);
        assert_eq!(p.columns[1].missing, 1);
        assert_eq!(p.missing_total(), 2);
        assert_eq!(p.duplicate_rows, 2);
        assert_eq!(p.columns_with_missing().count(), 2);
    }

    #[test]
    fn empty_table_profile() {
        let p = profile(&Table::empty());
        assert_eq!((p.row_count, p.column_count, p.duplicate_rows), (0, 0, 0));
        p.log("empty");
    }

    #[test]
    fn serializes_to_json() {
        let t = Table::new(vec![("a", Column::float64([None]))]).unwrap();
        let json = serde_json::to_value(profile(&t)).unwrap();
        assert_eq!(json["columns"][0]["missing"], 1);
        assert_eq!(json["duplicate_rows"], 0);
    }
}
