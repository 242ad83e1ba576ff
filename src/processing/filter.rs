//! Row filtering for [`crate::table::Table`].

use tracing::debug;

use crate::table::{Row, Table};

/// Returns a new [`Table`] containing only rows for which `predicate` returns `true`.
///
/// Row order and the schema are preserved. A predicate that keeps every row hands back the
/// input's columns without copying them.
pub fn filter<F>(table: &Table, mut predicate: F) -> Table
where
    F: FnMut(&Row<'_>) -> bool,
{
    let keep: Vec<usize> = table
        .rows()
        .filter(|row| predicate(row))
        .map(|row| row.index())
        .collect();
    let out = table.take_rows(&keep);
    debug!(rows_in = table.row_count(), rows_out = out.row_count(), "filter");
    out
}

#[cfg(test)]
mod tests {
    use super::filter;
    use crate::table::{Column, Table};
    use crate::types::Value;

    fn sample_table() -> Table {
        Table::new(vec![
            ("id", Column::int64([Some(1), Some(2), Some(3)])),
            ("active", Column::bool([Some(true), Some(false), Some(true)])),
            ("name", Column::utf8([Some("a"), Some("b"), None])),
        ])
        .unwrap()
    }

    #[test]
    fn filter_rows_by_numeric_predicate() {
        let t = sample_table();
        let out = filter(&t, |row| matches!(row.get("id"), Some(Value::Int64(v)) if *v > 1));

        assert_eq!(out.schema(), t.schema());
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.column("id").unwrap(), &Column::int64([Some(2), Some(3)]));
        assert_eq!(out.column("name").unwrap(), &Column::utf8([Some("b"), None]));
        // Original unchanged
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn filter_rows_by_bool_predicate() {
        let t = sample_table();
        let out = filter(&t, |row| matches!(row.get("active"), Some(Value::Bool(true))));
        assert_eq!(out.column("id").unwrap(), &Column::int64([Some(1), Some(3)]));
    }

    #[test]
    fn filter_on_missing_values() {
        let t = sample_table();
        let out = filter(&t, |row| !row.is_null("name"));
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn filter_rows_can_return_empty_table() {
        let t = sample_table();
        let out = filter(&t, |_| false);
        assert_eq!(out.schema(), t.schema());
        assert_eq!(out.row_count(), 0);
    }

    #[test]
    fn keeping_everything_shares_storage() {
        let t = sample_table();
        let out = filter(&t, |_| true);
        assert!(out.shares_column(&t, "name"));
    }
}
