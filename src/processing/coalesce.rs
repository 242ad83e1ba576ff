//! Cross-column null coalescing and forward filling.

use std::sync::Arc;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::table::{Column, Row, Table};
use crate::types::{unify_types, DataType, Value};

const OP: &str = "coalesce";

/// A validated coalesce request: resolved source positions, output type and fallback.
///
/// Shared by [`coalesce`] and the execution engine's parallel variant.
pub(crate) struct CoalescePlan {
    positions: Vec<usize>,
    output_type: DataType,
    default: Value,
}

impl CoalescePlan {
    pub(crate) fn new(table: &Table, sources: &[&str], default: Value) -> TransformResult<Self> {
        if sources.is_empty() {
            return Err(TransformError::invalid_value(OP, "at least one source column is required"));
        }
        let positions = sources
            .iter()
            .map(|s| table.column_index(OP, s))
            .collect::<TransformResult<Vec<_>>>()?;

        let fields = &table.schema().fields;
        let default_type = default.data_type().map(|t| ("<default>", t));
        let output_type = unify_types(
            OP,
            positions
                .iter()
                .map(|&p| (fields[p].name.as_str(), fields[p].data_type))
                .chain(default_type),
        )?;
        let default = default.cast(output_type).ok_or_else(|| TransformError::TypeConflict {
            operator: OP,
            columns: vec!["<default>".to_string()],
            message: format!("default value {default:?} is not coercible to {output_type}"),
        })?;

        Ok(Self {
            positions,
            output_type,
            default,
        })
    }

    pub(crate) fn output_type(&self) -> DataType {
        self.output_type
    }

    /// First non-null source value for `row`, converted to the output type.
    pub(crate) fn evaluate(&self, row: &Row<'_>) -> Value {
        self.positions
            .iter()
            .filter_map(|&p| row.at(p))
            .find(|v| !v.is_null())
            .and_then(|v| v.cast(self.output_type))
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Fill column `target` with the first non-null value among `sources`, scanned left to right.
///
/// The output type is the least common supertype of the source types (e.g. int + float gives
/// float). If `target` already exists it is overwritten in place; otherwise it is appended.
/// Rows where every source is null stay null.
pub fn coalesce(table: &Table, target: &str, sources: &[&str]) -> TransformResult<Table> {
    coalesce_or(table, target, sources, Value::Null)
}

/// Like [`coalesce`], but rows where every source is null receive `default`.
pub fn coalesce_or(
    table: &Table,
    target: &str,
    sources: &[&str],
    default: Value,
) -> TransformResult<Table> {
    let plan = CoalescePlan::new(table, sources, default)?;
    let values = table.rows().map(|row| plan.evaluate(&row)).collect();
    let out = table.with_column(OP, target, Column::from_parts(plan.output_type(), values))?;
    debug!(column = target, sources = ?sources, output_type = %plan.output_type(), "coalesce");
    Ok(out)
}

/// Replace nulls in each of `columns` with the closest non-null value above them.
///
/// Leading nulls have nothing to copy and stay null. Columns not listed are shared unchanged.
pub fn fill_down(table: &Table, columns: &[&str]) -> TransformResult<Table> {
    let targets = columns
        .iter()
        .map(|c| table.column_index("fill_down", c))
        .collect::<TransformResult<Vec<_>>>()?;

    let shared = table
        .shared_columns()
        .enumerate()
        .map(|(i, (name, col))| {
            if !targets.contains(&i) {
                return (name.to_string(), Arc::clone(col));
            }
            let mut last = Value::Null;
            let values = col
                .values()
                .iter()
                .map(|v| {
                    if !v.is_null() {
                        last = v.clone();
                    }
                    last.clone()
                })
                .collect();
            (
                name.to_string(),
                Arc::new(Column::from_parts(col.data_type(), values)),
            )
        })
        .collect();

    let out = Table::from_shared("fill_down", shared)?;
    debug!(columns = ?columns, "fill_down");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{coalesce, coalesce_or, fill_down};
    use crate::error::TransformError;
    use crate::table::{Column, Table};
    use crate::types::{DataType, Value};

    #[test]
    fn first_non_null_source_wins_and_widens_to_float() {
        let t = Table::new(vec![
            ("a", Column::int64([Some(1), None, Some(3)])),
            ("b", Column::float64([None, Some(5.0), Some(6.0)])),
        ])
        .unwrap();
        let out = coalesce(&t, "c", &["a", "b"]).unwrap();
        assert_eq!(out.column_names(), vec!["a", "b", "c"]);
        assert_eq!(
            out.column("c").unwrap(),
            &Column::float64([Some(1.0), Some(5.0), Some(3.0)])
        );
        assert!(out.shares_column(&t, "a"));
    }

    #[test]
    fn all_null_sources_stay_null_unless_defaulted() {
        let t = Table::new(vec![
            ("a", Column::utf8([None::<&str>, Some("x")])),
            ("b", Column::utf8([None::<&str>, None])),
        ])
        .unwrap();
        let out = coalesce(&t, "a", &["a", "b"]).unwrap();
        assert_eq!(out.column("a").unwrap().values()[0], Value::Null);

        let out = coalesce_or(&t, "a", &["a", "b"], Value::from("absent")).unwrap();
        assert_eq!(out.column_names(), vec!["a", "b"]);
        assert_eq!(
            out.column("a").unwrap(),
            &Column::utf8([Some("absent"), Some("x")])
        );
    }

    #[test]
    fn nan_counts_as_a_value() {
        let t = Table::new(vec![
            ("a", Column::float64([Some(f64::NAN)])),
            ("b", Column::float64([Some(1.0)])),
        ])
        .unwrap();
        let out = coalesce(&t, "c", &["a", "b"]).unwrap();
        assert!(out.column("c").unwrap().values()[0].as_f64().unwrap().is_nan());
    }

    #[test]
    fn strings_absorb_numbers() {
        let t = Table::new(vec![
            ("a", Column::utf8([None, Some("x")])),
            ("b", Column::int64([Some(7), Some(8)])),
        ])
        .unwrap();
        let out = coalesce(&t, "c", &["a", "b"]).unwrap();
        assert_eq!(out.column("c").unwrap().data_type(), DataType::Utf8);
        assert_eq!(out.column("c").unwrap(), &Column::utf8([Some("7"), Some("x")]));
    }

    #[test]
    fn errors_are_reported_with_context() {
        let t = Table::new(vec![
            ("s", Column::utf8([Some("x")])),
            ("flag", Column::bool([Some(true)])),
        ])
        .unwrap();

        let err = coalesce(&t, "c", &["s", "flag"]).unwrap_err();
        assert!(matches!(err, TransformError::TypeConflict { .. }));
        assert!(err.to_string().starts_with("coalesce:"));

        let err = coalesce(&t, "c", &["s", "missing"]).unwrap_err();
        assert!(err.to_string().contains("column 'missing' not found"));

        let err = coalesce(&t, "c", &[]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidValue { .. }));

        let err = coalesce_or(&t, "c", &["flag"], Value::from("no")).unwrap_err();
        assert!(matches!(err, TransformError::TypeConflict { .. }));
    }

    #[test]
    fn fill_down_carries_last_value() {
        let t = Table::new(vec![
            ("name", Column::utf8([None, Some("ada"), None, Some("bob"), None])),
            ("n", Column::int64([Some(1), None, Some(3), None, None])),
        ])
        .unwrap();
        let out = fill_down(&t, &["name"]).unwrap();
        assert_eq!(
            out.column("name").unwrap(),
            &Column::utf8([None, Some("ada"), Some("ada"), Some("bob"), Some("bob")])
        );
        assert!(out.shares_column(&t, "n"));
        assert!(fill_down(&t, &["nope"]).is_err());
    }
}
