//! Duplicate-row detection.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::TransformResult;
use crate::table::Table;
use crate::types::Value;

/// Hashable stand-in for a [`Value`] used when grouping rows.
///
/// Floats compare by bit pattern, with `-0.0` folded into `0.0` and every `NaN` folded into one
/// canonical `NaN`, so equal-looking floats group together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Null,
    Int64(i64),
    Float64(u64),
    Bool(bool),
    Utf8(&'a str),
    Datetime(NaiveDateTime),
}

impl<'a> From<&'a Value> for ValueKey<'a> {
    fn from(v: &'a Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Int64(i) => Self::Int64(*i),
            Value::Float64(f) if f.is_nan() => Self::Float64(f64::NAN.to_bits()),
            Value::Float64(f) if *f == 0.0 => Self::Float64(0f64.to_bits()),
            Value::Float64(f) => Self::Float64(f.to_bits()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Utf8(s) => Self::Utf8(s.as_str()),
            Value::Datetime(d) => Self::Datetime(*d),
        }
    }
}

/// Row indices grouped by their key over `positions`, groups in first-appearance order.
pub(crate) fn group_rows<'a>(table: &'a Table, positions: &[usize]) -> Vec<Vec<usize>> {
    let mut lookup: HashMap<Vec<ValueKey<'a>>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in table.rows() {
        let key: Vec<ValueKey<'a>> = positions
            .iter()
            .filter_map(|&p| row.at(p))
            .map(ValueKey::from)
            .collect();
        match lookup.get(&key) {
            Some(&g) => groups[g].push(row.index()),
            None => {
                lookup.insert(key, groups.len());
                groups.push(vec![row.index()]);
            }
        }
    }
    groups
}

/// Return every row whose values (over `subset`, or all columns when `None`) occur more than
/// once, in original order.
///
/// All members of a duplicated group are returned, not only the repeats. Null equals null for
/// this comparison.
pub fn get_dupes(table: &Table, subset: Option<&[&str]>) -> TransformResult<Table> {
    let positions: Vec<usize> = match subset {
        Some(names) => names
            .iter()
            .map(|n| table.column_index("get_dupes", n))
            .collect::<TransformResult<_>>()?,
        None => (0..table.column_count()).collect(),
    };

    let mut keep: Vec<usize> = group_rows(table, &positions)
        .into_iter()
        .filter(|g| g.len() > 1)
        .flatten()
        .collect();
    keep.sort_unstable();

    let out = table.take_rows(&keep);
    debug!(
        rows_in = table.row_count(),
        duplicated_rows = out.row_count(),
        "get_dupes"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::get_dupes;
    use crate::error::TransformError;
    use crate::table::{Column, Table};

    #[test]
    fn returns_every_member_of_duplicated_groups() {
        let t = Table::new(vec![
            ("a", Column::int64([Some(1), Some(2), Some(1)])),
            ("b", Column::utf8([Some("x"), Some("y"), Some("x")])),
        ])
        .unwrap();
        let out = get_dupes(&t, None).unwrap();
        let expected = Table::new(vec![
            ("a", Column::int64([Some(1), Some(1)])),
            ("b", Column::utf8([Some("x"), Some("x")])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn preserves_original_order_across_groups() {
        let t = Table::new(vec![(
            "k",
            Column::utf8([Some("b"), Some("a"), Some("b"), Some("c"), Some("a")]),
        )])
        .unwrap();
        let out = get_dupes(&t, None).unwrap();
        assert_eq!(
            out.column("k").unwrap(),
            &Column::utf8([Some("b"), Some("a"), Some("b"), Some("a")])
        );
    }

    #[test]
    fn null_rows_match_each_other() {
        let t = Table::new(vec![
            ("a", Column::int64([None, Some(1), None])),
            ("b", Column::utf8([None::<&str>, Some("x"), None])),
        ])
        .unwrap();
        assert_eq!(get_dupes(&t, None).unwrap().row_count(), 2);
    }

    #[test]
    fn subset_restricts_comparison() {
        let t = Table::new(vec![
            ("name", Column::utf8([Some("ada"), Some("bob"), Some("ada")])),
            ("score", Column::float64([Some(1.0), Some(2.0), Some(3.0)])),
        ])
        .unwrap();
        assert_eq!(get_dupes(&t, None).unwrap().row_count(), 0);
        assert_eq!(get_dupes(&t, Some(&["name"][..])).unwrap().row_count(), 2);

        let err = get_dupes(&t, Some(&["nope"][..])).unwrap_err();
        assert!(matches!(err, TransformError::ColumnNotFound { .. }));
    }

    #[test]
    fn negative_zero_and_nan_group_together() {
        let t = Table::new(vec![(
            "f",
            Column::float64([Some(0.0), Some(-0.0), Some(f64::NAN), Some(f64::NAN)]),
        )])
        .unwrap();
        assert_eq!(get_dupes(&t, None).unwrap().row_count(), 4);
    }
}
