//! Row-wise concatenation of tables.

use std::sync::Arc;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::table::{Column, Table};
use crate::types::{unify_types, Value};

/// Stack `tables` on top of each other, in order.
///
/// Columns are matched by name. The output has every column that appears in any input, in
/// first-appearance order. A column's type is the unification of its types across the inputs
/// that have it; rows from an input lacking the column are null there. Tables without columns
/// contribute no rows, and an empty slice gives [`Table::empty`].
///
/// ```rust
/// use tabular_transforms::processing::concat_rows;
/// use tabular_transforms::table::{Column, Table};
///
/// let a = Table::new(vec![("id", Column::int64([Some(1)]))]).unwrap();
/// let b = Table::new(vec![
///     ("id", Column::float64([Some(2.5)])),
///     ("note", Column::utf8([Some("late")])),
/// ])
/// .unwrap();
/// let both = concat_rows(&[&a, &b]).unwrap();
/// assert_eq!(both.column_names(), vec!["id", "note"]);
/// assert_eq!(both.column("id").unwrap(), &Column::float64([Some(1.0), Some(2.5)]));
/// ```
pub fn concat_rows(tables: &[&Table]) -> TransformResult<Table> {
    const OP: &str = "concat_rows";

    let mut names: Vec<&str> = Vec::new();
    for table in tables {
        for name in table.column_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut columns: Vec<(String, Arc<Column>)> = Vec::with_capacity(names.len());
    for name in names {
        let parts: Vec<Option<&Column>> = tables.iter().map(|t| t.column(name).ok()).collect();
        let data_type = unify_types(
            OP,
            parts.iter().flatten().map(|c| (name, c.data_type())),
        )
        .map_err(|err| match err {
            TransformError::TypeConflict {
                operator, message, ..
            } => TransformError::TypeConflict {
                operator,
                columns: vec![name.to_string()],
                message,
            },
            other => other,
        })?;

        let mut values: Vec<Value> = Vec::new();
        for (table, part) in tables.iter().zip(&parts) {
            match part {
                Some(col) => {
                    let col = col.cast(data_type).ok_or_else(|| TransformError::TypeConflict {
                        operator: OP,
                        columns: vec![name.to_string()],
                        message: format!("cannot convert {} values to {data_type}", col.data_type()),
                    })?;
                    values.extend_from_slice(col.values());
                }
                None => values.extend(std::iter::repeat_n(Value::Null, table.row_count())),
            }
        }
        columns.push((name.to_string(), Arc::new(Column::from_parts(data_type, values))));
    }

    let out = Table::from_shared(OP, columns)?;
    debug!(
        tables = tables.len(),
        rows_out = out.row_count(),
        columns = out.column_count(),
        "concat_rows"
    );
    Ok(out)
}
