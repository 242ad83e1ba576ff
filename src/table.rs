//! Columnar, immutable table snapshots.
//!
//! A [`Table`] is an ordered list of named [`Column`]s that all share one row count. Columns are
//! held behind [`Arc`], so a transformation that leaves a column untouched hands the same storage
//! to the table it produces instead of copying it. Nothing mutates a column once it has been
//! placed in a table.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::types::{unify_types, DataType, Field, Schema, Value, FALLBACK_TYPE};

/// A homogeneous, ordered sequence of values of one [`DataType`], with [`Value::Null`] marking
/// missing slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Create a column, checking that every non-null value matches `data_type`.
    pub fn new(data_type: DataType, values: Vec<Value>) -> TransformResult<Self> {
        if let Some((idx, bad)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| v.data_type().is_some_and(|t| t != data_type))
        {
            return Err(TransformError::schema(
                "column",
                format!("value {bad:?} at row {idx} does not match column type {data_type}"),
            ));
        }
        Ok(Self { data_type, values })
    }

    /// Create a column by inferring its type from `values`.
    ///
    /// Mixed `Int64`/`Float64` values are widened to `Float64`; a column of only nulls gets the
    /// float type. Any other mix is rejected with a schema error.
    pub fn from_values(values: Vec<Value>) -> TransformResult<Self> {
        let types = values.iter().filter_map(Value::data_type).map(|t| ("", t));
        let data_type = match unify_types("column", types) {
            Ok(DataType::Utf8) if values.iter().any(|v| !matches!(v, Value::Utf8(_) | Value::Null)) => {
                return Err(TransformError::schema(
                    "column",
                    "cannot infer a column type from strings mixed with other values",
                ));
            }
            Ok(t) => t,
            Err(e) => return Err(TransformError::schema("column", e.to_string())),
        };
        let values = values
            .into_iter()
            .map(|v| v.cast(data_type).unwrap_or(Value::Null))
            .collect();
        Ok(Self { data_type, values })
    }

    /// Build a column of all-null values.
    pub fn nulls(data_type: DataType, len: usize) -> Self {
        Self {
            data_type,
            values: vec![Value::Null; len],
        }
    }

    /// Build an `Int64` column; `None` becomes null.
    pub fn int64<I: IntoIterator<Item = Option<i64>>>(values: I) -> Self {
        Self::typed(DataType::Int64, values)
    }

    /// Build a `Float64` column; `None` becomes null.
    pub fn float64<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        Self::typed(DataType::Float64, values)
    }

    /// Build a `Bool` column; `None` becomes null.
    pub fn bool<I: IntoIterator<Item = Option<bool>>>(values: I) -> Self {
        Self::typed(DataType::Bool, values)
    }

    /// Build a `Utf8` column from anything convertible to `String`; `None` becomes null.
    pub fn utf8<S, I>(values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Option<S>>,
    {
        Self {
            data_type: DataType::Utf8,
            values: values
                .into_iter()
                .map(|v| v.map_or(Value::Null, |s| Value::Utf8(s.into())))
                .collect(),
        }
    }

    /// Build a `Datetime` column; `None` becomes null.
    pub fn datetime<I: IntoIterator<Item = Option<NaiveDateTime>>>(values: I) -> Self {
        Self::typed(DataType::Datetime, values)
    }

    fn typed<T, I>(data_type: DataType, values: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = Option<T>>,
    {
        Self {
            data_type,
            values: values.into_iter().map(Value::from).collect(),
        }
    }

    /// Builds a column without re-checking values; callers guarantee they match `data_type`.
    pub(crate) fn from_parts(data_type: DataType, values: Vec<Value>) -> Self {
        debug_assert!(
            values
                .iter()
                .all(|v| v.data_type().is_none_or(|t| t == data_type)),
            "column values do not match declared type {data_type}"
        );
        Self { data_type, values }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// `true` when every slot is missing (vacuously true for an empty column).
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    /// Gather the values at `indices` (in that order) into a new column.
    pub(crate) fn take(&self, indices: &[usize]) -> Self {
        Self {
            data_type: self.data_type,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    /// Convert every value to `target`, or `None` if some value cannot be converted.
    pub(crate) fn cast(&self, target: DataType) -> Option<Self> {
        if target == self.data_type {
            return Some(self.clone());
        }
        let values = self
            .values
            .iter()
            .map(|v| v.cast(target))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            data_type: target,
            values,
        })
    }
}

/// An immutable table snapshot: ordered, uniquely named columns of equal length.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Schema,
    columns: Vec<Arc<Column>>,
    row_count: usize,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.row_count == other.row_count
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl Table {
    /// Build a table from `(name, column)` pairs.
    ///
    /// Fails with a schema error if names repeat or column lengths differ.
    pub fn new<S: Into<String>>(columns: Vec<(S, Column)>) -> TransformResult<Self> {
        let columns = columns
            .into_iter()
            .map(|(name, col)| (name.into(), Arc::new(col)))
            .collect();
        Self::from_shared("table", columns)
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            schema: Schema::default(),
            columns: Vec::new(),
            row_count: 0,
        }
    }

    /// Validating constructor shared by every operator.
    pub(crate) fn from_shared(
        operator: &'static str,
        columns: Vec<(String, Arc<Column>)>,
    ) -> TransformResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TransformError::schema(
                    operator,
                    format!("duplicate column name '{name}'"),
                ));
            }
        }

        let row_count = columns.first().map_or(0, |(_, c)| c.len());
        if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != row_count) {
            return Err(TransformError::schema(
                operator,
                format!(
                    "column '{name}' has {} rows, expected {row_count}",
                    col.len()
                ),
            ));
        }

        let (fields, columns): (Vec<Field>, Vec<Arc<Column>>) = columns
            .into_iter()
            .map(|(name, col)| (Field::new(name, col.data_type()), col))
            .unzip();

        Ok(Self {
            schema: Schema::new(fields),
            columns,
            row_count,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.field_names().collect()
    }

    /// Position of a column, or a `ColumnNotFound` error naming `operator`.
    pub fn column_index(&self, operator: &'static str, name: &str) -> TransformResult<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| TransformError::column_not_found(operator, name))
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> TransformResult<&Column> {
        let idx = self.column_index("column", name)?;
        Ok(&self.columns[idx])
    }

    /// Iterate `(name, column)` pairs in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.schema
            .field_names()
            .zip(self.columns.iter().map(Arc::as_ref))
    }

    /// Row view at `index`, if in range.
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.row_count).then_some(Row { table: self, index })
    }

    /// Iterate all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.row_count).map(move |index| Row { table: self, index })
    }

    /// `true` if both tables hold the very same storage for column `name`.
    pub fn shares_column(&self, other: &Table, name: &str) -> bool {
        match (self.schema.index_of(name), other.schema.index_of(name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&self.columns[a], &other.columns[b]),
            _ => false,
        }
    }

    pub(crate) fn shared_columns(&self) -> impl Iterator<Item = (&str, &Arc<Column>)> {
        self.schema.field_names().zip(self.columns.iter())
    }

    /// Keep the given rows, in the given order. Columns are shared when every row is kept.
    pub(crate) fn take_rows(&self, indices: &[usize]) -> Table {
        if indices.len() == self.row_count && indices.iter().enumerate().all(|(i, &r)| i == r) {
            return self.clone();
        }
        Table {
            schema: self.schema.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| Arc::new(c.take(indices)))
                .collect(),
            row_count: if self.columns.is_empty() { 0 } else { indices.len() },
        }
    }

    /// Keep the columns at `positions`, sharing their storage.
    pub(crate) fn select_positions(&self, positions: &[usize]) -> Table {
        let row_count = if positions.is_empty() { 0 } else { self.row_count };
        Table {
            schema: Schema::new(positions.iter().map(|&p| self.schema.fields[p].clone()).collect()),
            columns: positions.iter().map(|&p| Arc::clone(&self.columns[p])).collect(),
            row_count,
        }
    }

    /// Overwrite column `name` in place, or append it if absent. Other columns are shared.
    pub(crate) fn with_column(
        &self,
        operator: &'static str,
        name: &str,
        column: Column,
    ) -> TransformResult<Table> {
        if !self.columns.is_empty() && column.len() != self.row_count {
            return Err(TransformError::schema(
                operator,
                format!(
                    "column '{name}' has {} rows, expected {}",
                    column.len(),
                    self.row_count
                ),
            ));
        }
        let new_col = Arc::new(column);
        let mut columns: Vec<(String, Arc<Column>)> = self
            .shared_columns()
            .map(|(n, c)| (n.to_string(), Arc::clone(c)))
            .collect();
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = new_col,
            None => columns.push((name.to_string(), new_col)),
        }
        Table::from_shared(operator, columns)
    }

    /// Export names, types and values for a presentation or persistence layer.
    pub fn export(&self) -> TableExport {
        TableExport {
            columns: self
                .columns()
                .map(|(name, col)| ExportedColumn {
                    name: name.to_string(),
                    data_type: col.data_type(),
                    values: col.values().to_vec(),
                })
                .collect(),
        }
    }

    /// Rebuild a table from an export, validating it like [`Table::new`].
    pub fn from_export(export: TableExport) -> TransformResult<Self> {
        let columns = export
            .columns
            .into_iter()
            .map(|c| Ok((c.name, Column::new(c.data_type, c.values)?)))
            .collect::<TransformResult<Vec<_>>>()?;
        Table::new(columns)
    }
}

/// Column-wise snapshot of a table, suitable for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExport {
    pub columns: Vec<ExportedColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedColumn {
    pub name: String,
    pub data_type: DataType,
    pub values: Vec<Value>,
}

/// Borrowed view of one table row, handed to row predicates.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    /// Position of this row in its table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of column `name` in this row, or `None` if there is no such column.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let idx = self.table.schema.index_of(name)?;
        self.at(idx)
    }

    /// Value of the column at position `column` in this row.
    pub fn at(&self, column: usize) -> Option<&'a Value> {
        self.table.columns.get(column)?.get(self.index)
    }

    /// Numeric view of column `name` (integers widened); `None` for nulls and non-numbers.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    /// `true` if column `name` is missing in this row (or does not exist).
    pub fn is_null(&self, name: &str) -> bool {
        self.get(name).is_none_or(Value::is_null)
    }

    /// All values of this row, in column order.
    pub fn values(&self) -> Vec<&'a Value> {
        (0..self.table.column_count())
            .filter_map(|c| self.at(c))
            .collect()
    }
}

/// Column type used when an operator emits a column it has no typed input for.
pub(crate) fn fallback_column(len: usize) -> Column {
    Column::nulls(FALLBACK_TYPE, len)
}
