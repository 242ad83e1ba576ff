//! SQL-style `CASE WHEN ... THEN ... ELSE ... END` column construction.

use std::fmt;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::table::{Column, Row, Table};
use crate::types::{unify_types, DataType, Value};

const OP: &str = "case_when";

/// A row predicate. Must depend only on the row it is given.
pub type Predicate = Box<dyn Fn(&Row<'_>) -> bool + Send + Sync>;

/// Ordered list of `(predicate, value)` branches plus a default.
///
/// Branches are tried top to bottom and the first predicate that holds decides the value, so
/// the order of overlapping predicates changes the result.
///
/// ```rust
/// use tabular_transforms::processing::{case_when, CaseWhen};
/// use tabular_transforms::table::{Column, Table};
/// use tabular_transforms::types::Value;
///
/// let scores = Table::new(vec![("score", Column::int64([Some(95), Some(72), None]))]).unwrap();
/// let grades = CaseWhen::new()
///     .when(|row| row.f64("score").is_some_and(|s| s >= 90.0), "A")
///     .when(|row| row.f64("score").is_some_and(|s| s >= 70.0), "C")
///     .otherwise("F");
///
/// let out = case_when(&scores, &grades, "grade").unwrap();
/// assert_eq!(out.column("grade").unwrap().values()[1], Value::from("C"));
/// assert_eq!(out.column("grade").unwrap().values()[2], Value::from("F"));
/// ```
pub struct CaseWhen {
    branches: Vec<(Predicate, Value)>,
    default: Value,
}

impl fmt::Debug for CaseWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseWhen")
            .field(
                "values",
                &self.branches.iter().map(|(_, v)| v).collect::<Vec<_>>(),
            )
            .field("default", &self.default)
            .finish()
    }
}

impl Default for CaseWhen {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseWhen {
    /// An empty list whose default is null.
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            default: Value::Null,
        }
    }

    /// Append a branch; it is tried after every branch added before it.
    pub fn when<F, V>(mut self, predicate: F, value: V) -> Self
    where
        F: Fn(&Row<'_>) -> bool + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.branches.push((Box::new(predicate), value.into()));
        self
    }

    /// Set the value used when no predicate holds.
    pub fn otherwise(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Check the branch list and convert every candidate value to the common output type.
    ///
    /// Fails before any row is looked at, so no partial column is ever produced.
    pub(crate) fn resolve(&self, target: &str) -> TransformResult<ResolvedCases<'_>> {
        if self.branches.is_empty() {
            return Err(TransformError::invalid_value(
                OP,
                format!("'{target}' needs at least one (predicate, value) branch"),
            ));
        }

        let labels: Vec<String> = (0..self.branches.len())
            .map(|i| format!("{target}[{i}]"))
            .chain(std::iter::once(format!("{target}[default]")))
            .collect();
        let candidates = self
            .branches
            .iter()
            .map(|(_, v)| v)
            .chain(std::iter::once(&self.default));
        let output_type = unify_types(
            OP,
            labels
                .iter()
                .zip(candidates.clone())
                .filter_map(|(label, v)| v.data_type().map(|t| (label.as_str(), t))),
        )?;

        let values = candidates
            .map(|v| {
                v.cast(output_type).ok_or_else(|| TransformError::TypeConflict {
                    operator: OP,
                    columns: vec![target.to_string()],
                    message: format!("value {v:?} is not coercible to {output_type}"),
                })
            })
            .collect::<TransformResult<Vec<_>>>()?;

        Ok(ResolvedCases {
            cases: self,
            values,
            output_type,
        })
    }
}

/// A [`CaseWhen`] whose values have been converted to one output type.
pub(crate) struct ResolvedCases<'a> {
    cases: &'a CaseWhen,
    /// Branch values followed by the default.
    values: Vec<Value>,
    output_type: DataType,
}

impl ResolvedCases<'_> {
    pub(crate) fn output_type(&self) -> DataType {
        self.output_type
    }

    /// Value of the first branch whose predicate holds for `row`, else the default.
    pub(crate) fn evaluate(&self, row: &Row<'_>) -> Value {
        let hit = self
            .cases
            .branches
            .iter()
            .position(|(predicate, _)| predicate(row))
            .unwrap_or(self.values.len() - 1);
        self.values[hit].clone()
    }
}

/// Build column `target` by evaluating `cases` against every row.
///
/// `target` is overwritten in place if it exists, otherwise appended.
pub fn case_when(table: &Table, cases: &CaseWhen, target: &str) -> TransformResult<Table> {
    let resolved = cases.resolve(target)?;
    let values = table.rows().map(|row| resolved.evaluate(&row)).collect();
    let out = table.with_column(
        OP,
        target,
        Column::from_parts(resolved.output_type(), values),
    )?;
    debug!(
        column = target,
        branches = cases.len(),
        output_type = %resolved.output_type(),
        "case_when"
    );
    Ok(out)
}
