//! Wide-to-long (`pivot_longer`) and long-to-wide (`pivot_wider`) reshaping.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::processing::dupes::{group_rows, ValueKey};
use crate::table::{fallback_column, Column, Table};
use crate::types::{unify_types, DataType, Value};

/// How a measure column's name splits into `(variable, value kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePattern {
    /// Split at the last occurrence of the separator: `"math_mean"` with `"_"` gives
    /// `("math", "mean")`.
    Separator(String),
    /// A regex matched against the whole name. Uses the named groups `variable` and `value` if
    /// present, otherwise the first two capture groups, in that order.
    Regex(String),
}

enum CompiledPattern<'a> {
    Separator(&'a str),
    Regex(Regex),
}

impl NamePattern {
    fn compile(&self) -> TransformResult<CompiledPattern<'_>> {
        match self {
            Self::Separator(sep) if sep.is_empty() => Err(TransformError::invalid_value(
                "pivot_longer",
                "name separator must not be empty",
            )),
            Self::Separator(sep) => Ok(CompiledPattern::Separator(sep)),
            Self::Regex(src) => {
                let anchored = format!("^(?:{src})$");
                let re = Regex::new(&anchored).map_err(|e| {
                    TransformError::invalid_value("pivot_longer", format!("bad name pattern: {e}"))
                })?;
                let named = re.capture_names().flatten().any(|n| n == "variable")
                    && re.capture_names().flatten().any(|n| n == "value");
                if !named && re.captures_len() < 3 {
                    return Err(TransformError::invalid_value(
                        "pivot_longer",
                        format!("name pattern '{src}' needs two capture groups"),
                    ));
                }
                Ok(CompiledPattern::Regex(re))
            }
        }
    }
}

impl CompiledPattern<'_> {
    fn split(&self, name: &str) -> Option<(String, String)> {
        match self {
            Self::Separator(sep) => {
                let (variable, kind) = name.rsplit_once(sep)?;
                Some((variable.to_string(), kind.to_string()))
            }
            Self::Regex(re) => {
                let caps = re.captures(name)?;
                let (variable, kind) = match (caps.name("variable"), caps.name("value")) {
                    (Some(v), Some(k)) => (v, k),
                    _ => (caps.get(1)?, caps.get(2)?),
                };
                Some((variable.as_str().to_string(), kind.as_str().to_string()))
            }
        }
    }
}

fn default_names_to() -> String {
    "variable".to_string()
}

fn default_values_to() -> String {
    "value".to_string()
}

/// Parameters for [`pivot_longer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotLongerSpec {
    /// Id columns, copied to every output row produced from the same input row.
    #[serde(default)]
    pub index: Vec<String>,
    /// Columns to melt. `None` melts every non-id column, in table order.
    #[serde(default)]
    pub measures: Option<Vec<String>>,
    /// Name of the output column holding each measure's variable name.
    #[serde(default = "default_names_to")]
    pub names_to: String,
    /// Name of the single output value column. Ignored when `names_pattern` is set: value
    /// columns are then named after the parsed value kinds.
    #[serde(default = "default_values_to")]
    pub values_to: String,
    /// Splits measure names into `(variable, value kind)` to emit several value columns at once.
    #[serde(default)]
    pub names_pattern: Option<NamePattern>,
}

impl Default for PivotLongerSpec {
    fn default() -> Self {
        Self {
            index: Vec::new(),
            measures: None,
            names_to: default_names_to(),
            values_to: default_values_to(),
            names_pattern: None,
        }
    }
}

impl PivotLongerSpec {
    /// Spec with the given id columns and every other column melted.
    pub fn new<S: Into<String>>(index: impl IntoIterator<Item = S>) -> Self {
        Self {
            index: index.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn measures<S: Into<String>>(mut self, measures: impl IntoIterator<Item = S>) -> Self {
        self.measures = Some(measures.into_iter().map(Into::into).collect());
        self
    }

    pub fn names_to(mut self, name: impl Into<String>) -> Self {
        self.names_to = name.into();
        self
    }

    pub fn values_to(mut self, name: impl Into<String>) -> Self {
        self.values_to = name.into();
        self
    }

    pub fn names_pattern(mut self, pattern: NamePattern) -> Self {
        self.names_pattern = Some(pattern);
        self
    }
}

/// One output value column: its name and, per variable, the source column feeding it.
struct ValueSlot {
    name: String,
    sources: Vec<Option<usize>>,
}

/// Reshape `table` from wide to long format.
///
/// Every input row yields one output row per melted variable, in input row order, with
/// variables in declaration order. Id columns are repeated on each of those rows, the
/// `names_to` column names the variable, and the value column(s) carry its cell(s). Nulls are
/// carried over, never dropped.
///
/// With a [`NamePattern`], measures sharing a variable collapse into one output row with one
/// value column per value kind; a variable missing some kind gets null there.
///
/// ```rust
/// use tabular_transforms::processing::{pivot_longer, PivotLongerSpec};
/// use tabular_transforms::table::{Column, Table};
///
/// let wide = Table::new(vec![
///     ("student", Column::utf8([Some("A")])),
///     ("midterm", Column::int64([Some(85)])),
///     ("final", Column::int64([Some(92)])),
/// ])
/// .unwrap();
/// let long = pivot_longer(&wide, &PivotLongerSpec::new(["student"])).unwrap();
/// assert_eq!(long.column_names(), vec!["student", "variable", "value"]);
/// assert_eq!(long.row_count(), 2);
/// ```
pub fn pivot_longer(table: &Table, spec: &PivotLongerSpec) -> TransformResult<Table> {
    const OP: &str = "pivot_longer";

    let index = spec
        .index
        .iter()
        .map(|name| table.column_index(OP, name))
        .collect::<TransformResult<Vec<_>>>()?;

    let measures: Vec<usize> = match &spec.measures {
        Some(names) => {
            let mut measures = Vec::with_capacity(names.len());
            for name in names {
                let pos = table.column_index(OP, name)?;
                if index.contains(&pos) {
                    return Err(TransformError::invalid_value(
                        OP,
                        format!("column '{name}' is listed both as id and as measure"),
                    ));
                }
                if measures.contains(&pos) {
                    return Err(TransformError::invalid_value(
                        OP,
                        format!("measure column '{name}' is listed more than once"),
                    ));
                }
                measures.push(pos);
            }
            measures
        }
        None => (0..table.column_count())
            .filter(|p| !index.contains(p))
            .collect(),
    };

    let fields = &table.schema().fields;

    // Group measures into variables and value slots.
    let mut variables: Vec<String> = Vec::new();
    let slots: Vec<ValueSlot> = match &spec.names_pattern {
        None => {
            variables = measures.iter().map(|&m| fields[m].name.clone()).collect();
            vec![ValueSlot {
                name: spec.values_to.clone(),
                sources: measures.iter().map(|&m| Some(m)).collect(),
            }]
        }
        Some(pattern) => {
            if measures.is_empty() {
                return Err(TransformError::invalid_value(
                    OP,
                    "a name pattern was given but there are no measure columns to match",
                ));
            }
            let compiled = pattern.compile()?;
            let mut slots: Vec<ValueSlot> = Vec::new();
            for &m in &measures {
                let name = &fields[m].name;
                let (variable, kind) = compiled.split(name).ok_or_else(|| {
                    TransformError::invalid_value(
                        OP,
                        format!("measure column '{name}' does not match the name pattern"),
                    )
                })?;
                let v = match variables.iter().position(|x| *x == variable) {
                    Some(v) => v,
                    None => {
                        variables.push(variable);
                        slots.iter_mut().for_each(|s| s.sources.push(None));
                        variables.len() - 1
                    }
                };
                let s = match slots.iter().position(|s| s.name == kind) {
                    Some(s) => s,
                    None => {
                        slots.push(ValueSlot {
                            name: kind,
                            sources: vec![None; variables.len()],
                        });
                        slots.len() - 1
                    }
                };
                if slots[s].sources[v].replace(m).is_some() {
                    return Err(TransformError::invalid_value(
                        OP,
                        format!(
                            "measure column '{name}' repeats variable '{}' / value '{}'",
                            variables[v], slots[s].name
                        ),
                    ));
                }
            }
            slots
        }
    };

    let n_rows = table.row_count();
    let n_vars = variables.len();
    let out_rows = n_rows * n_vars;

    // Output row r comes from input row r / n_vars and variable r % n_vars.
    let source_rows: Vec<usize> = (0..n_rows)
        .flat_map(|r| std::iter::repeat_n(r, n_vars))
        .collect();

    let mut columns: Vec<(String, Arc<Column>)> = Vec::with_capacity(index.len() + 1 + slots.len());
    let table_cols: Vec<&Column> = table.columns().map(|(_, c)| c).collect();

    for &i in &index {
        columns.push((
            fields[i].name.clone(),
            Arc::new(table_cols[i].take(&source_rows)),
        ));
    }

    let names: Vec<Value> = (0..out_rows)
        .map(|r| Value::Utf8(variables[r % n_vars].clone()))
        .collect();
    columns.push((
        spec.names_to.clone(),
        Arc::new(Column::from_parts(DataType::Utf8, names)),
    ));

    for slot in &slots {
        let column = if n_vars == 0 {
            fallback_column(0)
        } else {
            let output_type = unify_types(
                OP,
                slot.sources
                    .iter()
                    .flatten()
                    .map(|&m| (fields[m].name.as_str(), fields[m].data_type)),
            )?;
            let values = (0..out_rows)
                .map(|r| match slot.sources[r % n_vars] {
                    Some(m) => table_cols[m].values()[r / n_vars]
                        .cast(output_type)
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                })
                .collect();
            Column::from_parts(output_type, values)
        };
        columns.push((slot.name.clone(), Arc::new(column)));
    }

    let out = Table::from_shared(OP, columns)?;
    debug!(
        rows_in = n_rows,
        rows_out = out.row_count(),
        variables = n_vars,
        value_columns = slots.len(),
        "pivot_longer"
    );
    Ok(out)
}

/// Parameters for [`pivot_wider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotWiderSpec {
    /// Columns identifying an output row.
    pub index: Vec<String>,
    /// Column whose values become new column names.
    pub names_from: String,
    /// Columns whose values fill the new columns.
    pub values_from: Vec<String>,
}

impl PivotWiderSpec {
    pub fn new<S: Into<String>>(
        index: impl IntoIterator<Item = S>,
        names_from: impl Into<String>,
        values_from: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            index: index.into_iter().map(Into::into).collect(),
            names_from: names_from.into(),
            values_from: values_from.into_iter().map(Into::into).collect(),
        }
    }
}

/// Reshape `table` from long to wide format, the inverse of [`pivot_longer`].
///
/// One output row per distinct index tuple (first-appearance order). Each distinct non-null
/// `names_from` value becomes one column per `values_from` column: named after the value itself
/// when there is a single value column, `{values_from}_{value}` otherwise. When several rows
/// land in the same cell, the first non-null value wins; cells nothing lands in are null.
pub fn pivot_wider(table: &Table, spec: &PivotWiderSpec) -> TransformResult<Table> {
    const OP: &str = "pivot_wider";

    if spec.values_from.is_empty() {
        return Err(TransformError::invalid_value(OP, "values_from must name at least one column"));
    }
    let index = spec
        .index
        .iter()
        .map(|name| table.column_index(OP, name))
        .collect::<TransformResult<Vec<_>>>()?;
    let names_pos = table.column_index(OP, &spec.names_from)?;
    let value_pos = spec
        .values_from
        .iter()
        .map(|name| table.column_index(OP, name))
        .collect::<TransformResult<Vec<_>>>()?;

    let mut new_names: Vec<String> = Vec::new();
    let mut name_lookup: HashMap<ValueKey<'_>, usize> = HashMap::new();
    let mut cell_of_row: Vec<Option<usize>> = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let key = row.at(names_pos).filter(|v| !v.is_null());
        cell_of_row.push(key.map(|v| {
            *name_lookup.entry(ValueKey::from(v)).or_insert_with(|| {
                new_names.push(v.to_string());
                new_names.len() - 1
            })
        }));
    }

    // Rows with a null `names_from` take no part, not even in the index.
    let groups: Vec<Vec<usize>> = group_rows(table, &index)
        .into_iter()
        .map(|g| g.into_iter().filter(|&r| cell_of_row[r].is_some()).collect::<Vec<_>>())
        .filter(|g| !g.is_empty())
        .collect();
    let mut group_of = vec![0usize; table.row_count()];
    for (g, rows) in groups.iter().enumerate() {
        for &r in rows {
            group_of[r] = g;
        }
    }

    let fields = &table.schema().fields;
    let table_cols: Vec<&Column> = table.columns().map(|(_, c)| c).collect();
    let first_rows: Vec<usize> = groups.iter().map(|g| g[0]).collect();

    let mut columns: Vec<(String, Arc<Column>)> = index
        .iter()
        .map(|&i| (fields[i].name.clone(), Arc::new(table_cols[i].take(&first_rows))))
        .collect();

    for &vp in &value_pos {
        let source = table_cols[vp];
        let mut cells: Vec<Vec<Value>> = vec![vec![Value::Null; groups.len()]; new_names.len()];
        for (r, cell) in cell_of_row.iter().enumerate() {
            let Some(n) = *cell else { continue };
            let slot = &mut cells[n][group_of[r]];
            if slot.is_null() {
                *slot = source.values()[r].clone();
            }
        }
        for (n, values) in cells.into_iter().enumerate() {
            let name = if value_pos.len() == 1 {
                new_names[n].clone()
            } else {
                format!("{}_{}", fields[vp].name, new_names[n])
            };
            columns.push((name, Arc::new(Column::from_parts(source.data_type(), values))));
        }
    }

    let out = Table::from_shared(OP, columns)?;
    debug!(
        rows_in = table.row_count(),
        rows_out = out.row_count(),
        new_columns = new_names.len() * value_pos.len(),
        "pivot_wider"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{pivot_longer, pivot_wider, NamePattern, PivotLongerSpec, PivotWiderSpec};
    use crate::error::TransformError;
    use crate::table::{Column, Table};
    use crate::types::{DataType, Value};

    fn grades() -> Table {
        Table::new(vec![
            ("student", Column::utf8([Some("A"), Some("B")])),
            ("midterm", Column::int64([Some(85), Some(70)])),
            ("final", Column::int64([Some(92), None])),
        ])
        .unwrap()
    }

    #[test]
    fn melts_measures_in_row_major_order() {
        let out = pivot_longer(&grades(), &PivotLongerSpec::new(["student"])).unwrap();
        let expected = Table::new(vec![
            ("student", Column::utf8([Some("A"), Some("A"), Some("B"), Some("B")])),
            (
                "variable",
                Column::utf8([Some("midterm"), Some("final"), Some("midterm"), Some("final")]),
            ),
            ("value", Column::int64([Some(85), Some(92), Some(70), None])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn explicit_measures_and_names() {
        let spec = PivotLongerSpec::new(["student"])
            .measures(["final"])
            .names_to("exam")
            .values_to("points");
        let out = pivot_longer(&grades(), &spec).unwrap();
        assert_eq!(out.column_names(), vec!["student", "exam", "points"]);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.column("points").unwrap(), &Column::int64([Some(92), None]));
    }

    #[test]
    fn measure_types_are_unified() {
        let t = Table::new(vec![
            ("id", Column::int64([Some(1)])),
            ("x", Column::int64([Some(2)])),
            ("y", Column::float64([Some(2.5)])),
        ])
        .unwrap();
        let out = pivot_longer(&t, &PivotLongerSpec::new(["id"])).unwrap();
        assert_eq!(out.column("value").unwrap().data_type(), DataType::Float64);
        assert_eq!(out.column("value").unwrap().values()[0], Value::Float64(2.0));
    }

    #[test]
    fn separator_pattern_yields_sibling_value_columns() {
        let t = Table::new(vec![
            ("id", Column::int64([Some(1), Some(2)])),
            ("math_mean", Column::float64([Some(3.5), Some(4.0)])),
            ("math_std", Column::float64([Some(0.5), Some(0.1)])),
            ("art_mean", Column::float64([Some(2.0), None])),
            ("art_std", Column::float64([Some(0.2), Some(0.3)])),
        ])
        .unwrap();
        let spec = PivotLongerSpec::new(["id"])
            .names_to("subject")
            .names_pattern(NamePattern::Separator("_".into()));
        let out = pivot_longer(&t, &spec).unwrap();
        let expected = Table::new(vec![
            ("id", Column::int64([Some(1), Some(1), Some(2), Some(2)])),
            (
                "subject",
                Column::utf8([Some("math"), Some("art"), Some("math"), Some("art")]),
            ),
            ("mean", Column::float64([Some(3.5), Some(2.0), Some(4.0), None])),
            ("std", Column::float64([Some(0.5), Some(0.2), Some(0.1), Some(0.3)])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn regex_pattern_with_named_groups_and_ragged_kinds() {
        let t = Table::new(vec![
            ("site", Column::utf8([Some("n")])),
            ("min.2020", Column::int64([Some(1)])),
            ("max.2020", Column::int64([Some(9)])),
            ("max.2021", Column::int64([Some(8)])),
        ])
        .unwrap();
        let spec = PivotLongerSpec::new(["site"])
            .names_to("year")
            .names_pattern(NamePattern::Regex(r"(?P<value>\w+)\.(?P<variable>\d+)".into()));
        let out = pivot_longer(&t, &spec).unwrap();
        assert_eq!(out.column_names(), vec!["site", "year", "min", "max"]);
        assert_eq!(out.column("year").unwrap(), &Column::utf8([Some("2020"), Some("2021")]));
        assert_eq!(out.column("min").unwrap(), &Column::int64([Some(1), None]));
        assert_eq!(out.column("max").unwrap(), &Column::int64([Some(9), Some(8)]));
    }

    #[test]
    fn zero_measures_give_an_empty_table() {
        let t = Table::new(vec![("id", Column::int64([Some(1), Some(2)]))]).unwrap();
        let out = pivot_longer(&t, &PivotLongerSpec::new(["id"])).unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.column_names(), vec!["id", "variable", "value"]);
    }

    #[test]
    fn all_null_measure_still_produces_rows() {
        let t = Table::new(vec![
            ("id", Column::int64([Some(1), Some(2)])),
            ("gone", Column::float64([None, None])),
        ])
        .unwrap();
        let out = pivot_longer(&t, &PivotLongerSpec::new(["id"])).unwrap();
        assert_eq!(out.row_count(), 2);
        assert!(out.column("value").unwrap().is_all_null());
    }

    #[test]
    fn malformed_specs_are_rejected() {
        let t = grades();

        let err = pivot_longer(&t, &PivotLongerSpec::new(["nope"])).unwrap_err();
        assert!(matches!(err, TransformError::ColumnNotFound { .. }));

        let err = pivot_longer(&t, &PivotLongerSpec::new(["student"]).measures(["student"]))
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidValue { .. }));

        let err = pivot_longer(
            &t,
            &PivotLongerSpec::new(["student"]).measures(["midterm", "final", "midterm"]),
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::InvalidValue { .. }));
        assert!(err.to_string().contains("'midterm' is listed more than once"));

        let spec = PivotLongerSpec::new(["student"])
            .names_pattern(NamePattern::Separator("_".into()));
        let err = pivot_longer(&t, &spec).unwrap_err();
        assert!(err.to_string().contains("'midterm' does not match"));

        let spec = PivotLongerSpec::new(["student", "midterm", "final"])
            .names_pattern(NamePattern::Separator("_".into()));
        let err = pivot_longer(&t, &spec).unwrap_err();
        assert!(matches!(err, TransformError::InvalidValue { .. }));

        let spec = PivotLongerSpec::new(["student"])
            .names_pattern(NamePattern::Regex("(unclosed".into()));
        assert!(pivot_longer(&t, &spec).is_err());

        let spec = PivotLongerSpec::new(["student"]).names_to("student");
        let err = pivot_longer(&t, &spec).unwrap_err();
        assert!(matches!(err, TransformError::Schema { .. }));
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: PivotLongerSpec = serde_json::from_str(
            r#"{"index": ["id"], "names_pattern": {"separator": "_"}}"#,
        )
        .unwrap();
        assert_eq!(spec.names_to, "variable");
        assert_eq!(spec.values_to, "value");
        assert_eq!(spec.names_pattern, Some(NamePattern::Separator("_".into())));
    }

    #[test]
    fn wider_spreads_first_value_per_cell() {
        let long = Table::new(vec![
            ("who", Column::utf8([Some("ada"), Some("ada"), Some("bob"), Some("ada")])),
            ("n", Column::int64([Some(1), Some(2), Some(1), Some(1)])),
            ("answer", Column::utf8([Some("yes"), Some("no"), Some("maybe"), Some("late")])),
        ])
        .unwrap();
        let out = pivot_wider(&long, &PivotWiderSpec::new(["who"], "n", ["answer"])).unwrap();
        let expected = Table::new(vec![
            ("who", Column::utf8([Some("ada"), Some("bob")])),
            ("1", Column::utf8([Some("yes"), Some("maybe")])),
            ("2", Column::utf8([Some("no"), None])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn wider_skips_rows_without_a_name() {
        let long = Table::new(vec![
            ("who", Column::utf8([Some("ada"), Some("bob"), Some("cy"), Some("cy")])),
            ("k", Column::utf8([Some("x"), None, None, Some("x")])),
            ("v", Column::int64([Some(1), Some(2), Some(3), Some(4)])),
        ])
        .unwrap();
        let out = pivot_wider(&long, &PivotWiderSpec::new(["who"], "k", ["v"])).unwrap();
        let expected = Table::new(vec![
            ("who", Column::utf8([Some("ada"), Some("cy")])),
            ("x", Column::int64([Some(1), Some(4)])),
        ])
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn wider_prefixes_names_for_several_value_columns() {
        let long = Table::new(vec![
            ("id", Column::int64([Some(1), Some(1)])),
            ("k", Column::utf8([Some("x"), Some("y")])),
            ("a", Column::int64([Some(10), Some(20)])),
            ("b", Column::bool([Some(true), Some(false)])),
        ])
        .unwrap();
        let out = pivot_wider(&long, &PivotWiderSpec::new(["id"], "k", ["a", "b"])).unwrap();
        assert_eq!(out.column_names(), vec!["id", "a_x", "a_y", "b_x", "b_y"]);
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn longer_then_wider_round_trips() {
        let wide = grades();
        let long = pivot_longer(&wide, &PivotLongerSpec::new(["student"])).unwrap();
        let back = pivot_wider(
            &long,
            &PivotWiderSpec::new(["student"], "variable", ["value"]),
        )
        .unwrap();
        assert_eq!(back, wide);
    }
}
