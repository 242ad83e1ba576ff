//! Core value and schema types.
//!
//! Every cell of a [`crate::table::Table`] is a [`Value`]. Missing data is the explicit
//! [`Value::Null`] variant: a float `NaN` or an empty string is an ordinary value, never "missing".

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};

/// Logical data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Naive (zone-less) timestamp.
    Datetime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "utf8",
            Self::Datetime => "datetime",
        };
        f.write_str(name)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing a table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Naive timestamp.
    Datetime(NaiveDateTime),
}

impl Value {
    /// Returns `true` for the missing tag.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Data type of this value, or `None` for [`Value::Null`].
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DataType::Int64),
            Self::Float64(_) => Some(DataType::Float64),
            Self::Bool(_) => Some(DataType::Bool),
            Self::Utf8(_) => Some(DataType::Utf8),
            Self::Datetime(_) => Some(DataType::Datetime),
        }
    }

    /// The integer, if this is an `Int64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// The flag, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is a `Utf8`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// The timestamp, if this is a `Datetime`.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Datetime(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert this value to `target`, following the unification rules of [`unify_types`].
    ///
    /// Returns `None` when the conversion is not allowed. `Null` converts to every type.
    pub fn cast(&self, target: DataType) -> Option<Value> {
        match (self, target) {
            (Self::Null, _) => Some(Self::Null),
            (v, t) if v.data_type() == Some(t) => Some(v.clone()),
            (Self::Int64(v), DataType::Float64) => Some(Self::Float64(*v as f64)),
            (Self::Int64(_) | Self::Float64(_) | Self::Datetime(_), DataType::Utf8) => {
                Some(Self::Utf8(self.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
            Self::Datetime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Datetime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Type given to an output column that receives no typed input at all (only `Null`s).
pub const FALLBACK_TYPE: DataType = DataType::Float64;

/// Least common supertype of a set of column types.
///
/// - a single distinct type is kept as-is;
/// - `Int64` mixed with `Float64` widens to `Float64`;
/// - `Utf8` mixed with numbers or datetimes becomes `Utf8` (values are rendered as text);
/// - any other mix (e.g. `Bool` with `Utf8`) is a [`TransformError::TypeConflict`].
///
/// An empty input resolves to [`FALLBACK_TYPE`].
pub fn unify_types<'a, I>(operator: &'static str, inputs: I) -> TransformResult<DataType>
where
    I: IntoIterator<Item = (&'a str, DataType)>,
{
    let inputs: Vec<(&str, DataType)> = inputs.into_iter().collect();
    let mut distinct: Vec<DataType> = Vec::new();
    for (_, t) in &inputs {
        if !distinct.contains(t) {
            distinct.push(*t);
        }
    }

    match distinct.as_slice() {
        [] => Ok(FALLBACK_TYPE),
        [single] => Ok(*single),
        many if many
            .iter()
            .all(|t| matches!(t, DataType::Int64 | DataType::Float64)) =>
        {
            Ok(DataType::Float64)
        }
        many if many.contains(&DataType::Utf8)
            && many.iter().all(|t| {
                matches!(
                    t,
                    DataType::Utf8 | DataType::Int64 | DataType::Float64 | DataType::Datetime
                )
            }) =>
        {
            Ok(DataType::Utf8)
        }
        many => Err(TransformError::TypeConflict {
            operator,
            columns: inputs.iter().map(|(name, _)| (*name).to_string()).collect(),
            message: format!(
                "cannot combine types [{}]",
                many.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}
