use thiserror::Error;

/// Convenience result type for table construction and transformations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Error type returned by table construction and every transformation.
///
/// Each variant carries the name of the operator that detected the problem (e.g. `"coalesce"`)
/// and, where it applies, the offending column name(s).
#[derive(Debug, Error)]
pub enum TransformError {
    /// Duplicate/invalid column names, row-count mismatches, or values that do not match a
    /// column's declared type.
    #[error("{operator}: schema error: {message}")]
    Schema {
        operator: &'static str,
        message: String,
    },

    /// A referenced column does not exist in the input table.
    #[error("{operator}: column '{column}' not found")]
    ColumnNotFound {
        operator: &'static str,
        column: String,
    },

    /// Values of incompatible types were combined into one column.
    #[error("{operator}: type conflict in {columns:?}: {message}")]
    TypeConflict {
        operator: &'static str,
        columns: Vec<String>,
        message: String,
    },

    /// An operator parameter is malformed (e.g. an empty source list or a bad name pattern).
    #[error("{operator}: invalid value: {message}")]
    InvalidValue {
        operator: &'static str,
        message: String,
    },

    /// The execution engine could not build its worker pool.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl TransformError {
    pub(crate) fn schema(operator: &'static str, message: impl Into<String>) -> Self {
        Self::Schema {
            operator,
            message: message.into(),
        }
    }

    pub(crate) fn column_not_found(operator: &'static str, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            operator,
            column: column.into(),
        }
    }

    pub(crate) fn invalid_value(operator: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            operator,
            message: message.into(),
        }
    }

    /// Name of the operator that raised this error, if any.
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Self::Schema { operator, .. }
            | Self::ColumnNotFound { operator, .. }
            | Self::TypeConflict { operator, .. }
            | Self::InvalidValue { operator, .. } => Some(*operator),
            Self::ThreadPool(_) => None,
        }
    }
}
