//! `tabular-transforms` is a small library of cleaning and reshaping transforms over typed,
//! in-memory [`table::Table`]s.
//!
//! A table is an ordered list of named, typed [`table::Column`]s of equal length. Every cell is a
//! [`types::Value`]; [`types::Value::Null`] is the single "missing" tag. Operators never mutate
//! their input: each returns a new table and shares untouched column storage with it.
//!
//! ## Operators
//!
//! - [`processing::clean_names`], [`processing::rename_column`]
//! - [`processing::remove_empty`]
//! - [`processing::get_dupes`]
//! - [`processing::coalesce`], [`processing::coalesce_or`], [`processing::fill_down`]
//! - [`processing::convert_excel_date`]
//! - [`processing::case_when`]
//! - [`processing::pivot_longer`], [`processing::pivot_wider`]
//! - [`processing::filter`], [`processing::concat_rows`], [`processing::profile`]
//!
//! Row-wise operators also have chunked, parallel versions on [`execution::ExecutionEngine`].
//!
//! ## Modules
//!
//! - [`types`]: data types, schema, cell values and type unification
//! - [`table`]: columns, tables and row views
//! - [`processing`]: the transforms
//! - [`execution`]: parallel execution, metrics and observers
//! - [`error`]: the error type shared by every operator
//!
//! ## Example
//!
//! ```rust
//! use tabular_transforms::processing::{coalesce, pivot_longer, PivotLongerSpec};
//! use tabular_transforms::table::{Column, Table};
//! use tabular_transforms::types::Value;
//!
//! # fn main() -> Result<(), tabular_transforms::TransformError> {
//! let scores = Table::new(vec![
//!     ("student", Column::utf8([Some("A"), Some("B")])),
//!     ("midterm", Column::int64([Some(85), None])),
//!     ("retake", Column::float64([None, Some(71.5)])),
//! ])?;
//!
//! let merged = coalesce(&scores, "midterm", &["midterm", "retake"])?;
//! assert_eq!(merged.column("midterm")?.values()[1], Value::Float64(71.5));
//!
//! let long = pivot_longer(&merged, &PivotLongerSpec::new(["student"]).measures(["midterm"]))?;
//! assert_eq!(long.row_count(), 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod execution;
pub mod processing;
pub mod table;
pub mod types;

pub use error::{TransformError, TransformResult};
