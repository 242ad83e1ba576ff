//! Table transformations.
//!
//! Every operator takes a [`Table`](crate::table::Table) snapshot and returns a new one; inputs
//! are never modified and untouched columns are shared with the output. Operators are plain
//! functions, so a pipeline is just a chain of calls with `?`.
//!
//! - [`clean_names()`], [`rename_column()`]: column naming
//! - [`remove_empty()`]: drop all-null rows and/or columns
//! - [`get_dupes()`]: rows that occur more than once
//! - [`coalesce()`], [`coalesce_or()`], [`fill_down()`]: filling missing values
//! - [`convert_excel_date()`]: spreadsheet serial numbers to datetimes
//! - [`case_when()`]: conditional column construction
//! - [`pivot_longer()`], [`pivot_wider()`]: reshaping
//! - [`filter()`]: row selection by predicate
//! - [`concat_rows()`]: stacking tables by column name
//! - [`profile()`]: shape, missing and duplicate counts
//!
//! ## Example: clean → drop empty → label → filter
//!
//! ```rust
//! use tabular_transforms::processing::{
//!     case_when, clean_names, filter, remove_empty, CaseWhen, EmptyAxis,
//! };
//! use tabular_transforms::table::{Column, Table};
//!
//! let raw = Table::new(vec![
//!     ("Ticket Type", Column::utf8([Some("Tarif réduit"), None, Some("VIP")])),
//!     ("Unused", Column::float64([None, None, None])),
//!     ("Prix (€)", Column::float64([Some(10.0), None, Some(50.0)])),
//! ])
//! .unwrap();
//!
//! let clean = remove_empty(&clean_names(&raw).unwrap(), EmptyAxis::Both).unwrap();
//! assert_eq!(clean.column_names(), vec!["ticket_type", "prix"]);
//!
//! let tickets = CaseWhen::new()
//!     .when(|row| row.str("ticket_type").is_some_and(|t| t.contains("réduit")), "Réduit")
//!     .otherwise("Autre");
//! let labelled = case_when(&clean, &tickets, "ticket_type").unwrap();
//!
//! let paid = filter(&labelled, |row| row.f64("prix").is_some_and(|p| p > 20.0));
//! assert_eq!(paid.row_count(), 1);
//! assert_eq!(paid.row(0).unwrap().str("ticket_type"), Some("Autre"));
//! ```

pub mod case_when;
pub mod coalesce;
pub mod concat;
pub mod dupes;
pub mod empty;
pub mod excel_date;
pub mod filter;
pub mod names;
pub mod pivot;
pub mod profile;

pub use case_when::{case_when, CaseWhen, Predicate};
pub use coalesce::{coalesce, coalesce_or, fill_down};
pub use concat::concat_rows;
pub use dupes::get_dupes;
pub use empty::{remove_empty, EmptyAxis};
pub use excel_date::{convert_excel_date, convert_excel_date_with, ExcelDateSystem};
pub use filter::filter;
pub use names::{clean_names, normalize_names, rename_column};
pub use pivot::{pivot_longer, pivot_wider, NamePattern, PivotLongerSpec, PivotWiderSpec};
pub use profile::{profile, ColumnProfile, TableProfile};
