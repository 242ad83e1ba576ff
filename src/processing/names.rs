//! Column-name normalization (`clean_names`) and renaming.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{TransformError, TransformResult};
use crate::table::Table;

/// Name given to a column whose name normalizes to nothing (e.g. `"%"`).
const EMPTY_NAME: &str = "column";

/// Normalize a list of column names into unique `snake_case` identifiers.
///
/// Per name: lowercase and strip accents, turn runs of whitespace / `-` / `/` / `.` into one
/// `_`, drop everything outside `[a-z0-9_]`, collapse repeated `_`, trim `_` from both ends.
///
/// Collisions are resolved in input order: the first occurrence keeps the name, later ones get
/// the smallest free `_2`, `_3`, ... suffix.
///
/// ```rust
/// use tabular_transforms::processing::normalize_names;
///
/// assert_eq!(
///     normalize_names(&["First Name", "First_Name", "Numéro Ticket"]),
///     vec!["first_name", "first_name_2", "numero_ticket"]
/// );
/// ```
pub fn normalize_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let bases: Vec<String> = names.iter().map(|n| normalize_name(n.as_ref())).collect();

    // Every base name is reserved up front so a suffixed duplicate never steals a later
    // column's own normalized name.
    let reserved: HashSet<&str> = bases.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(bases.len());
    let mut out = Vec::with_capacity(bases.len());

    for base in &bases {
        if used.insert(base.clone()) {
            out.push(base.clone());
            continue;
        }
        let mut k = 2usize;
        let candidate = loop {
            let candidate = format!("{base}_{k}");
            if !used.contains(&candidate) && !reserved.contains(candidate.as_str()) {
                break candidate;
            }
            k += 1;
        };
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        if c.is_whitespace() || matches!(c, '-' | '/' | '.' | '_') {
            pending_sep = true;
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        }
        // anything else is dropped without acting as a separator
    }

    if out.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        out
    }
}

/// Return a table whose column names have been passed through [`normalize_names`].
///
/// Column storage is shared with the input.
pub fn clean_names(table: &Table) -> TransformResult<Table> {
    let names = normalize_names(&table.column_names());
    let columns = table
        .shared_columns()
        .zip(names)
        .map(|((_, col), name)| (name, Arc::clone(col)))
        .collect();
    let out = Table::from_shared("clean_names", columns)?;
    debug!(columns = out.column_count(), "clean_names");
    Ok(out)
}

/// Rename column `from` to `to`, keeping its position and contents.
pub fn rename_column(table: &Table, from: &str, to: &str) -> TransformResult<Table> {
    let idx = table.column_index("rename_column", from)?;
    if from == to {
        return Ok(table.clone());
    }
    if table.schema().index_of(to).is_some() {
        return Err(TransformError::schema(
            "rename_column",
            format!("cannot rename '{from}' to '{to}': a column named '{to}' already exists"),
        ));
    }
    let columns = table
        .shared_columns()
        .enumerate()
        .map(|(i, (name, col))| {
            let name = if i == idx { to } else { name };
            (name.to_string(), Arc::clone(col))
        })
        .collect();
    Table::from_shared("rename_column", columns)
}
