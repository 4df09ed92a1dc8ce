//! Value expressions: how a property's value is computed from a CSV row.

use crate::cypher::text::{row_column, string_literal};
use crate::types::{Preparation, PropertyDef};

/// Separator between the slugged parts of a composite identifier.
pub const COMPOSITE_SEPARATOR: &str = "_";

fn apply_scalar(expr: String, step: &Preparation) -> String {
    match step {
        Preparation::Trim => format!("trim(toString({}))", expr),
        Preparation::Cast { to } => match to.cast_function() {
            Some(function) => format!("{}({})", function, expr),
            None => expr,
        },
        Preparation::Split { .. } => expr,
    }
}

/// Slugged, lower-cased concatenation of several columns.
///
/// Absent columns contribute an empty string instead of nulling the result.
pub fn composite_expression(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "apoc.text.slug(toLower(coalesce(toString({}), '')))",
                row_column(c)
            )
        })
        .collect::<Vec<_>>()
        .join(&format!(" + {} + ", string_literal(COMPOSITE_SEPARATOR)))
}

/// List expression splitting `column` on `delimiter`.
///
/// The raw value is coerced to a string and trimmed before splitting;
/// each item is trimmed, empty items are dropped, and the remaining
/// preparation steps (casts) apply per item.
pub fn split_expression(column: &str, delimiter: &str, item_steps: &[Preparation]) -> String {
    let item = item_steps
        .iter()
        .filter(|s| !matches!(s, Preparation::Trim | Preparation::Split { .. }))
        .fold("trim(item)".to_string(), apply_scalar);
    format!(
        "[item IN split(trim(toString({})), {}) WHERE trim(item) <> '' | {}]",
        row_column(column),
        string_literal(delimiter),
        item
    )
}

/// Expression computing `prop` from the current row.
pub fn value_expression(prop: &PropertyDef) -> String {
    if !prop.composite_of.is_empty() {
        return composite_expression(&prop.composite_of);
    }

    let column = prop.column_name.as_deref().unwrap_or(&prop.key);
    match prop.split_delimiter() {
        Some(delimiter) => split_expression(column, delimiter, &prop.preparation),
        None => prop
            .preparation
            .iter()
            .fold(row_column(column), apply_scalar),
    }
}

/// Whether the property's value is a list produced by a split.
pub fn is_list_valued(prop: &PropertyDef) -> bool {
    prop.composite_of.is_empty() && prop.split_delimiter().is_some()
}
