//! CSV formatting for `xray_porter`.
//!
//! Provides CSV output for the catalog listing and the per-test dataset
//! sheets. Handles proper escaping of fields containing commas, quotes, or
//! newlines.

use crate::catalog::CatalogRow;
use crate::model::Dataset;
use serde_json::Value;
use std::collections::HashMap;

/// Default fields for catalog CSV output.
pub const DEFAULT_FIELDS: &[&str] = &["index", "key", "summary", "status", "steps"];

/// All available catalog fields.
pub const ALL_FIELDS: &[&str] = &[
    "index",
    "id",
    "key",
    "summary",
    "assignee",
    "reporter",
    "status",
    "type",
    "steps",
    "preconditions",
    "dataset",
];

/// Escape a CSV field value.
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
/// Doubles any existing quotes within the value.
#[must_use]
pub fn escape_field(value: &str) -> String {
    let needs_quoting = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');

    if needs_quoting {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

/// Get a field value from a catalog row by field name.
#[must_use]
pub fn get_field_value(row: &CatalogRow, field: &str) -> String {
    match field {
        "index" => row.index.to_string(),
        "id" => row.id.clone(),
        "key" => row.key.clone(),
        "summary" => row.summary.clone(),
        "assignee" => row.assignee.clone(),
        "reporter" => row.reporter.clone(),
        "status" => row.status.clone(),
        "type" => row.test_type.as_str().to_string(),
        "steps" => row.step_count.to_string(),
        "preconditions" => row.preconditions.join(" "),
        "dataset" => if row.has_dataset { "yes" } else { "" }.to_string(),
        _ => String::new(),
    }
}

/// Parse a comma-separated list of field names.
///
/// Returns the default fields if the input is empty.
#[must_use]
pub fn parse_fields(fields_arg: Option<&str>) -> Vec<&'static str> {
    match fields_arg {
        Some(arg) if !arg.is_empty() => arg
            .split(',')
            .map(str::trim)
            .filter_map(|f| ALL_FIELDS.iter().find(|&&af| af == f).copied())
            .collect(),
        _ => DEFAULT_FIELDS.to_vec(),
    }
}

fn join_row<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| escape_field(value.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Format catalog rows as a complete CSV string.
#[must_use]
pub fn format_csv(rows: &[CatalogRow], fields: &[&str]) -> String {
    let mut output = String::new();
    output.push_str(&fields.join(","));
    output.push('\n');
    for row in rows {
        output.push_str(&join_row(fields.iter().map(|field| get_field_value(row, field))));
        output.push('\n');
    }
    output
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a dataset as CSV: one column per parameter (combination
/// parameters suffixed `*`), one line per row, blanks for missing values.
///
/// Returns `None` when the dataset has no rows.
#[must_use]
pub fn dataset_csv(dataset: &Dataset) -> Option<String> {
    if dataset.rows.is_empty() {
        return None;
    }
    let titles: Vec<String> = dataset
        .parameters
        .iter()
        .map(crate::model::Parameter::column_title)
        .collect();
    let column_of: HashMap<&str, usize> = dataset
        .parameters
        .iter()
        .enumerate()
        .map(|(column, parameter)| (parameter.id.as_str(), column))
        .collect();

    let mut output = join_row(&titles);
    output.push('\n');
    for row in &dataset.rows {
        let mut cells = vec![String::new(); titles.len()];
        for (parameter_id, value) in &row.values {
            if let Some(&column) = column_of.get(parameter_id.as_str()) {
                cells[column] = cell_text(value);
            }
        }
        output.push_str(&join_row(&cells));
        output.push('\n');
    }
    Some(output)
}
